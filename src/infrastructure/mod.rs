//! Infrastructure layer: configuration loading and logging setup that sit
//! underneath the CLI and service layers.

pub mod config;
pub mod logging;

pub use config::Config;
pub use config::loader::ConfigLoader;
pub use logging::{LogConfig, LoggerImpl};
