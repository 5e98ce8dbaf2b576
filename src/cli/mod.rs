//! CLI interface module.
//!
//! Thin argument parsing and service-graph wiring around the library's
//! Orchestrator Façade; no business logic lives here.

pub mod commands;
pub mod context;
pub mod output;
pub mod types;

pub use context::ServiceGraph;
pub use types::{Cli, Commands, ConflictsCommands, LedgerCommands, ReviewCommands, ReviewDecisionArg};
