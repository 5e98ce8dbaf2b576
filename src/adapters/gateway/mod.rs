//! Gateway transport adapters.

pub mod http;

pub use http::HttpGatewayClient;
