//! Header-gated reverse proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
