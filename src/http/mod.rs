//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, hop-by-hop stripping)
//!     → transport.rs (rewrite to upstream, admission gate)
//!     → upstream.rs (hyper client, HTTP or HTTPS)
//!     → server.rs (status mapping, metrics)
//!     → Send to client
//! ```

pub mod server;
pub mod transport;
pub mod upstream;

pub use server::{error_response, HttpServer};
pub use transport::{GatingTransport, Rejection, TransportError};
pub use upstream::{HyperUpstream, RoundTrip, UpstreamError, UpstreamTarget};
