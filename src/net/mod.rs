//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (allowed) request
//!     → tls.rs (rustls client config: strict roots or skip-verify)
//!     → hyper-rustls connector in http::upstream
//!     → Upstream host
//! ```
//!
//! # Design Decisions
//! - Plain HTTP and HTTPS upstreams share one connector
//! - Certificate verification can be skipped, never partially relaxed

pub mod tls;
