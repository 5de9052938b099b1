//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → http::transport rewrites the target
//!     → admission.rs (healthcheck bypass, header allowlist, path denylist)
//!     → Forward upstream or reject with 403
//! ```
//!
//! # Design Decisions
//! - Denials never reveal which rule failed
//! - Malformed policy input fails open per section; strict mode fails closed at startup

pub mod admission;
pub mod headers;

pub use admission::{decide, evaluate, Admission, Decision, DenyReason};
