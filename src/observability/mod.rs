//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gating transport and frontend produce:
//!     → logging.rs (subscriber setup, exchange log extension points)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The admission gate never logs; callers log around it
//! - Request ID (x-request-id) is set at the edge and forwarded upstream
//! - Metrics are cheap and optional

pub mod logging;
pub mod metrics;
