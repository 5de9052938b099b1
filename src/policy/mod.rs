//! Policy subsystem.
//!
//! # Data Flow
//! ```text
//! config sections / policy file
//!     → rules.rs (decode entries per section)
//!     → store.rs (build PolicyStore, fail-open per section)
//!     → PolicyHandle (shared snapshot, swapped whole on reload)
//!     → security::admission reads the snapshot per request
//! ```
//!
//! # Design Decisions
//! - A store is never mutated once built
//! - A malformed section degrades to an empty table instead of stopping the process

pub mod rules;
pub mod store;

pub use rules::{HeaderRuleEntry, OneOrMany, PathDenyEntry, PolicyError, PolicySection};
pub use store::{HeaderRule, PathDenyTable, PolicyHandle, PolicyStore, DEFAULT_HEALTHCHECK_PATH};
