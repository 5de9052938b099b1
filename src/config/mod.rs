//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, overlay environment)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! Policy file (when configured with watch = true):
//!     watcher.rs detects change
//!     → PolicyStore::load_file builds a new snapshot
//!     → atomic swap in PolicyHandle
//!     → new requests observe the new policy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the policy snapshot can be swapped
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, PolicyConfig, TimeoutConfig,
    UpstreamConfig,
};
