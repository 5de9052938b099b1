//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream URL, bind address and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::http::upstream::UpstreamTarget;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("healthcheck path {0:?} must start with '/'")]
    InvalidHealthcheckPath(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = UpstreamTarget::parse(&config.upstream.url) {
        errors.push(ValidationError::InvalidUpstream {
            url: config.upstream.url.clone(),
            reason: e.to_string(),
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.read_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }

    if !config.policy.healthcheck_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthcheckPath(
            config.policy.healthcheck_path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
