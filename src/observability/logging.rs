//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Log proxied exchanges at fixed extension points
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment (`RUST_LOG` wins)

use axum::http::{HeaderMap, Method, StatusCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::security::admission::{Admission, Decision};

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "header_gate={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Exchange logging for the gating transport.
///
/// Three extension points: before the decision, after the decision and
/// after the upstream response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeLog {
    verbose: bool,
    audit: bool,
}

impl ExchangeLog {
    pub fn new(verbose: bool, audit: bool) -> Self {
        Self { verbose, audit }
    }

    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self::new(config.verbose, config.audit)
    }

    /// Before the admission decision.
    pub fn request(&self, method: &Method, path: &str, headers: &HeaderMap) {
        if self.verbose {
            tracing::info!(method = %method, path = %path, headers = ?headers, "Request");
        }
    }

    /// After the admission decision.
    pub fn decision(&self, path: &str, admission: &Admission<'_>) {
        if self.audit && !admission.discriminator.is_empty() {
            tracing::info!(
                path = %path,
                discriminator = %admission.discriminator,
                allowed = admission.decision.is_allowed(),
                "Audit"
            );
        }
        match admission.decision {
            Decision::Allow if admission.bypassed => {
                tracing::trace!(path = %path, "Healthcheck path, admission bypassed");
            }
            Decision::Allow => {}
            Decision::Deny(reason) => {
                tracing::debug!(path = %path, reason = %reason, "Request denied by policy");
            }
        }
    }

    /// After the upstream response arrived.
    pub fn response(&self, path: &str, status: StatusCode, headers: &HeaderMap) {
        if self.verbose {
            tracing::info!(path = %path, status = %status, headers = ?headers, "Response");
        }
    }
}
