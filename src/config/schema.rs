//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::policy::{PolicySection, DEFAULT_HEALTHCHECK_PATH};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Admission policy sources.
    pub policy: PolicyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL (scheme + host, optional port and base path).
    pub url: String,

    /// Accept any upstream TLS certificate.
    pub skip_tls_verify: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one proxied request, in seconds.
    pub read_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 60,
            connect_secs: 10,
        }
    }
}

/// Admission policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path that bypasses every admission rule.
    pub healthcheck_path: String,

    /// Accepted-header rules, inline or as text.
    pub accepted_headers: Option<PolicySection>,

    /// Path-deny rules, inline or as text.
    pub denied_paths: Option<PolicySection>,

    /// Policy file that replaces the inline sections when set.
    pub file: Option<String>,

    /// Reload the policy file when it changes.
    pub watch: bool,

    /// Treat malformed policy input as a startup error instead of an empty table.
    pub strict: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            healthcheck_path: DEFAULT_HEALTHCHECK_PATH.to_string(),
            accepted_headers: None,
            denied_paths: None,
            file: None,
            watch: false,
            strict: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Log full request and response headers for every exchange.
    pub verbose: bool,

    /// Log non-empty discriminator values.
    pub audit: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            verbose: false,
            audit: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            url = "http://backend:3000"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.policy.healthcheck_path, "/");
        assert_eq!(config.timeouts.read_secs, 60);
        assert!(config.policy.accepted_headers.is_none());
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_policy_sections_inline_or_text() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [policy]
            healthcheck_path = "/health"
            accepted_headers = "X-Role:admin"
            denied_paths = [{ header_values = "admin", paths = ["/secrets"] }]
            "#,
        )
        .unwrap();

        assert!(matches!(config.policy.accepted_headers, Some(PolicySection::Text(_))));
        assert!(matches!(config.policy.denied_paths, Some(PolicySection::Table(_))));
    }
}
