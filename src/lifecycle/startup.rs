//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the policy store from inline sections or a policy file
//! - Initialize the upstream executor, gating transport and HTTP server
//! - Start the policy watcher when requested
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound by the caller so tests can pick a free port

use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;

use crate::config::{GatewayConfig, PolicyConfig};
use crate::config::watcher::PolicyWatcher;
use crate::http::server::HttpServer;
use crate::http::transport::GatingTransport;
use crate::http::upstream::{HyperUpstream, UpstreamTarget, UpstreamUrlError};
use crate::net::tls::TlsError;
use crate::observability::logging::ExchangeLog;
use crate::observability::metrics;
use crate::policy::{PolicyError, PolicyHandle, PolicyStore};

/// Error raised while assembling the gateway.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid upstream: {0}")]
    Upstream(#[from] UpstreamUrlError),

    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("upstream TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("failed to watch policy file: {0}")]
    Watch(#[from] notify::Error),
}

/// Build the initial policy store described by `config`.
///
/// A policy file replaces the inline sections. Malformed sections degrade to
/// empty tables unless `strict` is set; so does a policy file that is not
/// valid TOML. A missing or unreadable file is always an error.
pub fn build_policy(config: &PolicyConfig) -> Result<PolicyStore, PolicyError> {
    let healthcheck_path = config.healthcheck_path.clone();
    match &config.file {
        Some(file) => {
            match PolicyStore::load_file(Path::new(file), healthcheck_path.clone(), config.strict) {
                Err(PolicyError::Toml(e)) if !config.strict => {
                    tracing::warn!(
                        path = %file,
                        error = %e,
                        "Malformed policy file, no header rule active and no path denied"
                    );
                    Ok(PolicyStore::load(None, None, healthcheck_path))
                }
                other => other,
            }
        }
        None if config.strict => PolicyStore::load_strict(
            config.accepted_headers.as_ref(),
            config.denied_paths.as_ref(),
            healthcheck_path,
        ),
        None => Ok(PolicyStore::load(
            config.accepted_headers.as_ref(),
            config.denied_paths.as_ref(),
            healthcheck_path,
        )),
    }
}

/// A fully assembled gateway, ready to serve.
pub struct Gateway {
    pub server: HttpServer,
    pub policy: PolicyHandle,
    /// Kept alive so policy file changes keep being picked up.
    pub watcher: Option<RecommendedWatcher>,
}

impl Gateway {
    pub fn build(config: &GatewayConfig) -> Result<Self, StartupError> {
        let target = UpstreamTarget::parse(&config.upstream.url)?;

        let store = build_policy(&config.policy)?;
        tracing::info!(
            header_rules = store.header_rules().len(),
            denied_paths = store.path_deny().len(),
            healthcheck_path = %store.healthcheck_path(),
            "Policy loaded"
        );
        metrics::record_policy_snapshot(&store);
        let policy = PolicyHandle::new(store);

        let watcher = match (&config.policy.file, config.policy.watch) {
            (Some(file), true) => Some(
                PolicyWatcher::new(
                    Path::new(file),
                    config.policy.healthcheck_path.clone(),
                    config.policy.strict,
                    policy.clone(),
                )
                .run()?,
            ),
            (None, true) => {
                tracing::warn!("policy.watch is set without policy.file, nothing to watch");
                None
            }
            _ => None,
        };

        if config.upstream.skip_tls_verify {
            tracing::warn!(upstream = %target.authority(), "Upstream TLS certificate verification is disabled");
        }
        let executor = HyperUpstream::new(&config.upstream, &config.timeouts)?.shared();

        let transport = GatingTransport::new(
            target,
            policy.clone(),
            executor,
            ExchangeLog::from_config(&config.observability),
        );
        let server = HttpServer::new(Arc::new(transport), &config.timeouts);

        Ok(Self {
            server,
            policy,
            watcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicySection;
    use crate::security::admission::{decide, Decision};
    use axum::http::{HeaderMap, HeaderValue};
    use std::io::Write;

    fn config_with(accepted: &str, strict: bool) -> PolicyConfig {
        PolicyConfig {
            accepted_headers: Some(PolicySection::Text(accepted.to_string())),
            strict,
            ..PolicyConfig::default()
        }
    }

    fn arbitrary_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-role", HeaderValue::from_static("nobody"));
        headers
    }

    #[test]
    fn test_build_policy_fail_open() {
        let store = build_policy(&config_with("{not json", false)).unwrap();
        assert!(store.header_rules().is_empty());
        assert_eq!(decide(&store, &arbitrary_headers(), "/api"), Decision::Allow);
        assert_eq!(decide(&store, &HeaderMap::new(), "/"), Decision::Allow);
    }

    fn broken_policy_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"accepted_headers = [ {{ name = "X-Role", values = ["admin"] "#).unwrap();
        file
    }

    #[test]
    fn test_build_policy_unparseable_file_fails_open() {
        let file = broken_policy_file();
        let config = PolicyConfig {
            file: Some(file.path().display().to_string()),
            healthcheck_path: "/health".to_string(),
            ..PolicyConfig::default()
        };

        let store = build_policy(&config).unwrap();
        assert!(store.header_rules().is_empty());
        assert!(store.path_deny().is_empty());
        assert_eq!(store.healthcheck_path(), "/health");
        assert_eq!(decide(&store, &arbitrary_headers(), "/secrets"), Decision::Allow);
    }

    #[test]
    fn test_build_policy_unparseable_file_strict_is_fatal() {
        let file = broken_policy_file();
        let config = PolicyConfig {
            file: Some(file.path().display().to_string()),
            strict: true,
            ..PolicyConfig::default()
        };
        assert!(matches!(build_policy(&config), Err(PolicyError::Toml(_))));
    }

    #[test]
    fn test_build_policy_strict_rejects_malformed() {
        assert!(build_policy(&config_with("{not json", true)).is_err());
    }

    #[test]
    fn test_build_policy_missing_file() {
        let config = PolicyConfig {
            file: Some("/nonexistent/policy.toml".to_string()),
            ..PolicyConfig::default()
        };
        assert!(matches!(build_policy(&config), Err(PolicyError::Io { .. })));
    }

    #[tokio::test]
    async fn test_gateway_build() {
        let mut config = GatewayConfig::default();
        config.upstream.url = "http://127.0.0.1:3000".to_string();
        config.policy = config_with(r#"[{"name":"X-Role","values":["admin"]}]"#, true);

        let gateway = Gateway::build(&config).unwrap();
        assert_eq!(gateway.policy.snapshot().header_rules().len(), 1);
        assert!(gateway.watcher.is_none());
    }

    #[test]
    fn test_gateway_build_rejects_bad_upstream() {
        let config = GatewayConfig::default();
        assert!(matches!(
            Gateway::build(&config),
            Err(StartupError::Upstream(_))
        ));
    }
}
