//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::policy::PolicySection;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, overlay the process
/// environment and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Like [`load_config`] but without semantic validation.
///
/// Offline tools that only need the policy sections use this so a missing
/// upstream URL is not an error.
pub fn read_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// | Variable | Field |
/// |---|---|
/// | `TARGET_URL` | `upstream.url` |
/// | `PROXY_PORT` | `listener.bind_address` as `0.0.0.0:<port>` |
/// | `IGNORE_CERTIFICATE` | `upstream.skip_tls_verify` |
/// | `ACCEPTED_HEADERS` | `policy.accepted_headers` (text) |
/// | `DENIED_PATHS` | `policy.denied_paths` (text) |
/// | `HEALTHCHECK_PATH` | `policy.healthcheck_path` |
/// | `DEBUG` | `observability.verbose` |
/// | `AUDIT` | `observability.audit` |
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("TARGET_URL") {
        config.upstream.url = url;
    }
    if let Some(port) = lookup("PROXY_PORT").filter(|p| !p.is_empty()) {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(flag) = lookup("IGNORE_CERTIFICATE") {
        config.upstream.skip_tls_verify = parse_bool(&flag);
    }
    if let Some(text) = lookup("ACCEPTED_HEADERS") {
        config.policy.accepted_headers = Some(PolicySection::Text(text));
    }
    if let Some(text) = lookup("DENIED_PATHS") {
        config.policy.denied_paths = Some(PolicySection::Text(text));
    }
    if let Some(path) = lookup("HEALTHCHECK_PATH").filter(|p| !p.is_empty()) {
        config.policy.healthcheck_path = path;
    }
    if let Some(flag) = lookup("DEBUG") {
        config.observability.verbose = parse_bool(&flag);
    }
    if let Some(flag) = lookup("AUDIT") {
        config.observability.audit = parse_bool(&flag);
    }
}

/// Boolean flag parsing; anything unrecognized is false.
fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}
