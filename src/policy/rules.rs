//! Policy input entries and section decoding.
//!
//! # Responsibilities
//! - Define the declarative entries the policy tables are built from
//! - Decode a section from inline TOML or from text (JSON / legacy form)
//!
//! # Design Decisions
//! - Decoding is per section: one malformed section never poisons the other
//! - The legacy `NAME:VALUE1\nVALUE2` form is only understood for accepted headers

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error raised while decoding or building a policy section.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid JSON policy section: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML policy section: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unrecognized policy text: {0:?}")]
    UnrecognizedText(String),

    #[error("header rule has an empty name")]
    EmptyHeaderName,

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One accepted-header rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRuleEntry {
    /// Header name (looked up case-insensitively).
    pub name: String,

    /// Values that satisfy the rule. Empty means nothing satisfies it.
    pub values: Vec<String>,
}

/// One or many strings, so `header_values = "admin"` and
/// `header_values = ["admin", "ops"]` both decode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_slice(&self) -> &[String] {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }
}

/// One path-deny entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathDenyEntry {
    /// Header values this entry applies to.
    #[serde(alias = "header_value")]
    pub header_values: OneOrMany,

    /// Restrict the entry to one header rule. When absent the entry keys on
    /// the discriminator value. A header without a matching header rule is
    /// never consulted; such entries are reported when the policy loads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Exact request paths to deny.
    pub paths: Vec<String>,
}

/// A raw policy section, either inline TOML or text from the environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PolicySection {
    Text(String),
    Table(toml::Value),
}

impl PolicySection {
    /// Decode an accepted-headers section.
    pub fn decode_header_rules(&self) -> Result<Vec<HeaderRuleEntry>, PolicyError> {
        match self {
            PolicySection::Table(value) => decode_table(value),
            PolicySection::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(Vec::new());
                }
                if looks_like_json(trimmed) {
                    return Ok(serde_json::from_str(trimmed)?);
                }
                parse_legacy_header_rule(text)
                    .map(|rule| vec![rule])
                    .ok_or_else(|| PolicyError::UnrecognizedText(text.clone()))
            }
        }
    }

    /// Decode a denied-paths section.
    pub fn decode_path_deny_rules(&self) -> Result<Vec<PathDenyEntry>, PolicyError> {
        match self {
            PolicySection::Table(value) => decode_table(value),
            PolicySection::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(Vec::new());
                }
                if looks_like_json(trimmed) {
                    return Ok(serde_json::from_str(trimmed)?);
                }
                Err(PolicyError::UnrecognizedText(text.clone()))
            }
        }
    }
}

fn decode_table<T: DeserializeOwned>(value: &toml::Value) -> Result<T, PolicyError> {
    Ok(value.clone().try_into()?)
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('[') || text.starts_with('{')
}

/// Parse `NAME:VALUE1\nVALUE2`. Anything other than exactly one `:` is rejected.
fn parse_legacy_header_rule(text: &str) -> Option<HeaderRuleEntry> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let name = parts[0].trim();
    if name.is_empty() {
        return None;
    }
    let values = parts[1]
        .trim()
        .split('\n')
        .map(str::to_string)
        .collect();
    Some(HeaderRuleEntry {
        name: name.to_string(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inline_toml_sections() {
        let doc: toml::Table = toml::from_str(
            r#"
            accepted_headers = [{ name = "X-Role", values = ["admin", "ops"] }]
            denied_paths = [
                { header_values = "admin", paths = ["/secrets"] },
                { header_values = ["ops", "admin"], header = "X-Role", paths = ["/billing"] },
            ]
            "#,
        )
        .unwrap();

        let headers = PolicySection::Table(doc["accepted_headers"].clone())
            .decode_header_rules()
            .unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "X-Role");
        assert_eq!(headers[0].values, vec!["admin", "ops"]);

        let denied = PolicySection::Table(doc["denied_paths"].clone())
            .decode_path_deny_rules()
            .unwrap();
        assert_eq!(denied[0].header_values.as_slice(), ["admin".to_string()]);
        assert_eq!(denied[0].header, None);
        assert_eq!(denied[1].header.as_deref(), Some("X-Role"));
        assert_eq!(denied[1].header_values.as_slice().len(), 2);
    }

    #[test]
    fn test_decode_json_text() {
        let section = PolicySection::Text(
            r#"[{"name": "X-Tenant", "values": ["a", ""]}]"#.to_string(),
        );
        let rules = section.decode_header_rules().unwrap();
        assert_eq!(rules[0].values, vec!["a", ""]);

        let section =
            PolicySection::Text(r#"[{"header_value": "a", "paths": ["/x"]}]"#.to_string());
        let denied = section.decode_path_deny_rules().unwrap();
        assert_eq!(denied[0].paths, vec!["/x"]);
    }

    #[test]
    fn test_decode_legacy_text() {
        let section = PolicySection::Text("X-Role: admin\nops".to_string());
        let rules = section.decode_header_rules().unwrap();
        assert_eq!(
            rules,
            vec![HeaderRuleEntry {
                name: "X-Role".into(),
                values: vec!["admin".into(), "ops".into()],
            }]
        );
    }

    #[test]
    fn test_malformed_sections_are_errors() {
        assert!(PolicySection::Text("no separator here".into())
            .decode_header_rules()
            .is_err());
        assert!(PolicySection::Text("a:b:c".into()).decode_header_rules().is_err());
        assert!(PolicySection::Text("[{\"name\": 3}]".into())
            .decode_header_rules()
            .is_err());
        assert!(PolicySection::Text("/secrets".into())
            .decode_path_deny_rules()
            .is_err());

        let missing_paths: toml::Value =
            toml::Value::Array(vec![toml::Value::Table(toml::Table::new())]);
        assert!(PolicySection::Table(missing_paths)
            .decode_path_deny_rules()
            .is_err());
    }

    #[test]
    fn test_blank_text_is_an_empty_section() {
        assert!(PolicySection::Text("  ".into())
            .decode_header_rules()
            .unwrap()
            .is_empty());
        assert!(PolicySection::Text(String::new())
            .decode_path_deny_rules()
            .unwrap()
            .is_empty());
    }
}
