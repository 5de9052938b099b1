//! Immutable policy snapshot and the shared handle that publishes it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::HeaderName;

use crate::policy::rules::{HeaderRuleEntry, PathDenyEntry, PolicyError, PolicySection};

/// Default path that bypasses the admission gate.
pub const DEFAULT_HEALTHCHECK_PATH: &str = "/";

/// A single accepted-header rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRule {
    name: HeaderName,
    accepted: BTreeSet<String>,
}

impl HeaderRule {
    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn accepted(&self) -> &BTreeSet<String> {
        &self.accepted
    }

    /// Returns true if `value` is one of the accepted values.
    pub fn accepts(&self, value: &str) -> bool {
        self.accepted.contains(value)
    }
}

/// Denied paths keyed by header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathDenyTable {
    /// Keys matched against the discriminator value.
    by_value: HashMap<String, HashSet<String>>,
    /// Keys scoped to a specific header rule.
    by_header: HashMap<HeaderName, HashMap<String, HashSet<String>>>,
}

impl PathDenyTable {
    /// Build the table, appending each entry's paths to every key it lists.
    pub fn from_entries(entries: &[PathDenyEntry]) -> Result<Self, PolicyError> {
        let mut table = Self::default();
        for entry in entries {
            let scope = match entry.header.as_deref() {
                Some(name) => Some(parse_header_name(name)?),
                None => None,
            };
            for value in entry.header_values.as_slice() {
                let paths = match &scope {
                    Some(name) => table
                        .by_header
                        .entry(name.clone())
                        .or_default()
                        .entry(value.clone())
                        .or_default(),
                    None => table.by_value.entry(value.clone()).or_default(),
                };
                paths.extend(entry.paths.iter().cloned());
            }
        }
        Ok(table)
    }

    /// Paths denied for requests whose discriminator equals `value`.
    pub fn denied_for_value(&self, value: &str) -> Option<&HashSet<String>> {
        self.by_value.get(value)
    }

    /// Header names that scoped entries are keyed on.
    pub fn scoped_headers(&self) -> impl Iterator<Item = &HeaderName> {
        self.by_header.keys()
    }

    /// Paths denied for requests whose `header` carries `value`.
    pub fn denied_for_header(&self, header: &HeaderName, value: &str) -> Option<&HashSet<String>> {
        self.by_header.get(header).and_then(|values| values.get(value))
    }

    /// Total number of (key, path) pairs.
    pub fn len(&self) -> usize {
        let unscoped: usize = self.by_value.values().map(HashSet::len).sum();
        let scoped: usize = self
            .by_header
            .values()
            .flat_map(|values| values.values())
            .map(HashSet::len)
            .sum();
        unscoped + scoped
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable snapshot of both policy tables and the healthcheck path.
///
/// Built once and never mutated; a policy change produces a new store that
/// replaces this one through [`PolicyHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStore {
    header_rules: Vec<HeaderRule>,
    path_deny: PathDenyTable,
    healthcheck_path: String,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self {
            header_rules: Vec::new(),
            path_deny: PathDenyTable::default(),
            healthcheck_path: DEFAULT_HEALTHCHECK_PATH.to_string(),
        }
    }
}

impl PolicyStore {
    /// Build a store, rejecting malformed entries.
    pub fn from_entries(
        header_rules: &[HeaderRuleEntry],
        path_deny: &[PathDenyEntry],
        healthcheck_path: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        Ok(Self::assemble(
            build_header_rules(header_rules)?,
            PathDenyTable::from_entries(path_deny)?,
            healthcheck_path.into(),
        ))
    }

    /// Build a store from raw sections.
    ///
    /// A section that fails to decode or build is replaced by an empty table
    /// and a warning is logged; the other section is unaffected.
    pub fn load(
        accepted_headers: Option<&PolicySection>,
        denied_paths: Option<&PolicySection>,
        healthcheck_path: impl Into<String>,
    ) -> Self {
        let header_rules = accepted_headers
            .map(|section| {
                section
                    .decode_header_rules()
                    .and_then(|entries| build_header_rules(&entries))
            })
            .transpose()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Malformed accepted-header policy, no header rule active");
                None
            })
            .unwrap_or_default();

        let path_deny = denied_paths
            .map(|section| {
                section
                    .decode_path_deny_rules()
                    .and_then(|entries| PathDenyTable::from_entries(&entries))
            })
            .transpose()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Malformed denied-path policy, no path denied");
                None
            })
            .unwrap_or_default();

        Self::assemble(header_rules, path_deny, healthcheck_path.into())
    }

    fn assemble(
        header_rules: Vec<HeaderRule>,
        path_deny: PathDenyTable,
        healthcheck_path: String,
    ) -> Self {
        let store = Self {
            header_rules,
            path_deny,
            healthcheck_path,
        };
        for header in store.unmatched_deny_scopes() {
            tracing::warn!(
                header = %header,
                "Path-deny entry scoped to a header without a header rule is never applied"
            );
        }
        store
    }

    /// Headers named by scoped path-deny entries that have no header rule.
    ///
    /// Such entries never match, since only header rule values are consulted.
    pub fn unmatched_deny_scopes(&self) -> Vec<&HeaderName> {
        self.path_deny
            .scoped_headers()
            .filter(|header| !self.header_rules.iter().any(|rule| &rule.name == *header))
            .collect()
    }

    /// Decode the raw sections strictly; the first malformed section is an error.
    pub fn load_strict(
        accepted_headers: Option<&PolicySection>,
        denied_paths: Option<&PolicySection>,
        healthcheck_path: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let header_entries = match accepted_headers {
            Some(section) => section.decode_header_rules()?,
            None => Vec::new(),
        };
        let deny_entries = match denied_paths {
            Some(section) => section.decode_path_deny_rules()?,
            None => Vec::new(),
        };
        Self::from_entries(&header_entries, &deny_entries, healthcheck_path)
    }

    /// Read a policy file (TOML with top-level `accepted_headers` and
    /// `denied_paths` arrays).
    ///
    /// I/O and TOML syntax errors are returned. Malformed sections follow
    /// [`PolicyStore::load`] unless `strict` is set.
    pub fn load_file(
        path: &Path,
        healthcheck_path: impl Into<String>,
        strict: bool,
    ) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document: toml::Table = toml::from_str(&content)?;
        let accepted = document.get("accepted_headers").cloned().map(PolicySection::Table);
        let denied = document.get("denied_paths").cloned().map(PolicySection::Table);

        if strict {
            Self::load_strict(accepted.as_ref(), denied.as_ref(), healthcheck_path)
        } else {
            Ok(Self::load(accepted.as_ref(), denied.as_ref(), healthcheck_path))
        }
    }

    /// Header rules in configured order. The first one is the discriminator.
    pub fn header_rules(&self) -> &[HeaderRule] {
        &self.header_rules
    }

    pub fn path_deny(&self) -> &PathDenyTable {
        &self.path_deny
    }

    pub fn healthcheck_path(&self) -> &str {
        &self.healthcheck_path
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName, PolicyError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PolicyError::EmptyHeaderName);
    }
    HeaderName::from_bytes(trimmed.as_bytes())
        .map_err(|_| PolicyError::InvalidHeaderName(name.to_string()))
}

/// Later duplicates replace the accepted set but keep the first position.
fn build_header_rules(entries: &[HeaderRuleEntry]) -> Result<Vec<HeaderRule>, PolicyError> {
    let mut rules: Vec<HeaderRule> = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = parse_header_name(&entry.name)?;
        let accepted: BTreeSet<String> = entry.values.iter().cloned().collect();
        match rules.iter_mut().find(|rule| rule.name == name) {
            Some(existing) => existing.accepted = accepted,
            None => rules.push(HeaderRule { name, accepted }),
        }
    }
    Ok(rules)
}

/// Shared, swappable reference to the current [`PolicyStore`].
///
/// Readers take a snapshot per request; a reload publishes a whole new
/// store and in-flight requests keep the snapshot they started with.
#[derive(Debug, Clone)]
pub struct PolicyHandle {
    inner: Arc<ArcSwap<PolicyStore>>,
}

impl PolicyHandle {
    pub fn new(store: PolicyStore) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(store)),
        }
    }

    /// The store in effect right now.
    pub fn snapshot(&self) -> Arc<PolicyStore> {
        self.inner.load_full()
    }

    /// Publish a replacement store.
    pub fn replace(&self, store: PolicyStore) {
        self.inner.store(Arc::new(store));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rules::OneOrMany;
    use crate::security::admission::{decide, Decision};
    use axum::http::{HeaderMap, HeaderValue};
    use std::io::Write;

    fn deny(values: &[&str], paths: &[&str]) -> PathDenyEntry {
        PathDenyEntry {
            header_values: OneOrMany::Many(values.iter().map(|v| v.to_string()).collect()),
            header: None,
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_path_deny_union_across_keys() {
        let table = PathDenyTable::from_entries(&[
            deny(&["admin", "ops"], &["/secrets"]),
            deny(&["admin"], &["/billing", "/secrets"]),
        ])
        .unwrap();

        let admin = table.denied_for_value("admin").unwrap();
        assert!(admin.contains("/secrets"));
        assert!(admin.contains("/billing"));
        assert_eq!(admin.len(), 2);

        let ops = table.denied_for_value("ops").unwrap();
        assert!(ops.contains("/secrets"));
        assert!(!ops.contains("/billing"));

        assert!(table.denied_for_value("guest").is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_header_scoped_deny_entries() {
        let mut entry = deny(&["eu"], &["/exports"]);
        entry.header = Some("X-Region".into());
        let table = PathDenyTable::from_entries(&[entry]).unwrap();

        let region = HeaderName::from_static("x-region");
        assert!(table.denied_for_header(&region, "eu").unwrap().contains("/exports"));
        assert!(table.denied_for_value("eu").is_none());
    }

    #[test]
    fn test_duplicate_header_rule_replaces_values() {
        let store = PolicyStore::from_entries(
            &[
                HeaderRuleEntry { name: "X-Role".into(), values: vec!["admin".into()] },
                HeaderRuleEntry { name: "X-Team".into(), values: vec!["core".into()] },
                HeaderRuleEntry { name: "x-role".into(), values: vec!["guest".into()] },
            ],
            &[],
            "/health",
        )
        .unwrap();

        assert_eq!(store.header_rules().len(), 2);
        assert_eq!(store.header_rules()[0].name().as_str(), "x-role");
        assert!(store.header_rules()[0].accepts("guest"));
        assert!(!store.header_rules()[0].accepts("admin"));
    }

    #[test]
    fn test_invalid_header_names_rejected() {
        let empty = PolicyStore::from_entries(
            &[HeaderRuleEntry { name: " ".into(), values: vec![] }],
            &[],
            "/",
        );
        assert!(matches!(empty, Err(PolicyError::EmptyHeaderName)));

        let invalid = PolicyStore::from_entries(
            &[HeaderRuleEntry { name: "bad header".into(), values: vec![] }],
            &[],
            "/",
        );
        assert!(matches!(invalid, Err(PolicyError::InvalidHeaderName(_))));
    }

    #[test]
    fn test_load_falls_back_per_section() {
        let bad_headers = PolicySection::Text("not a rule".into());
        let good_denied = PolicySection::Text(r#"[{"header_values": "", "paths": ["/x"]}]"#.into());

        let store = PolicyStore::load(Some(&bad_headers), Some(&good_denied), "/health");
        assert!(store.header_rules().is_empty());
        assert!(store.path_deny().denied_for_value("").unwrap().contains("/x"));
        assert_eq!(store.healthcheck_path(), "/health");

        let bad_name = PolicySection::Text(r#"[{"name": "", "values": ["a"]}]"#.into());
        let store = PolicyStore::load(Some(&bad_name), None, "/");
        assert!(store.header_rules().is_empty());
        assert!(store.path_deny().is_empty());

        let mut headers = HeaderMap::new();
        headers.insert("x-role", HeaderValue::from_static("anything"));
        headers.insert("x-other", HeaderValue::from_static("value"));
        assert_eq!(decide(&store, &headers, "/api"), Decision::Allow);
        assert_eq!(decide(&store, &HeaderMap::new(), "/secrets"), Decision::Allow);
    }

    #[test]
    fn test_unmatched_deny_scopes() {
        let scoped = |header: &str| PathDenyEntry {
            header_values: OneOrMany::One("core".into()),
            header: Some(header.into()),
            paths: vec!["/admin".into()],
        };
        let store = PolicyStore::from_entries(
            &[HeaderRuleEntry { name: "X-Team".into(), values: vec!["core".into()] }],
            &[scoped("X-Team"), scoped("X-Tenant")],
            "/",
        )
        .unwrap();

        let unmatched = store.unmatched_deny_scopes();
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].as_str(), "x-tenant");
    }

    #[test]
    fn test_load_strict_reports_errors() {
        let bad = PolicySection::Text("not a rule".into());
        assert!(PolicyStore::load_strict(Some(&bad), None, "/").is_err());
        assert!(PolicyStore::load_strict(None, None, "/").unwrap().header_rules().is_empty());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[accepted_headers]]
            name = "X-Role"
            values = ["admin"]

            [[denied_paths]]
            header_values = "admin"
            paths = ["/secrets"]
            "#
        )
        .unwrap();

        let store = PolicyStore::load_file(file.path(), "/health", false).unwrap();
        assert_eq!(store.header_rules().len(), 1);
        assert!(store.path_deny().denied_for_value("admin").unwrap().contains("/secrets"));

        let missing = PolicyStore::load_file(Path::new("/nonexistent/policy.toml"), "/", false);
        assert!(matches!(missing, Err(PolicyError::Io { .. })));
    }

    #[test]
    fn test_handle_replace_keeps_old_snapshot() {
        let handle = PolicyHandle::new(PolicyStore::default());
        let before = handle.snapshot();

        let next = PolicyStore::from_entries(
            &[HeaderRuleEntry { name: "X-Role".into(), values: vec!["admin".into()] }],
            &[],
            "/",
        )
        .unwrap();
        handle.replace(next);

        assert!(before.header_rules().is_empty());
        assert_eq!(handle.snapshot().header_rules().len(), 1);
    }
}
