//! Request admission decisions.
//!
//! # Responsibilities
//! - Bypass every rule for the healthcheck path
//! - Require every header rule to match (AND semantics, short-circuit)
//! - Deny paths listed for the request's discriminator value
//!
//! # Design Decisions
//! - Pure: no logging, no I/O, no state beyond the policy snapshot
//! - Absent or non-UTF-8 headers read as the empty string
//! - The discriminator is the value of the first configured header rule

use axum::http::{HeaderMap, HeaderName};
use serde::Serialize;

use crate::policy::PolicyStore;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// A header rule was not satisfied.
    UnauthorizedHeader,
    /// The path is denied for the request's header value.
    DeniedPath,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::UnauthorizedHeader => "unauthorized_header",
            DenyReason::DeniedPath => "denied_path",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A decision together with what the gate saw, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission<'a> {
    pub decision: Decision,
    /// Value of the first header rule, `""` when absent or when no rule is configured.
    pub discriminator: &'a str,
    /// True when the healthcheck path skipped evaluation.
    pub bypassed: bool,
}

/// Decide whether a request may be forwarded.
pub fn decide(store: &PolicyStore, headers: &HeaderMap, path: &str) -> Decision {
    evaluate(store, headers, path).decision
}

/// Same as [`decide`], also reporting the discriminator value.
pub fn evaluate<'a>(store: &PolicyStore, headers: &'a HeaderMap, path: &str) -> Admission<'a> {
    if path == store.healthcheck_path() {
        return Admission {
            decision: Decision::Allow,
            discriminator: "",
            bypassed: true,
        };
    }

    let mut discriminator = "";
    for (index, rule) in store.header_rules().iter().enumerate() {
        let value = header_value(headers, rule.name());
        if !rule.accepts(value) {
            return Admission {
                decision: Decision::Deny(DenyReason::UnauthorizedHeader),
                discriminator,
                bypassed: false,
            };
        }
        if index == 0 {
            discriminator = value;
        }
    }

    let table = store.path_deny();
    let denied_by_value = table
        .denied_for_value(discriminator)
        .is_some_and(|paths| paths.contains(path));
    let denied_by_header = || {
        store.header_rules().iter().any(|rule| {
            table
                .denied_for_header(rule.name(), header_value(headers, rule.name()))
                .is_some_and(|paths| paths.contains(path))
        })
    };

    let decision = if denied_by_value || denied_by_header() {
        Decision::Deny(DenyReason::DeniedPath)
    } else {
        Decision::Allow
    };

    Admission {
        decision,
        discriminator,
        bypassed: false,
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}
