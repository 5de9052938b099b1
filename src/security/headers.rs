//! Header manipulation for proxied exchanges.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Append the client address to X-Forwarded-For
//!
//! # Design Decisions
//! - Headers named in `Connection` are hop-by-hop too
//! - An existing X-Forwarded-For chain is extended, not replaced

use std::net::IpAddr;

use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue};

/// X-Forwarded-For header.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and must not be forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Append `client` to X-Forwarded-For.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");

    let value = if chain.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", chain, client)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
