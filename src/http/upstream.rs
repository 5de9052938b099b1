//! Upstream target and network executor.
//!
//! # Responsibilities
//! - Parse the upstream base URL once at startup
//! - Rewrite a request's scheme, authority and Host header to the upstream
//! - Execute allowed requests over HTTP or HTTPS
//!
//! # Design Decisions
//! - `RoundTrip` is the seam the gating transport calls; tests substitute it
//! - Upstream errors are returned as-is, never retried

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUriParts, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri};
use futures_util::future::BoxFuture;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::net::tls::{upstream_client_config, TlsError};

/// Error parsing the upstream base URL.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamUrlError {
    #[error("{0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid authority: {0}")]
    Authority(#[from] axum::http::uri::InvalidUri),

    #[error("invalid host header value")]
    HostHeader(#[from] axum::http::header::InvalidHeaderValue),
}

/// Error returned by a [`RoundTrip`] executor.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
}

/// Where every request is forwarded.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    /// Base path without trailing slash; empty for the root.
    base_path: String,
}

impl UpstreamTarget {
    /// Parse an absolute `http` or `https` URL.
    pub fn parse(raw: &str) -> Result<Self, UpstreamUrlError> {
        let url = Url::parse(raw)?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(UpstreamUrlError::UnsupportedScheme(other.to_string())),
        };
        let host = url.host_str().ok_or(UpstreamUrlError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority)?;
        let host_header = HeaderValue::from_str(authority.as_str())?;
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            scheme,
            authority,
            host_header,
            base_path,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Point `request` at the upstream, preserving path and query.
    pub fn rewrite(&self, request: &mut Request<Body>) -> Result<(), InvalidUriParts> {
        let mut parts = request.uri().clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());

        if !self.base_path.is_empty() {
            let original = parts
                .path_and_query
                .as_ref()
                .map(PathAndQuery::as_str)
                .unwrap_or("/");
            let joined = format!("{}{}", self.base_path, original);
            parts.path_and_query = PathAndQuery::from_str(&joined).ok();
        } else if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }

        *request.uri_mut() = Uri::from_parts(parts)?;
        request
            .headers_mut()
            .insert(header::HOST, self.host_header.clone());
        Ok(())
    }
}

/// Future returned by [`RoundTrip::round_trip`].
pub type RoundTripFuture = BoxFuture<'static, Result<Response<Body>, UpstreamError>>;

/// Sends one request to the network and returns the upstream's response.
pub trait RoundTrip: Send + Sync {
    fn round_trip(&self, request: Request<Body>) -> RoundTripFuture;
}

/// [`RoundTrip`] over a pooled hyper client, HTTP or HTTPS.
#[derive(Clone)]
pub struct HyperUpstream {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperUpstream {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, TlsError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let tls = upstream_client_config(upstream.skip_tls_verify)?;
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client })
    }

    pub fn shared(self) -> Arc<dyn RoundTrip> {
        Arc::new(self)
    }
}

impl RoundTrip for HyperUpstream {
    fn round_trip(&self, request: Request<Body>) -> RoundTripFuture {
        let response = self.client.request(request);
        Box::pin(async move {
            response
                .await
                .map(|response| response.map(Body::new))
                .map_err(UpstreamError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("host", "gateway.local")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_parse_valid_targets() {
        let target = UpstreamTarget::parse("https://backend.internal").unwrap();
        assert_eq!(target.authority().as_str(), "backend.internal");

        let target = UpstreamTarget::parse("http://127.0.0.1:3000/").unwrap();
        assert_eq!(target.authority().as_str(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_invalid_targets() {
        assert!(matches!(UpstreamTarget::parse(""), Err(UpstreamUrlError::Parse(_))));
        assert!(matches!(
            UpstreamTarget::parse("ftp://files.internal"),
            Err(UpstreamUrlError::UnsupportedScheme(_))
        ));
        assert!(UpstreamTarget::parse("backend:3000").is_err());
    }

    #[test]
    fn test_rewrite_preserves_path_and_query() {
        let target = UpstreamTarget::parse("https://backend.internal:8443").unwrap();
        let mut req = request("/api/items?page=2");
        target.rewrite(&mut req).unwrap();

        assert_eq!(req.uri().to_string(), "https://backend.internal:8443/api/items?page=2");
        assert_eq!(req.headers()["host"], "backend.internal:8443");
    }

    #[test]
    fn test_rewrite_joins_base_path() {
        let target = UpstreamTarget::parse("http://backend/base/").unwrap();
        let mut req = request("/items?x=1");
        target.rewrite(&mut req).unwrap();
        assert_eq!(req.uri().to_string(), "http://backend/base/items?x=1");
    }

    #[test]
    fn test_rewrite_absolute_form_request() {
        let target = UpstreamTarget::parse("http://backend:3000").unwrap();
        let mut req = request("http://elsewhere:9999/x");
        target.rewrite(&mut req).unwrap();
        assert_eq!(req.uri().to_string(), "http://backend:3000/x");
    }
}
