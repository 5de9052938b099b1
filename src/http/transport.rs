//! Gating transport.
//!
//! # Responsibilities
//! - Rewrite every outbound request to the upstream host
//! - Consult the admission gate before any byte leaves the process
//! - Short-circuit denied requests with a rejection, no network I/O
//! - Delegate allowed requests to the wrapped executor, unmodified
//!
//! # Design Decisions
//! - Holds no per-request mutable state; safe to share across tasks
//! - The policy snapshot is taken per request and released before awaiting
//! - Upstream failures pass through untouched

use std::sync::Arc;

use axum::body::Body;
use axum::http::uri::InvalidUriParts;
use axum::http::{Request, Response, StatusCode};

use crate::http::upstream::{RoundTrip, UpstreamError, UpstreamTarget};
use crate::observability::logging::ExchangeLog;
use crate::policy::PolicyHandle;
use crate::security::admission::{self, Decision, DenyReason};

/// The status and reason a denied request is answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: DenyReason,
}

impl Rejection {
    pub fn new(reason: DenyReason) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            reason,
        }
    }
}

/// Error returned by [`GatingTransport::round_trip`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The admission gate refused the request.
    #[error("unauthorized request")]
    Unauthorized(Rejection),

    #[error("failed to rewrite request target: {0}")]
    Rewrite(#[from] InvalidUriParts),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl TransportError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TransportError::Unauthorized(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Enforces the admission policy in front of a [`RoundTrip`] executor.
pub struct GatingTransport {
    target: UpstreamTarget,
    policy: PolicyHandle,
    executor: Arc<dyn RoundTrip>,
    exchange_log: ExchangeLog,
}

impl GatingTransport {
    pub fn new(
        target: UpstreamTarget,
        policy: PolicyHandle,
        executor: Arc<dyn RoundTrip>,
        exchange_log: ExchangeLog,
    ) -> Self {
        Self {
            target,
            policy,
            executor,
            exchange_log,
        }
    }

    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    /// Forward `request` if the policy admits it.
    pub async fn round_trip(&self, mut request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let path = request.uri().path().to_string();
        self.target.rewrite(&mut request)?;

        self.exchange_log
            .request(request.method(), &path, request.headers());

        let decision = {
            let policy = self.policy.snapshot();
            let admission = admission::evaluate(&policy, request.headers(), &path);
            self.exchange_log.decision(&path, &admission);
            admission.decision
        };

        if let Decision::Deny(reason) = decision {
            return Err(TransportError::Unauthorized(Rejection::new(reason)));
        }

        let response = self.executor.round_trip(request).await?;
        self.exchange_log
            .response(&path, response.status(), response.headers());
        Ok(response)
    }
}
