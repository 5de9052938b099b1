//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all proxy handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind the server to a listener with graceful shutdown
//! - Map gating transport errors to status codes
//! - Record request metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::http::transport::{GatingTransport, TransportError};
use crate::observability::metrics;
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<GatingTransport>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(transport: Arc<GatingTransport>, timeouts: &TimeoutConfig) -> Self {
        let state = AppState { transport };
        let router = Self::build_router(state, Duration::from_secs(timeouts.read_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, read_timeout: Duration) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(read_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward every request through the gating transport.
async fn proxy_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    strip_hop_by_hop(request.headers_mut());
    if let Some(ConnectInfo(client)) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .copied()
    {
        append_forwarded_for(request.headers_mut(), client.ip());
    }

    match state.transport.round_trip(request).await {
        Ok(mut response) => {
            strip_hop_by_hop(response.headers_mut());
            metrics::record_request(method.as_str(), response.status().as_u16(), "allowed", start);
            response
        }
        Err(err) => {
            let response = error_response(&err);
            let outcome = match err.rejection() {
                Some(rejection) => {
                    metrics::record_denied(rejection.reason);
                    rejection.reason.as_str()
                }
                None => "upstream_error",
            };
            metrics::record_request(method.as_str(), response.status().as_u16(), outcome, start);
            response
        }
    }
}

/// Map a transport error to the response the client sees.
///
/// Denials carry the rejection status and an empty body. Everything else is a 502.
pub fn error_response(err: &TransportError) -> Response {
    match err {
        TransportError::Unauthorized(rejection) => rejection.status.into_response(),
        other => {
            tracing::warn!(error = %other, "Upstream request failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
