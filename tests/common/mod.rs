//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{body::Body, http::Request, routing::any, Router};
use tokio::net::TcpListener;

use header_gate::config::GatewayConfig;
use header_gate::lifecycle::{Gateway, Shutdown};
use header_gate::policy::PolicySection;

/// What the mock backend saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub host: Option<String>,
    pub forwarded_for: Option<String>,
}

/// Requests received by a mock backend, in arrival order.
pub type Seen = Arc<Mutex<Vec<SeenRequest>>>;

/// Start a backend on a free loopback port that answers 200 "backend".
pub async fn start_mock_backend() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();
    let recorder = seen.clone();

    let app = Router::new().fallback(any(move |request: Request<Body>| {
        let recorder = recorder.clone();
        async move {
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            recorder.lock().unwrap().push(SeenRequest {
                path: request.uri().path().to_string(),
                host: header("host"),
                forwarded_for: header("x-forwarded-for"),
            });
            "backend"
        }
    }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}

/// Config forwarding to `upstream` with the given inline policy text.
pub fn gateway_config(upstream: &str, accepted: &str, denied: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.url = upstream.to_string();
    config.policy.healthcheck_path = "/health".to_string();
    config.policy.accepted_headers = Some(PolicySection::Text(accepted.to_string()));
    config.policy.denied_paths = Some(PolicySection::Text(denied.to_string()));
    config
}

/// Start the gateway on a free loopback port. Dropping the returned
/// [`Shutdown`] does not stop it; call `trigger`.
pub async fn start_gateway(config: &GatewayConfig) -> (SocketAddr, Shutdown) {
    let gateway = Gateway::build(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = gateway.server.run(listener, receiver).await;
    });
    (addr, shutdown)
}
