//! Header-gated reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::server ──▶ http::transport ──▶ security::admission
//!                    (hop-by-hop,     (rewrite to          (healthcheck bypass,
//!                     request ID)      upstream)            header allowlist,
//!                                          │                path denylist)
//!                                          │ allowed             │ denied
//!                                          ▼                     ▼
//!                                   http::upstream          403, empty body
//!                                   (hyper + rustls)
//!                                          │
//!     Client Response ◀────────────────────┘
//!
//!     Cross-cutting: config (TOML + env), policy (ArcSwap snapshot, file watch),
//!                    observability (tracing, Prometheus), lifecycle (signals)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use header_gate::config::load_config;
use header_gate::lifecycle::{signals, Gateway, Shutdown};
use header_gate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "header-gate")]
#[command(about = "Reverse proxy that admits requests by header value and path", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "HEADER_GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        upstream = %config.upstream.url,
        bind_address = %config.listener.bind_address,
        "header-gate starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Gateway::build(&config)
        .inspect_err(|e| tracing::error!(error = %e, "Startup failed"))?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let _watcher = gateway.watcher;
    gateway.server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
