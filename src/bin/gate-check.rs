//! Offline admission check.
//!
//! Evaluates one request against the configured policy without starting the
//! proxy and prints the decision as JSON. Exits 0 when the request would be
//! admitted and 2 when it would be denied.

use std::path::PathBuf;
use std::process::ExitCode;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use clap::Parser;
use serde::Serialize;

use header_gate::config::read_config;
use header_gate::lifecycle::build_policy;
use header_gate::security::{evaluate, Decision, DenyReason};

#[derive(Parser)]
#[command(name = "gate-check")]
#[command(about = "Evaluate a request against the header-gate policy", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "HEADER_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Request path, e.g. /api/items
    #[arg(short, long)]
    path: String,

    /// Request header as "Name: value". Repeatable.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(HeaderName, HeaderValue)>,
}

#[derive(Serialize)]
struct Report<'a> {
    decision: &'static str,
    reason: Option<DenyReason>,
    discriminator: &'a str,
    bypassed: bool,
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {:?}", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = read_config(cli.config.as_deref())?;
    let store = build_policy(&config.policy)?;

    let mut headers = HeaderMap::new();
    for (name, value) in cli.headers {
        headers.append(name, value);
    }

    let admission = evaluate(&store, &headers, &cli.path);
    let (decision, reason) = match admission.decision {
        Decision::Allow => ("allow", None),
        Decision::Deny(reason) => ("deny", Some(reason)),
    };

    let report = Report {
        decision,
        reason,
        discriminator: admission.discriminator,
        bypassed: admission.bypassed,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if admission.decision.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
