//! rulegate server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (trace, request id, timeout layers)
//!                        │
//!                        ▼
//!                  DispatchHandler ──▶ RuleDispatcher ──▶ first matching rule
//!                        │
//!                        ├──▶ metrics (Prometheus)
//!                        └──▶ audit record ──▶ `rulegate::access` log target
//! ```

use axum::Router;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use rulegate::config::load_config;
use rulegate::http::{create_http_handler, DispatchConfig, RequestContext};
use rulegate::observability::{init_tracing, metrics};

#[derive(Parser)]
#[command(name = "rulegate")]
#[command(about = "Rule-dispatching HTTP server", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "rulegate.toml")]
    config: PathBuf,

    /// Override the bind address (e.g. 127.0.0.1:8080)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_tracing(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        rules = config.rules.len(),
        "rulegate starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut dispatch = DispatchConfig::from_server_config(&config);
    if config.observability.audit_log {
        dispatch = dispatch.with_request_log_handler(log_request);
    }
    let handler = create_http_handler(dispatch);

    let app = build_router(handler, Duration::from_secs(config.request_timeout_secs));

    let bind = cli.bind.unwrap_or_else(|| config.bind_address());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[allow(deprecated)]
fn build_router(handler: rulegate::DispatchHandler, timeout: Duration) -> Router {
    Router::new()
        .fallback_service(handler)
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn log_request(record: &RequestContext) {
    let fields = serde_json::Value::Object(record.to_map());
    tracing::info!(target: "rulegate::access", record = %fields, "request");
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
