//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Provide the logger injected into the dispatch handler
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log filter configurable via config and `RUST_LOG`
//! - The handler logs through an injected `DispatchLogger`, never a global
//!   per-module lookup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::routing::DispatchFailure;

/// Sink for the errors the dispatch handler reports.
pub trait DispatchLogger: Send + Sync {
    /// A rule failed; the response it wrote has already been sent.
    fn dispatch_failed(&self, failure: &DispatchFailure);

    /// The audit callback panicked on its detached task.
    fn audit_panicked(&self, message: &str);
}

/// Logs through `tracing`. Events carry a `module` field: `dispatch` for
/// rule failures, `audit` for audit delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl DispatchLogger for TracingLogger {
    fn dispatch_failed(&self, failure: &DispatchFailure) {
        tracing::error!(
            module = "dispatch",
            code = failure.code.as_u16(),
            error = %failure.error,
            "Request failed"
        );
    }

    fn audit_panicked(&self, message: &str) {
        tracing::error!(
            module = "audit",
            panic = %message,
            "Request log handler panicked"
        );
    }
}

/// Install the global subscriber.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
