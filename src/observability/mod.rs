//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch handler produces:
//!     → logging.rs (structured log events via the injected logger)
//!     → metrics.rs (counters, histograms)
//!     → http::audit (per-request audit records to the caller's callback)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, DispatchLogger, TracingLogger};
