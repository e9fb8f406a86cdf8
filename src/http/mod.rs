//! HTTP request handling subsystem.
//!
//! # Data Flow
//! ```text
//! hyper/axum connection
//!     → handler.rs (timer, body buffering, tower::Service entry)
//!     → request.rs (buffered request, lazy form parsing)
//!     → writer.rs (status-capturing response writer)
//!     → [routing layer picks and runs a rule]
//!     → audit.rs (record delivered on a detached task)
//!     → Send to client
//! ```

pub mod audit;
pub mod handler;
pub mod request;
pub mod writer;

pub use audit::{AuditLogger, RequestContext, RequestLogHandler};
pub use handler::{create_http_handler, DispatchConfig, DispatchHandler};
pub use request::{FormError, FormValues, IncomingRequest};
pub use writer::{BufferedResponse, ResponseWriter, StatusCapturingWriter};
