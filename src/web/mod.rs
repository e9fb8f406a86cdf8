//! Web layer: handlers, decorators and typed responses.
//!
//! # Data Flow
//! ```text
//! HandlerRule (routing)
//!     → handler.rs (serve_web: build context, run composed handler)
//!     → context.rs (WebContext: request view + write-once response)
//!     → response.rs (JSON / HTML / redirect finalized once)
//! ```

pub mod context;
pub mod handler;
pub mod response;

pub use context::{Request, Response, WebContext};
pub use handler::{compose, decorator_fn, handler_fn, serve_web, BoxedWebHandler, Decorator, WebHandler};
pub use response::{
    ApiEnvelope, HtmlResponse, HttpResponse, JsonResponse, RedirectResponse, Reply, ResponseError,
};
