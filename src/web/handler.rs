//! Web handlers and decorator composition.
//!
//! # Responsibilities
//! - Define the handler signature used by application code
//! - Wrap handlers in decorators (logging, auth, ...) once, at setup
//! - Run a composed handler against a response writer
//!
//! # Design Decisions
//! - Decorators fold in reverse: the first listed is the outermost
//! - A handler returning `None` has written the response itself

use std::sync::Arc;

use crate::http::{IncomingRequest, ResponseWriter};
use crate::web::context::WebContext;
use crate::web::response::{Reply, ResponseError};

/// Application request handler.
pub trait WebHandler: Send + Sync {
    fn handle(&self, ctx: &mut WebContext<'_>) -> Reply;
}

impl<F> WebHandler for F
where
    F: Fn(&mut WebContext<'_>) -> Reply + Send + Sync,
{
    fn handle(&self, ctx: &mut WebContext<'_>) -> Reply {
        self(ctx)
    }
}

pub type BoxedWebHandler = Arc<dyn WebHandler>;

/// Box a closure as a handler.
pub fn handler_fn<F>(f: F) -> BoxedWebHandler
where
    F: Fn(&mut WebContext<'_>) -> Reply + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a handler into another handler.
pub trait Decorator: Send + Sync {
    fn decorate(&self, next: BoxedWebHandler) -> BoxedWebHandler;
}

impl<F> Decorator for F
where
    F: Fn(BoxedWebHandler) -> BoxedWebHandler + Send + Sync,
{
    fn decorate(&self, next: BoxedWebHandler) -> BoxedWebHandler {
        self(next)
    }
}

/// Box a closure as a decorator.
pub fn decorator_fn<F>(f: F) -> Box<dyn Decorator>
where
    F: Fn(BoxedWebHandler) -> BoxedWebHandler + Send + Sync + 'static,
{
    Box::new(f)
}

/// Wrap `handler` in `decorators`. `decorators[0]` runs first.
pub fn compose(handler: BoxedWebHandler, decorators: Vec<Box<dyn Decorator>>) -> BoxedWebHandler {
    decorators
        .into_iter()
        .rev()
        .fold(handler, |next, decorator| decorator.decorate(next))
}

/// Run `handler` for one request and finalize the reply it returns.
pub fn serve_web(
    handler: &dyn WebHandler,
    w: &mut dyn ResponseWriter,
    request: &IncomingRequest,
) -> Result<(), ResponseError> {
    let mut ctx = WebContext::new(w, request);
    match handler.handle(&mut ctx) {
        Some(reply) => reply.create_response(&mut ctx.response),
        None => Ok(()),
    }
}
