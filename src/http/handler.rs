//! Entry handler.
//!
//! # Responsibilities
//! - Buffer the request and hand it to the rule dispatcher
//! - Take the written status code from the dispatcher
//! - Log dispatch failures through the injected logger
//! - Record metrics and the audit record once the response is produced
//!
//! # Design Decisions
//! - Rules are synchronous; dispatch runs on the blocking pool
//! - Each request runs on a spawned task that outlives a dropped caller
//! - A dispatch failure never replaces the response already written
//! - Implements `tower::Service` so any hyper/axum server can host it

use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

use crate::config::ServerConfig;
use crate::http::audit::{AuditLogger, RequestContext, RequestLogHandler};
use crate::http::request::IncomingRequest;
use crate::http::writer::{BufferedResponse, ResponseWriter};
use crate::observability::{metrics, DispatchLogger, TracingLogger};
use crate::routing::{build_rules, DispatchFailure, Rule, RuleDispatcher, RuleError, ServeContext};

/// Everything needed to build a [`DispatchHandler`].
#[derive(Clone)]
pub struct DispatchConfig {
    /// Only the directory of this file is used, as the serving root.
    pub endpoint_file: PathBuf,
    pub server_ip: String,
    pub server_port: u16,
    pub software_name: String,
    pub software_version: String,
    pub max_body_bytes: usize,
    pub rules: Vec<Arc<dyn Rule>>,
    pub request_log_handler: Option<RequestLogHandler>,
}

impl DispatchConfig {
    /// Compile the rules of a loaded configuration. No audit callback is set.
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            endpoint_file: config.endpoint_file.clone(),
            server_ip: config.server_ip.clone(),
            server_port: config.server_port,
            software_name: config.software_name.clone(),
            software_version: config.software_version.clone(),
            max_body_bytes: config.max_body_bytes,
            rules: build_rules(&config.rules),
            request_log_handler: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn with_request_log_handler(
        mut self,
        handler: impl Fn(&RequestContext) + Send + Sync + 'static,
    ) -> Self {
        self.request_log_handler = Some(Arc::new(handler));
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from_server_config(&ServerConfig::default())
    }
}

impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("endpoint_file", &self.endpoint_file)
            .field("server_ip", &self.server_ip)
            .field("server_port", &self.server_port)
            .field("software_name", &self.software_name)
            .field("software_version", &self.software_version)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("rules", &self.rules)
            .field("request_log_handler", &self.request_log_handler.is_some())
            .finish()
    }
}

/// Build a handler that logs through `tracing`.
pub fn create_http_handler(config: DispatchConfig) -> DispatchHandler {
    DispatchHandler::new(config, Arc::new(TracingLogger::default()))
}

/// Outer request handler: dispatch, status capture, audit.
#[derive(Clone)]
pub struct DispatchHandler {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: RuleDispatcher,
    audit: AuditLogger,
    logger: Arc<dyn DispatchLogger>,
    max_body_bytes: usize,
}

type DispatchOutput = (BufferedResponse, Result<StatusCode, DispatchFailure>);

impl DispatchHandler {
    pub fn new(config: DispatchConfig, logger: Arc<dyn DispatchLogger>) -> Self {
        let root = serving_root(&config.endpoint_file);
        let context = ServeContext {
            server_name: config.server_ip,
            server_port: config.server_port.to_string(),
            software_name: config.software_name,
            software_version: config.software_version,
            ..ServeContext::new(root)
        };

        tracing::debug!(
            root = %context.root.display(),
            rules = config.rules.len(),
            audit = config.request_log_handler.is_some(),
            "Dispatch handler created"
        );

        Self {
            inner: Arc::new(Inner {
                dispatcher: RuleDispatcher::new(config.rules, context),
                audit: AuditLogger::new(config.request_log_handler, logger.clone()),
                logger,
                max_body_bytes: config.max_body_bytes,
            }),
        }
    }

    pub fn serve_context(&self) -> &ServeContext {
        self.inner.dispatcher.context()
    }

    /// Serve one request.
    ///
    /// The request runs on its own task, so dispatch, failure logging and the
    /// audit record still complete if the caller stops waiting (timeout,
    /// client disconnect).
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let inner = self.inner.clone();
        match tokio::spawn(inner.serve(request)).await {
            Ok(response) => response,
            Err(err) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(err) => {
                    tracing::error!(error = %err, "Request task cancelled");
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            },
        }
    }
}

impl Inner {
    async fn serve(self: Arc<Self>, request: Request<Body>) -> Response<Body> {
        let start_time = Instant::now();
        let (parts, body) = request.into_parts();

        let (request, (response, result)) = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => {
                let request = Arc::new(IncomingRequest::new(parts, bytes));
                let inner = self.clone();
                let task_request = request.clone();
                let joined =
                    tokio::task::spawn_blocking(move || inner.dispatch(&task_request)).await;
                match joined {
                    Ok(output) => (request, output),
                    Err(err) => match err.try_into_panic() {
                        Ok(payload) => std::panic::resume_unwind(payload),
                        Err(err) => {
                            tracing::error!(error = %err, "Dispatch task cancelled");
                            return StatusCode::SERVICE_UNAVAILABLE.into_response();
                        }
                    },
                }
            }
            Err(err) => {
                let request = Arc::new(IncomingRequest::new(parts, Bytes::new()));
                (request, reject_body(err))
            }
        };

        let code = match &result {
            Ok(code) => *code,
            Err(failure) => {
                self.logger.dispatch_failed(failure);
                failure.code
            }
        };

        let consume = start_time.elapsed();
        metrics::record_request(request.method().as_str(), code.as_u16(), consume);
        self.audit.record(request, consume, code);

        response.into_response()
    }

    fn dispatch(&self, request: &IncomingRequest) -> DispatchOutput {
        let mut response = BufferedResponse::new();
        let result = self.dispatcher.dispatch(&mut response, request);
        (response, result)
    }
}

fn reject_body(err: axum::Error) -> DispatchOutput {
    let code = StatusCode::PAYLOAD_TOO_LARGE;
    let mut response = BufferedResponse::new();
    response.write_header(code);
    let _ = response.write(b"request body too large");
    let failure = DispatchFailure {
        code,
        error: RuleError::RequestBody(err),
    };
    (response, Err(failure))
}

/// Directory of the endpoint file; `.` when it has none.
fn serving_root(endpoint_file: &Path) -> PathBuf {
    match endpoint_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl fmt::Debug for DispatchHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandler")
            .field("dispatcher", &self.inner.dispatcher)
            .field("audit", &self.inner.audit)
            .finish_non_exhaustive()
    }
}

impl Service<Request<Body>> for DispatchHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_root() {
        assert_eq!(serving_root(Path::new("/srv/site/endpoint.toml")), PathBuf::from("/srv/site"));
        assert_eq!(serving_root(Path::new("endpoint.toml")), PathBuf::from("."));
    }

    #[test]
    fn test_serve_context_from_config() {
        let config = DispatchConfig {
            endpoint_file: PathBuf::from("/srv/site/endpoint.toml"),
            server_ip: "127.0.0.1".into(),
            server_port: 8443,
            ..DispatchConfig::default()
        };
        let handler = create_http_handler(config);
        let ctx = handler.serve_context();
        assert_eq!(ctx.root, PathBuf::from("/srv/site"));
        assert_eq!(ctx.fs.root(), Path::new("/srv/site"));
        assert_eq!(ctx.server_name, "127.0.0.1");
        assert_eq!(ctx.server_port, "8443");
        assert_eq!(ctx.software_name, "rulegate");
    }
}
