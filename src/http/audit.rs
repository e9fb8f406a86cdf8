//! Per-request audit records.
//!
//! # Responsibilities
//! - Build the audit record once the response has been produced
//! - Deliver it to the caller's callback off the request path
//! - Contain callback panics
//!
//! # Design Decisions
//! - One detached blocking task per delivery; never joined by the handler
//! - No callback configured = nothing spawned
//! - A form that fails to parse is recorded as an empty body
//! - A callback panic reaches the injected logger exactly once; the process
//!   panic hook still runs first and prints to stderr as usual

use axum::http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::http::request::{FormValues, IncomingRequest};
use crate::observability::DispatchLogger;

/// Callback receiving one audit record per request.
///
/// Delivery is asynchronous: the client may already have the response.
pub type RequestLogHandler = Arc<dyn Fn(&RequestContext) + Send + Sync>;

/// Summary of one completed request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ua: String,
    pub method: String,
    pub referer: String,
    pub headers: HeaderMap,
    pub uri: String,
    pub body: FormValues,
    pub consume: Duration,
    pub code: u16,
}

impl RequestContext {
    pub fn from_request(req: &IncomingRequest, consume: Duration, code: StatusCode) -> Self {
        Self {
            ua: req.user_agent().to_string(),
            method: req.method().to_string(),
            referer: req.referer().to_string(),
            headers: req.headers().clone(),
            uri: req.request_uri().to_string(),
            body: req.form().cloned().unwrap_or_default(),
            consume,
            code: code.as_u16(),
        }
    }

    /// Flatten into a JSON object. `consume` becomes seconds with four
    /// fractional digits.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ua".into(), Value::from(self.ua.as_str()));
        map.insert("method".into(), Value::from(self.method.as_str()));
        map.insert("referer".into(), Value::from(self.referer.as_str()));
        map.insert("headers".into(), headers_to_json(&self.headers));
        map.insert("uri".into(), Value::from(self.uri.as_str()));
        map.insert(
            "body".into(),
            Value::Object(
                self.body
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect(),
            ),
        );
        map.insert(
            "consume".into(),
            Value::from(format!("{:.4}", self.consume.as_secs_f64())),
        );
        map.insert("code".into(), Value::from(self.code));
        map
    }
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| Value::from(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        map.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(map)
}

/// Hands audit records to the configured callback.
#[derive(Clone)]
pub struct AuditLogger {
    handler: Option<RequestLogHandler>,
    logger: Arc<dyn DispatchLogger>,
}

impl AuditLogger {
    pub fn new(handler: Option<RequestLogHandler>, logger: Arc<dyn DispatchLogger>) -> Self {
        Self { handler, logger }
    }

    pub fn is_enabled(&self) -> bool {
        self.handler.is_some()
    }

    /// Record a completed request.
    ///
    /// Returns the handle of the delivery task, or `None` when no callback is
    /// configured. Callers normally drop the handle.
    pub fn record(
        &self,
        request: Arc<IncomingRequest>,
        consume: Duration,
        code: StatusCode,
    ) -> Option<JoinHandle<()>> {
        if !request.is_form_parsed() {
            // parse errors surface as an empty body
            let _ = request.form();
        }

        let handler = self.handler.clone()?;
        let logger = self.logger.clone();
        Some(tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let record = RequestContext::from_request(&request, consume, code);
                handler(&record);
            }));
            if let Err(payload) = outcome {
                logger.audit_panicked(&panic_message(payload.as_ref()));
            }
        }))
    }
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
