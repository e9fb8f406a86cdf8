//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use rulegate::http::{DispatchConfig, DispatchHandler, IncomingRequest, ResponseWriter};
use rulegate::observability::DispatchLogger;
use rulegate::routing::{DispatchFailure, Rule, RuleError, ServeContext};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Logger that keeps every event for inspection.
#[derive(Default)]
pub struct RecordingLogger {
    pub failures: Mutex<Vec<(u16, String)>>,
    pub panics: Mutex<Vec<String>>,
}

impl DispatchLogger for RecordingLogger {
    fn dispatch_failed(&self, failure: &DispatchFailure) {
        self.failures
            .lock()
            .unwrap()
            .push((failure.code.as_u16(), failure.to_string()));
    }

    fn audit_panicked(&self, message: &str) {
        self.panics.lock().unwrap().push(message.to_string());
    }
}

/// Rule that matches one exact path and writes a fixed status and body.
#[derive(Debug)]
pub struct FixedRule {
    pub path: &'static str,
    pub code: StatusCode,
    pub body: &'static str,
    pub delay: Duration,
    pub fail: bool,
}

impl FixedRule {
    pub fn new(path: &'static str, code: StatusCode, body: &'static str) -> Self {
        Self {
            path,
            code,
            body,
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return an error after writing the response.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Rule for FixedRule {
    fn name(&self) -> &str {
        self.path
    }

    fn matches(&self, req: &IncomingRequest) -> bool {
        req.path() == self.path
    }

    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        _req: &IncomingRequest,
        _ctx: &ServeContext,
    ) -> Result<(), RuleError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        w.write_header(self.code);
        w.write(self.body.as_bytes())?;
        if self.fail {
            let err = io::Error::new(io::ErrorKind::Other, format!("{} backend offline", self.path));
            return Err(RuleError::Io(err));
        }
        Ok(())
    }
}

/// Handler wired to a [`RecordingLogger`].
pub fn handler_with_logger(config: DispatchConfig) -> (DispatchHandler, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::default());
    (DispatchHandler::new(config, logger.clone()), logger)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(handler: &DispatchHandler, request: Request<Body>) -> Response<Body> {
    handler.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
