//! Rule lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the ordered rule set and the static serving context
//! - Pick the first rule that matches the request and run it
//! - Report the status code actually written, on success and on failure
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First match wins, in declaration order
//! - No match writes 404 and counts as a successful dispatch

use axum::http::{header, HeaderValue, StatusCode};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::http::{IncomingRequest, ResponseWriter, StatusCapturingWriter};
use crate::routing::{DispatchFailure, RuleError, StaticDir};

/// A matcher plus the action that serves matching requests.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Returns true if this rule should serve the request.
    fn matches(&self, req: &IncomingRequest) -> bool;

    /// Write the response for `req`.
    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        req: &IncomingRequest,
        ctx: &ServeContext,
    ) -> Result<(), RuleError>;
}

/// Static context shared by every rule invocation.
#[derive(Debug, Clone)]
pub struct ServeContext {
    /// Directory holding the endpoint file.
    pub root: PathBuf,
    /// File-system view rooted at `root`.
    pub fs: StaticDir,
    pub server_name: String,
    /// Listening port as decimal text.
    pub server_port: String,
    pub software_name: String,
    pub software_version: String,
}

impl ServeContext {
    pub fn new(root: PathBuf) -> Self {
        Self {
            fs: StaticDir::new(root.clone()),
            root,
            server_name: String::new(),
            server_port: String::new(),
            software_name: String::new(),
            software_version: String::new(),
        }
    }
}

/// Runs the first matching rule against a request.
#[derive(Debug)]
pub struct RuleDispatcher {
    rules: Vec<Arc<dyn Rule>>,
    context: ServeContext,
}

impl RuleDispatcher {
    pub fn new(rules: Vec<Arc<dyn Rule>>, context: ServeContext) -> Self {
        Self { rules, context }
    }

    pub fn context(&self) -> &ServeContext {
        &self.context
    }

    /// Serve `req` and return the status code written to `w`.
    ///
    /// On failure the returned code is still whatever the rule wrote before
    /// failing; the response is not rewritten.
    pub fn dispatch(
        &self,
        w: &mut dyn ResponseWriter,
        req: &IncomingRequest,
    ) -> Result<StatusCode, DispatchFailure> {
        let mut written = None;
        let result = {
            let mut w = StatusCapturingWriter::new(w, |code| written = Some(code));
            match self.rules.iter().find(|rule| rule.matches(req)) {
                Some(rule) => {
                    tracing::debug!(rule = rule.name(), path = req.path(), "Rule matched");
                    rule.serve(&mut w, req, &self.context)
                }
                None => {
                    tracing::debug!(path = req.path(), "No rule matched");
                    not_found(&mut w)
                }
            }
        };

        let code = written.unwrap_or(StatusCode::OK);
        result
            .map(|()| code)
            .map_err(|error| DispatchFailure { code, error })
    }
}

fn not_found(w: &mut dyn ResponseWriter) -> Result<(), RuleError> {
    write_text(w, StatusCode::NOT_FOUND, "no rule matched")
}

/// Write a plain-text response.
pub(crate) fn write_text(
    w: &mut dyn ResponseWriter,
    code: StatusCode,
    body: &str,
) -> Result<(), RuleError> {
    w.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    w.write_header(code);
    w.write(body.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::BufferedResponse;
    use crate::routing::matcher::{Matcher, PathPrefixMatcher};
    use axum::body::Bytes;
    use axum::http::Request;

    #[derive(Debug)]
    struct FixedRule {
        name: &'static str,
        matcher: PathPrefixMatcher,
        code: StatusCode,
        fail: bool,
    }

    impl Rule for FixedRule {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(&self, req: &IncomingRequest) -> bool {
            self.matcher.matches(req)
        }

        fn serve(
            &self,
            w: &mut dyn ResponseWriter,
            _req: &IncomingRequest,
            _ctx: &ServeContext,
        ) -> Result<(), RuleError> {
            w.write_header(self.code);
            w.write(self.name.as_bytes())?;
            if self.fail {
                return Err(RuleError::Forbidden("/secret".into()));
            }
            Ok(())
        }
    }

    fn rule(name: &'static str, prefix: &str, code: StatusCode, fail: bool) -> Arc<dyn Rule> {
        Arc::new(FixedRule {
            name,
            matcher: PathPrefixMatcher::new(prefix),
            code,
            fail,
        })
    }

    fn request(uri: &str) -> IncomingRequest {
        IncomingRequest::from_request(Request::builder().uri(uri).body(Bytes::new()).unwrap())
    }

    #[test]
    fn test_first_match_wins() {
        let dispatcher = RuleDispatcher::new(
            vec![
                rule("api", "/api", StatusCode::ACCEPTED, false),
                rule("catch-all", "/", StatusCode::OK, false),
            ],
            ServeContext::new(PathBuf::from(".")),
        );

        let mut out = BufferedResponse::new();
        let code = dispatcher.dispatch(&mut out, &request("/api/users")).unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(out.body(), b"api");

        let mut out = BufferedResponse::new();
        let code = dispatcher.dispatch(&mut out, &request("/home")).unwrap();
        assert_eq!(code, StatusCode::OK);
        assert_eq!(out.body(), b"catch-all");
    }

    #[test]
    fn test_empty_rule_set_writes_not_found() {
        let dispatcher = RuleDispatcher::new(Vec::new(), ServeContext::new(PathBuf::from(".")));

        let mut out = BufferedResponse::new();
        let code = dispatcher.dispatch(&mut out, &request("/")).unwrap();
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
        assert_eq!(out.body(), b"no rule matched");
    }

    #[test]
    fn test_failure_keeps_written_code() {
        let dispatcher = RuleDispatcher::new(
            vec![rule("secret", "/secret", StatusCode::FORBIDDEN, true)],
            ServeContext::new(PathBuf::from(".")),
        );

        let mut out = BufferedResponse::new();
        let failure = dispatcher.dispatch(&mut out, &request("/secret")).unwrap_err();
        assert_eq!(failure.code, StatusCode::FORBIDDEN);
        assert!(matches!(failure.error, RuleError::Forbidden(_)));
        assert_eq!(out.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            failure.to_string(),
            "request failed, code=403, err=path escapes the served directory: /secret"
        );
    }
}
