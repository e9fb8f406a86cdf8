//! Built-in rules.
//!
//! # Responsibilities
//! - Static files from a directory under the serving root
//! - Redirects
//! - Fixed responses with server identity placeholders
//! - Bridging composed web handlers into dispatch
//! - Compiling `RuleConfig` entries into rules at startup

use axum::http::{header, HeaderValue, Method, StatusCode};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ActionConfig, RuleConfig};
use crate::http::{IncomingRequest, ResponseWriter};
use crate::routing::dispatcher::write_text;
use crate::routing::fs::{content_type_for, is_not_found};
use crate::routing::matcher::{
    strip_path_prefix, AndMatcher, ExactPathMatcher, HostMatcher, Matcher, MethodMatcher, PathPrefixMatcher,
};
use crate::routing::{Rule, RuleError, ServeContext};
use crate::web::{serve_web, BoxedWebHandler};

/// Serves files from `dir` (relative to the serving root).
#[derive(Debug)]
pub struct StaticRule {
    name: String,
    matcher: AndMatcher,
    strip_prefix: Option<String>,
    dir: PathBuf,
    index: String,
}

impl StaticRule {
    pub fn new(name: impl Into<String>, matcher: AndMatcher, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            matcher,
            strip_prefix: None,
            dir: dir.into(),
            index: "index.html".to_string(),
        }
    }

    /// Remove `prefix` from the request path before resolving the file.
    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }
}

impl Rule for StaticRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, req: &IncomingRequest) -> bool {
        self.matcher.matches(req)
    }

    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        req: &IncomingRequest,
        ctx: &ServeContext,
    ) -> Result<(), RuleError> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            w.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            return write_text(w, StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let path = match &self.strip_prefix {
            Some(prefix) => strip_path_prefix(req.path(), prefix).unwrap_or(req.path()),
            None => req.path(),
        };

        match ctx.fs.sub(&self.dir).read(path, &self.index) {
            Ok((file, data)) => {
                w.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(content_type_for(&file)),
                );
                w.write_header(StatusCode::OK);
                if req.method() != Method::HEAD {
                    w.write(&data)?;
                }
                Ok(())
            }
            Err(RuleError::Io(err)) if is_not_found(&err) => {
                write_text(w, StatusCode::NOT_FOUND, "not found")
            }
            Err(err @ RuleError::Forbidden(_)) => {
                write_text(w, StatusCode::FORBIDDEN, "forbidden")?;
                Err(err)
            }
            Err(err) => {
                write_text(w, StatusCode::INTERNAL_SERVER_ERROR, "internal server error")?;
                Err(err)
            }
        }
    }
}

/// Redirects every matching request to a fixed location.
#[derive(Debug)]
pub struct RedirectRule {
    name: String,
    matcher: AndMatcher,
    location: String,
    code: StatusCode,
}

impl RedirectRule {
    pub fn new(name: impl Into<String>, matcher: AndMatcher, location: impl Into<String>, code: StatusCode) -> Self {
        Self {
            name: name.into(),
            matcher,
            location: location.into(),
            code,
        }
    }
}

impl Rule for RedirectRule {
    fn name(&self) -> &str {
        &self.name
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
        let location = HeaderValue::from_str(&self.location)
            .map_err(|e| RuleError::Response(e.into()))?;
        w.headers_mut().insert(header::LOCATION, location);
        w.write_header(self.code);
        Ok(())
    }
}

/// Writes a fixed response.
///
/// The body may reference `{server_name}`, `{server_port}`, `{software_name}`,
/// `{software_version}`, `{path}` and `{method}`.
#[derive(Debug)]
pub struct RespondRule {
    name: String,
    matcher: AndMatcher,
    status: StatusCode,
    content_type: HeaderValue,
    body: String,
}

impl RespondRule {
    pub fn new(
        name: impl Into<String>,
        matcher: AndMatcher,
        status: StatusCode,
        content_type: HeaderValue,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            matcher,
            status,
            content_type,
            body: body.into(),
        }
    }

    fn render(&self, req: &IncomingRequest, ctx: &ServeContext) -> String {
        self.body
            .replace("{server_name}", &ctx.server_name)
            .replace("{server_port}", &ctx.server_port)
            .replace("{software_name}", &ctx.software_name)
            .replace("{software_version}", &ctx.software_version)
            .replace("{path}", req.path())
            .replace("{method}", req.method().as_str())
    }
}

impl Rule for RespondRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, req: &IncomingRequest) -> bool {
        self.matcher.matches(req)
    }

    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        req: &IncomingRequest,
        ctx: &ServeContext,
    ) -> Result<(), RuleError> {
        let body = self.render(req, ctx);
        w.headers_mut()
            .insert(header::CONTENT_TYPE, self.content_type.clone());
        w.write_header(self.status);
        if !body.is_empty() {
            w.write(body.as_bytes())?;
        }
        Ok(())
    }
}

/// Serves matching requests with a (usually composed) web handler.
pub struct HandlerRule {
    name: String,
    matcher: Box<dyn Matcher>,
    handler: BoxedWebHandler,
}

impl HandlerRule {
    pub fn new(name: impl Into<String>, matcher: impl Matcher + 'static, handler: BoxedWebHandler) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
            handler,
        }
    }
}

impl fmt::Debug for HandlerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRule")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl Rule for HandlerRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, req: &IncomingRequest) -> bool {
        self.matcher.matches(req)
    }

    fn serve(
        &self,
        w: &mut dyn ResponseWriter,
        req: &IncomingRequest,
        _ctx: &ServeContext,
    ) -> Result<(), RuleError> {
        serve_web(self.handler.as_ref(), w, req)?;
        Ok(())
    }
}

/// Compile the match conditions of a configured rule.
pub fn matcher_for(config: &RuleConfig) -> AndMatcher {
    let mut matcher = AndMatcher::default();
    if let Some(host) = &config.host {
        matcher.push(HostMatcher::new(host.as_str()));
    }
    if let Some(path) = &config.path {
        matcher.push(ExactPathMatcher::new(path.as_str()));
    }
    if let Some(prefix) = &config.path_prefix {
        matcher.push(PathPrefixMatcher::new(prefix.as_str()));
    }
    if !config.methods.is_empty() {
        let methods = config
            .methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok());
        matcher.push(MethodMatcher::new(methods));
    }
    matcher
}

/// Compile configured rules, in order.
///
/// Entries that cannot be compiled (invalid codes or header values) are
/// skipped with an error log; `validate_config` reports them up front.
pub fn build_rules(configs: &[RuleConfig]) -> Vec<Arc<dyn Rule>> {
    configs
        .iter()
        .filter_map(|config| match build_rule(config) {
            Some(rule) => Some(rule),
            None => {
                tracing::error!(rule = %config.name, "Skipping rule with invalid action");
                None
            }
        })
        .collect()
}

fn build_rule(config: &RuleConfig) -> Option<Arc<dyn Rule>> {
    let matcher = matcher_for(config);
    let rule: Arc<dyn Rule> = match &config.action {
        ActionConfig::Static { dir, index } => {
            let mut rule = StaticRule::new(config.name.clone(), matcher, dir.clone()).index(index.clone());
            if let Some(prefix) = &config.path_prefix {
                rule = rule.strip_prefix(prefix.clone());
            }
            Arc::new(rule)
        }
        ActionConfig::Redirect { location, code } => {
            let code = StatusCode::from_u16(*code).ok().filter(StatusCode::is_redirection)?;
            Arc::new(RedirectRule::new(config.name.clone(), matcher, location.clone(), code))
        }
        ActionConfig::Respond { status, content_type, body } => {
            let status = StatusCode::from_u16(*status).ok()?;
            let content_type = HeaderValue::from_str(content_type).ok()?;
            Arc::new(RespondRule::new(config.name.clone(), matcher, status, content_type, body.clone()))
        }
    };
    Some(rule)
}
