//! Typed response objects.
//!
//! A handler returns one of these (boxed, as a [`Reply`]); the envelope
//! finalizes it against the context's [`Response`] exactly once.

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, Method, StatusCode};
use serde::Serialize;
use std::io;
use thiserror::Error;
use url::Url;

use crate::web::context::{Request, Response};

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub(crate) const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Errors raised while finalizing a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response already finalized")]
    AlreadyFinalized,

    #[error("failed to serialize JSON response: {0}")]
    Serialize(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),
}

/// What a web handler returns. `None` means the handler wrote the response
/// itself.
pub type Reply = Option<Box<dyn HttpResponse>>;

/// A response object that knows how to write itself.
pub trait HttpResponse: Send {
    fn status(&self) -> StatusCode;

    /// Write headers and body. Called at most once per context.
    fn create_response(&self, response: &mut Response<'_>) -> Result<(), ResponseError>;

    /// Box into a [`Reply`].
    fn reply(self) -> Reply
    where
        Self: Sized + 'static,
    {
        Some(Box::new(self))
    }
}

/// JSON body.
#[derive(Debug)]
pub struct JsonResponse {
    status: StatusCode,
    body: Result<Vec<u8>, String>,
}

impl JsonResponse {
    /// Serializes eagerly; a failure is reported when the response is written.
    pub fn new<T: Serialize + ?Sized>(res: &T) -> Self {
        Self {
            status: StatusCode::OK,
            body: serde_json::to_vec(res).map_err(|e| e.to_string()),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Serialized body, if serialization succeeded.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref().ok()
    }
}

impl HttpResponse for JsonResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn create_response(&self, response: &mut Response<'_>) -> Result<(), ResponseError> {
        match &self.body {
            Ok(body) => response.finalize(self.status, Some(JSON_CONTENT_TYPE), body),
            Err(message) => {
                tracing::error!(error = %message, "JSON response serialization failed");
                response.finalize(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some("text/plain; charset=utf-8"),
                    b"internal server error",
                )?;
                Err(ResponseError::Serialize(message.clone()))
            }
        }
    }
}

/// Uniform API envelope.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub code: String,
    pub message: String,
    pub data: T,
}

/// Raw HTML body.
#[derive(Debug, Clone)]
pub struct HtmlResponse {
    status: StatusCode,
    body: String,
}

impl HtmlResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl HttpResponse for HtmlResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn create_response(&self, response: &mut Response<'_>) -> Result<(), ResponseError> {
        response.finalize(self.status, Some(HTML_CONTENT_TYPE), self.body.as_bytes())
    }
}

/// Redirect to another location.
#[derive(Debug, Clone)]
pub struct RedirectResponse {
    location: String,
    code: StatusCode,
    method: Method,
}

impl RedirectResponse {
    /// Path-only targets are cleaned; relative ones resolve against the
    /// directory of the request path.
    pub fn new(request: &Request<'_>, location: &str, code: StatusCode) -> Self {
        Self {
            location: resolve_location(request.path(), location),
            code,
            method: request.method().clone(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl HttpResponse for RedirectResponse {
    fn status(&self) -> StatusCode {
        self.code
    }

    fn create_response(&self, response: &mut Response<'_>) -> Result<(), ResponseError> {
        response.header(header::LOCATION, HeaderValue::from_str(&self.location)?);

        let wants_body = !response.has_header(&header::CONTENT_TYPE)
            && (self.method == Method::GET || self.method == Method::HEAD);
        if !wants_body {
            return response.finalize(self.code, None, b"");
        }

        let body = format!(
            "<a href=\"{}\">{}</a>.\n",
            escape_html(&self.location),
            self.code.canonical_reason().unwrap_or("Redirect")
        );
        response.finalize(self.code, Some(HTML_CONTENT_TYPE), body.as_bytes())
    }
}

/// Targets carrying a scheme or a host are left untouched. Anything else is
/// made absolute against the request path's directory and cleaned, keeping a
/// trailing slash.
fn resolve_location(request_path: &str, location: &str) -> String {
    if Url::parse(location).is_ok() || location.starts_with("//") {
        return location.to_string();
    }

    let mut target = if location.starts_with('/') {
        location.to_string()
    } else {
        let dir = match request_path.rfind('/') {
            Some(i) => &request_path[..=i],
            None => "/",
        };
        format!("{dir}{location}")
    };
    let query = match target.find('?') {
        Some(i) => target.split_off(i),
        None => String::new(),
    };

    let mut resolved = clean_path(&target);
    if target.ends_with('/') && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved.push_str(&query);
    resolved
}

/// Lexically normalize a rooted path: drop `.` and empty segments, apply `..`.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
