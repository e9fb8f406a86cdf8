//! Incoming request representation.
//!
//! # Responsibilities
//! - Hold the buffered request (head + body) shared by the dispatcher and
//!   the audit logger
//! - Expose the fields rules and the audit record need (user agent, referer,
//!   request target)
//! - Parse form values lazily, once
//!
//! # Design Decisions
//! - The body is fully buffered before dispatch so rules stay synchronous
//! - Form values: urlencoded body values (POST/PUT/PATCH) come before query
//!   values for the same key
//! - Malformed escapes and `;` separators are rejected, not skipped

use axum::body::Bytes;
use axum::http::{header, request, HeaderMap, Method, Request, Uri};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use url::form_urlencoded;

/// Parsed form values: key to every value supplied for it, in order.
pub type FormValues = BTreeMap<String, Vec<String>>;

/// Error produced while parsing form values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("invalid semicolon separator in form data")]
    Semicolon,
    #[error("invalid URL escape at byte {offset}")]
    InvalidEscape { offset: usize },
}

/// A request whose body has been read into memory.
#[derive(Debug)]
pub struct IncomingRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    form: OnceLock<Result<FormValues, FormError>>,
}

impl IncomingRequest {
    pub fn new(parts: request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            form: OnceLock::new(),
        }
    }

    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The request target as sent by the client (path plus query).
    pub fn request_uri(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// Header value as text, or an empty string when missing or not UTF-8.
    pub fn header_str(&self, name: impl header::AsHeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn user_agent(&self) -> &str {
        self.header_str(header::USER_AGENT)
    }

    pub fn referer(&self) -> &str {
        self.header_str(header::REFERER)
    }

    /// Host header, falling back to the URI authority.
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    pub fn is_form_parsed(&self) -> bool {
        self.form.get().is_some()
    }

    /// Parsed form values. Parsing happens on first call only.
    pub fn form(&self) -> Result<&FormValues, &FormError> {
        self.form
            .get_or_init(|| parse_form(&self.method, &self.headers, &self.uri, &self.body))
            .as_ref()
    }

    /// First value for `key`, if the form parsed and carries one.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form()
            .ok()
            .and_then(|values| values.get(key))
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

fn parse_form(
    method: &Method,
    headers: &HeaderMap,
    uri: &Uri,
    body: &[u8],
) -> Result<FormValues, FormError> {
    let mut values = FormValues::new();

    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) && is_urlencoded(headers) {
        parse_into(&mut values, body)?;
    }
    if let Some(query) = uri.query() {
        parse_into(&mut values, query.as_bytes())?;
    }

    Ok(values)
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn parse_into(values: &mut FormValues, input: &[u8]) -> Result<(), FormError> {
    check_encoding(input)?;
    for (key, value) in form_urlencoded::parse(input) {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Ok(())
}

fn check_encoding(input: &[u8]) -> Result<(), FormError> {
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b';' => return Err(FormError::Semicolon),
            b'%' => {
                let valid = input
                    .get(i + 1..i + 3)
                    .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .unwrap_or(false);
                if !valid {
                    return Err(FormError::InvalidEscape { offset: i });
                }
                i += 3;
            }
            _ => i += 1,
        }
    }
    Ok(())
}
