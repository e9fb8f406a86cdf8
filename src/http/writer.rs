//! Response writing.
//!
//! # Responsibilities
//! - Define the response-writing capability handed to rules and web handlers
//! - Buffer a response until it is handed back to the host server
//! - Observe the first status code written (`StatusCapturingWriter`)
//!
//! # Design Decisions
//! - The status line is committed once, either by `write_header` or
//!   implicitly (200) by the first body write; later `write_header` calls
//!   are ignored by the buffer and never reported to the observer
//! - The observer runs synchronously inside the write call

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use std::io;

/// Response-writing capability.
pub trait ResponseWriter {
    /// Headers that will be sent with the response.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status code.
    fn write_header(&mut self, code: StatusCode);

    /// Append body bytes, committing an implicit 200 if no status was written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// In-memory response that is converted into an `http::Response` once the
/// dispatcher returns.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed status, or 200 if nothing has been written yet.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, code: StatusCode) {
        if let Some(committed) = self.status {
            tracing::warn!(
                committed = committed.as_u16(),
                ignored = code.as_u16(),
                "superfluous write_header call"
            );
            return;
        }
        self.status = Some(code);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Proxies a [`ResponseWriter`] and reports the first status code written to
/// `observer`.
///
/// A body write before any `write_header` commits the implicit status; the
/// observer is not called in that case and the caller resolves the missing
/// value to 200 when it needs one.
pub struct StatusCapturingWriter<'a, W: ResponseWriter + ?Sized, F: FnMut(StatusCode)> {
    inner: &'a mut W,
    observer: F,
    committed: bool,
}

impl<'a, W: ResponseWriter + ?Sized, F: FnMut(StatusCode)> StatusCapturingWriter<'a, W, F> {
    pub fn new(inner: &'a mut W, observer: F) -> Self {
        Self {
            inner,
            observer,
            committed: false,
        }
    }
}

impl<W: ResponseWriter + ?Sized, F: FnMut(StatusCode)> ResponseWriter for StatusCapturingWriter<'_, W, F> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, code: StatusCode) {
        if !self.committed {
            self.committed = true;
            (self.observer)(code);
        }
        self.inner.write_header(code);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.committed = true;
        self.inner.write(buf)
    }
}
