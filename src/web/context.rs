//! Per-request web context.

use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::form_urlencoded;

use crate::http::{IncomingRequest, ResponseWriter};
use crate::web::response::{ApiEnvelope, HtmlResponse, JsonResponse, RedirectResponse, ResponseError};

/// Everything a web handler sees for one request.
pub struct WebContext<'a> {
    pub response: Response<'a>,
    pub request: Request<'a>,
}

impl<'a> WebContext<'a> {
    pub fn new(w: &'a mut dyn ResponseWriter, request: &'a IncomingRequest) -> Self {
        Self {
            response: Response::new(w),
            request: Request::new(request),
        }
    }

    pub fn new_json_response<T: Serialize + ?Sized>(&self, res: &T) -> JsonResponse {
        JsonResponse::new(res)
    }

    /// JSON envelope `{"code": .., "message": .., "data": ..}`.
    pub fn new_api_response<T: Serialize>(
        &self,
        code: impl Into<String>,
        message: impl Into<String>,
        data: T,
    ) -> JsonResponse {
        self.new_json_response(&ApiEnvelope {
            code: code.into(),
            message: message.into(),
            data,
        })
    }

    pub fn new_html_response(&self, res: impl Into<String>) -> HtmlResponse {
        HtmlResponse::new(res)
    }

    pub fn redirect(&self, location: &str, code: StatusCode) -> RedirectResponse {
        RedirectResponse::new(&self.request, location, code)
    }
}

/// Write-once view of the response.
///
/// Headers set with [`Response::header`] are held back until the
/// response is finalized.
pub struct Response<'a> {
    w: &'a mut dyn ResponseWriter,
    headers: HeaderMap,
    finalized: bool,
}

impl<'a> Response<'a> {
    fn new(w: &'a mut dyn ResponseWriter) -> Self {
        Self {
            w,
            headers: HeaderMap::new(),
            finalized: false,
        }
    }

    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// True if `name` is pending here or already set on the writer.
    pub fn has_header(&mut self, name: &HeaderName) -> bool {
        self.headers.contains_key(name) || self.w.headers_mut().contains_key(name)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Direct access to the underlying writer, for handlers that write the
    /// response themselves and return no reply.
    pub fn writer(&mut self) -> &mut dyn ResponseWriter {
        &mut *self.w
    }

    /// Write pending headers, the status and `body`.
    ///
    /// `content_type` is applied only if no Content-Type was set already.
    pub fn finalize(
        &mut self,
        status: StatusCode,
        content_type: Option<&'static str>,
        body: &[u8],
    ) -> Result<(), ResponseError> {
        if self.finalized {
            return Err(ResponseError::AlreadyFinalized);
        }
        self.finalized = true;

        let headers = self.w.headers_mut();
        headers.extend(std::mem::take(&mut self.headers));
        if let Some(content_type) = content_type {
            headers
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(content_type));
        }

        self.w.write_header(status);
        if !body.is_empty() {
            self.w.write(body)?;
        }
        Ok(())
    }
}

/// Read-only view of the request.
#[derive(Clone, Copy)]
pub struct Request<'a> {
    r: &'a IncomingRequest,
}

impl<'a> Request<'a> {
    fn new(r: &'a IncomingRequest) -> Self {
        Self { r }
    }

    pub fn method(&self) -> &'a Method {
        self.r.method()
    }

    pub fn uri(&self) -> &'a Uri {
        self.r.uri()
    }

    pub fn path(&self) -> &'a str {
        self.r.path()
    }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.r.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// First query-string value for `name`.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.r.uri().query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// First form value (body, then query) for `name`.
    pub fn form(&self, name: &str) -> Option<&'a str> {
        self.r.form_value(name)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.r.body())
    }
}
