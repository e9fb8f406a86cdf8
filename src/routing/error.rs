//! Rule and dispatch errors.

use axum::http::StatusCode;
use std::io;
use thiserror::Error;

use crate::web::ResponseError;

/// Error raised by a rule while serving a request.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("path escapes the served directory: {0}")]
    Forbidden(String),

    #[error("failed to read request body: {0}")]
    RequestBody(#[from] axum::Error),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// A failed dispatch, together with the status code already written to the
/// client.
#[derive(Debug, Error)]
#[error("request failed, code={}, err={error}", .code.as_u16())]
pub struct DispatchFailure {
    pub code: StatusCode,
    #[source]
    pub error: RuleError,
}
