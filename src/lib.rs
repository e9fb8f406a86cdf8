//! Rule-dispatching HTTP front end with per-request audit records.

pub mod config;
pub mod http;
pub mod observability;
pub mod routing;
pub mod web;

pub use config::ServerConfig;
pub use http::{create_http_handler, DispatchConfig, DispatchHandler, RequestContext};
pub use routing::Rule;
