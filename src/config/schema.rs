//! Configuration schema definitions.
//!
//! This module defines the configuration file structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Endpoint definition file. Only its directory is used: it becomes the
    /// root that static rules serve from.
    pub endpoint_file: PathBuf,

    /// Address to bind, also exposed to rules as the server name.
    pub server_ip: String,

    /// Port to bind, exposed to rules as decimal text.
    pub server_port: u16,

    /// Software identity exposed to rules.
    pub software_name: String,
    pub software_version: String,

    /// Largest request body buffered before dispatch.
    pub max_body_bytes: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Ordered rule definitions. First match wins.
    pub rules: Vec<RuleConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint_file: PathBuf::from("endpoint.toml"),
            server_ip: "0.0.0.0".to_string(),
            server_port: 8080,
            software_name: env!("CARGO_PKG_NAME").to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 30,
            observability: ObservabilityConfig::default(),
            rules: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_ip, self.server_port)
    }
}

/// Rule configuration: match conditions plus an action.
///
/// Unset conditions match everything.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Rule identifier for logging.
    pub name: String,

    /// Host header to match (exact match).
    #[serde(default)]
    pub host: Option<String>,

    /// Exact path to match.
    #[serde(default)]
    pub path: Option<String>,

    /// Path prefix to match. Static rules strip it before resolving files.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Allowed methods (case-insensitive).
    #[serde(default)]
    pub methods: Vec<String>,

    pub action: ActionConfig,
}

/// What a rule does with a matching request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Serve files from `dir`, relative to the endpoint file's directory.
    Static {
        dir: PathBuf,
        #[serde(default = "default_index")]
        index: String,
    },

    /// Redirect to `location` with a 3xx `code`.
    Redirect {
        location: String,
        #[serde(default = "default_redirect_code")]
        code: u16,
    },

    /// Write a fixed response.
    Respond {
        #[serde(default = "default_respond_status")]
        status: u16,
        #[serde(default = "default_content_type")]
        content_type: String,
        #[serde(default)]
        body: String,
    },
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_redirect_code() -> u16 {
    302
}

fn default_respond_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Emit an access event for every request through the audit callback.
    pub audit_log: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "rulegate=info,tower_http=info".to_string(),
            json_logs: false,
            audit_log: true,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
