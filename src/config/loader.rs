//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionConfig;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            endpoint_file = "/srv/site/endpoint.toml"
            server_port = 9000

            [observability]
            json_logs = true

            [[rules]]
            name = "assets"
            path_prefix = "/assets"
            methods = ["GET", "head"]
            action = {{ type = "static", dir = "public" }}
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server_port, 9000);
        assert!(config.observability.json_logs);
        assert_eq!(config.rules.len(), 1);
        match &config.rules[0].action {
            ActionConfig::Static { dir, index } => {
                assert_eq!(dir.to_str(), Some("public"));
                assert_eq!(index, "index.html");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_reports_all_errors() {
        let err = parse_config(
            r#"
            server_port = 0

            [[rules]]
            name = ""
            action = { type = "respond", status = 42 }
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/rulegate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
