//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (status codes, ports, limits)
//! - Detect duplicate rule names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{ActionConfig, RuleConfig, ServerConfig};

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "CONNECT", "TRACE",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server_port must be non-zero")]
    ZeroPort,

    #[error("max_body_bytes must be non-zero")]
    ZeroBodyLimit,

    #[error("rule #{index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error("rule name `{0}` is used more than once")]
    DuplicateRuleName(String),

    #[error("rule `{rule}`: unknown method `{method}`")]
    UnknownMethod { rule: String, method: String },

    #[error("rule `{rule}`: redirect code {code} is not 3xx")]
    InvalidRedirectCode { rule: String, code: u16 },

    #[error("rule `{rule}`: status {status} is out of range")]
    InvalidStatus { rule: String, status: u16 },

    #[error("rule `{rule}`: invalid header value `{value}`")]
    InvalidHeaderValue { rule: String, value: String },
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server_port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let mut names = HashSet::new();
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.name.is_empty() {
            errors.push(ValidationError::EmptyRuleName { index });
        } else if !names.insert(rule.name.as_str()) {
            errors.push(ValidationError::DuplicateRuleName(rule.name.clone()));
        }
        validate_rule(rule, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_rule(rule: &RuleConfig, errors: &mut Vec<ValidationError>) {
    for method in &rule.methods {
        if !KNOWN_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
            errors.push(ValidationError::UnknownMethod {
                rule: rule.name.clone(),
                method: method.clone(),
            });
        }
    }

    match &rule.action {
        ActionConfig::Static { .. } => {}
        ActionConfig::Redirect { location, code } => {
            if !(300..=399).contains(code) {
                errors.push(ValidationError::InvalidRedirectCode {
                    rule: rule.name.clone(),
                    code: *code,
                });
            }
            if HeaderValue::from_str(location).is_err() {
                errors.push(ValidationError::InvalidHeaderValue {
                    rule: rule.name.clone(),
                    value: location.clone(),
                });
            }
        }
        ActionConfig::Respond { status, content_type, .. } => {
            if !(100..=599).contains(status) {
                errors.push(ValidationError::InvalidStatus {
                    rule: rule.name.clone(),
                    status: *status,
                });
            }
            if HeaderValue::from_str(content_type).is_err() {
                errors.push(ValidationError::InvalidHeaderValue {
                    rule: rule.name.clone(),
                    value: content_type.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, action: ActionConfig) -> RuleConfig {
        RuleConfig {
            name: name.to_string(),
            host: None,
            path: None,
            path_prefix: None,
            methods: Vec::new(),
            action,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_names_and_methods() {
        let mut config = ServerConfig::default();
        let mut first = rule("home", ActionConfig::Static { dir: "public".into(), index: "index.html".into() });
        first.methods = vec!["get".into(), "FETCH".into()];
        config.rules.push(first);
        config.rules.push(rule(
            "home",
            ActionConfig::Redirect { location: "/".into(), code: 302 },
        ));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnknownMethod { rule: "home".into(), method: "FETCH".into() },
                ValidationError::DuplicateRuleName("home".into()),
            ]
        );
    }

    #[test]
    fn test_action_ranges() {
        let mut config = ServerConfig::default();
        config.rules.push(rule(
            "redirect",
            ActionConfig::Redirect { location: "/next".into(), code: 200 },
        ));
        config.rules.push(rule(
            "respond",
            ActionConfig::Respond { status: 700, content_type: "text/plain".into(), body: String::new() },
        ));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidRedirectCode { rule: "redirect".into(), code: 200 },
                ValidationError::InvalidStatus { rule: "respond".into(), status: 700 },
            ]
        );
    }
}
