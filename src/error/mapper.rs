//! HTTP Error Mapping
//!
//! Translates non-success Procore API responses into [`ApiError`] values.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::{ApiError, ProcoreError};

const MAX_PATH_LENGTH: usize = 2000;
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// Substrings that mark a validation message as leaking server internals.
const BLOCKED_MESSAGE_FRAGMENTS: &[&str] = &[
    "stack trace",
    "database",
    "sql",
    "connection string",
    "password",
    "token",
    "secret",
    "internal server error",
    "file not found",
    "path",
];

/// Request-side information used while mapping an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Request path, e.g. `/rest/v1.0/companies/123`.
    pub path: Option<String>,
    pub correlation_id: Option<String>,
    /// Resource type reported on 404s (defaults to `Resource`).
    pub resource_type: Option<String>,
}

impl ErrorContext {
    /// Create empty error context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the correlation id.
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the resource type.
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

/// Maps HTTP failures to domain errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// Create new error mapper.
    pub fn new() -> Self {
        Self
    }

    /// Map a non-success response. `headers` keys are expected lower-cased.
    pub fn map_response(
        &self,
        status: u16,
        headers: &HashMap<String, String>,
        body: &str,
        context: &ErrorContext,
    ) -> ProcoreError {
        let correlation_id = context.correlation_id.clone();
        let message = extract_message(status, body);

        let error = match status {
            400 | 422 => ApiError::Validation {
                message,
                errors: parse_validation_errors(body),
                correlation_id,
            },
            401 => ApiError::Authentication {
                message,
                correlation_id,
            },
            403 => ApiError::Forbidden {
                message,
                correlation_id,
            },
            404 => {
                let id = context
                    .path
                    .as_deref()
                    .and_then(extract_id_from_path);
                match id {
                    Some(id) => ApiError::ResourceNotFound {
                        resource_type: context
                            .resource_type
                            .clone()
                            .unwrap_or_else(|| "Resource".to_string()),
                        id,
                        correlation_id,
                    },
                    None => ApiError::ResourceNotFound {
                        resource_type: "Resource".to_string(),
                        id: 0,
                        correlation_id,
                    },
                }
            }
            429 => ApiError::RateLimitExceeded {
                retry_after: headers
                    .get("retry-after")
                    .map(|v| parse_retry_after(v))
                    .unwrap_or_default(),
                correlation_id,
            },
            503 => ApiError::ServiceUnavailable {
                message,
                retry_after: Some(
                    headers
                        .get("retry-after")
                        .map(|v| parse_retry_after(v))
                        .unwrap_or_default(),
                ),
                correlation_id,
            },
            s if s >= 500 => ApiError::Server {
                status,
                message,
                correlation_id,
            },
            _ => ApiError::Unknown {
                status,
                message,
                correlation_id,
            },
        };

        ProcoreError::Api(error)
    }
}

fn extract_message(status: u16, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error_description", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });

    match from_body {
        Some(message) if is_safe_message(&message) => message,
        _ => format!("Response status code does not indicate success: {}", status),
    }
}

/// Parse a `Retry-After` header value given either as seconds or as an HTTP date.
pub fn parse_retry_after(value: &str) -> Duration {
    let value = value.trim();
    if value.is_empty() {
        return Duration::ZERO;
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    match DateTime::parse_from_rfc2822(value) {
        Ok(date) => (date.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO),
        Err(_) => Duration::ZERO,
    }
}

fn is_valid_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains("..")
        && !path.contains('\\')
        && path.len() <= MAX_PATH_LENGTH
}

fn extract_id_from_path(path: &str) -> Option<i64> {
    if !is_valid_path(path) {
        return None;
    }
    let path = path.split('?').next().unwrap_or(path);
    path.split('/')
        .filter_map(|segment| segment.parse::<i64>().ok())
        .last()
}

fn is_safe_message(message: &str) -> bool {
    if message.trim().is_empty() || message.chars().count() > MAX_ERROR_MESSAGE_LENGTH {
        return false;
    }
    let lower = message.to_lowercase();
    !BLOCKED_MESSAGE_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}

fn parse_validation_errors(body: &str) -> Option<HashMap<String, Vec<String>>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let errors = value.get("errors")?.as_object()?;

    let mut result = HashMap::new();
    for (field, value) in errors {
        match value {
            Value::Array(items) => {
                let messages = items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|m| is_safe_message(m))
                    .map(str::to_string)
                    .collect();
                result.insert(field.clone(), messages);
            }
            Value::String(message) if is_safe_message(message) => {
                result.insert(field.clone(), vec![message.clone()]);
            }
            _ => {}
        }
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}
