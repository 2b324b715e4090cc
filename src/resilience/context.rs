//! Per-request resilience context.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::HttpRequest;

/// Header carrying the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// State carried across the attempts of one logical request.
#[derive(Debug, Clone)]
pub struct ResilienceContext {
    pub correlation_id: String,
    /// 1-based number of the attempt in progress.
    pub attempt_number: u32,
    /// `METHOD /path?query`
    pub operation: String,
    pub start_time: Instant,
    properties: HashMap<String, String>,
    pub last_error: Option<String>,
}

impl ResilienceContext {
    /// Create new context.
    pub fn new(operation: impl Into<String>, correlation_id: Option<String>) -> Self {
        let correlation_id = correlation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            correlation_id,
            attempt_number: 1,
            operation: operation.into(),
            start_time: Instant::now(),
            properties: HashMap::new(),
            last_error: None,
        }
    }

    /// Context for `request`, reusing its correlation header when present.
    pub fn for_request(request: &HttpRequest) -> Self {
        Self::new(
            format!("{} {}", request.method, request.path_and_query()),
            request.get_header(CORRELATION_ID_HEADER).map(str::to_string),
        )
    }

    /// Move to the next attempt.
    pub fn increment_attempt(&mut self) {
        self.attempt_number += 1;
    }

    /// Set a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get a property.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
