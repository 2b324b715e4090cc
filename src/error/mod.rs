//! Procore Error Types
//!
//! Error hierarchy for the SDK. Every failure surfaced by the client, the
//! token manager or the transport stack is a [`ProcoreError`].

mod mapper;

pub use mapper::{parse_retry_after, ErrorContext, ErrorMapper};

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Root error type for the Procore SDK.
#[derive(Error, Debug)]
pub enum ProcoreError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("OAuth provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Invalid argument `{parameter}`: {message}")]
    InvalidArgument { parameter: String, message: String },

    #[error("{operation} is not supported: {message}")]
    NotSupported { operation: String, message: String },
}

impl ProcoreError {
    /// Shorthand for an [`ProcoreError::InvalidArgument`].
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ProcoreError::NotSupported`].
    pub fn not_supported(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Stable error code for telemetry and callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Auth(_) | Self::Provider(_) => "UNAUTHORIZED",
            Self::Api(e) => e.error_code(),
            Self::Network(NetworkError::Timeout { .. }) => "TIMEOUT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Mapping(_) => "TYPE_MAPPING_ERROR",
            Self::InvalidArgument { .. } => "INVALID_REQUEST",
            Self::NotSupported { .. } => "NOT_SUPPORTED",
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Api(e) => e.is_retryable(),
            Self::Provider(ProviderError::ServerError { .. }) => true,
            Self::Provider(ProviderError::TemporarilyUnavailable { .. }) => true,
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api(ApiError::RateLimitExceeded { retry_after, .. }) => Some(*retry_after),
            Self::Api(ApiError::ServiceUnavailable { retry_after, .. }) => *retry_after,
            Self::Provider(ProviderError::TemporarilyUnavailable { retry_after }) => *retry_after,
            _ => None,
        }
    }

    /// Check if error requires re-authentication.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::NoRefreshToken)
                | Self::Auth(AuthError::RefreshFailed { .. })
                | Self::Provider(ProviderError::InvalidGrant { .. })
                | Self::Api(ApiError::Authentication { .. })
        )
    }

    /// Correlation id of the request that produced this error, when known.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Api(e) => e.correlation_id(),
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Value for {field} out of range: {message}")]
    OutOfRange { field: String, message: String },
}

/// Token lifecycle error.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("Invalid token response: {message}")]
    InvalidToken { message: String },

    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch,
}

/// OAuth2 provider error returned by the token endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client credentials")]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid scope: {scope}")]
    InvalidScope { scope: String },

    #[error("Unauthorized client for this grant type")]
    UnauthorizedClient { error_description: Option<String> },

    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Server temporarily unavailable")]
    TemporarilyUnavailable { retry_after: Option<Duration> },
}

/// Error returned by the Procore REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Option<HashMap<String, Vec<String>>>,
        correlation_id: Option<String>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        correlation_id: Option<String>,
    },

    #[error("{message}")]
    Forbidden {
        message: String,
        correlation_id: Option<String>,
    },

    #[error("{resource_type} with ID {id} was not found.")]
    ResourceNotFound {
        resource_type: String,
        id: i64,
        correlation_id: Option<String>,
    },

    #[error("Rate limit exceeded. Retry after {} seconds.", .retry_after.as_secs())]
    RateLimitExceeded {
        retry_after: Duration,
        correlation_id: Option<String>,
    },

    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        retry_after: Option<Duration>,
        correlation_id: Option<String>,
    },

    #[error("Server error ({status}): {message}")]
    Server {
        status: u16,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("Unexpected response ({status}): {message}")]
    Unknown {
        status: u16,
        message: String,
        correlation_id: Option<String>,
    },
}

impl ApiError {
    /// Stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Rate limiting and server-side failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::ServiceUnavailable { .. } => true,
            Self::Server { status, .. } => matches!(status, 500 | 502 | 504),
            Self::Unknown { status, .. } => *status == 408,
            _ => false,
        }
    }

    /// Correlation id of the failed request, if known.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Validation { correlation_id, .. }
            | Self::Authentication { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ResourceNotFound { correlation_id, .. }
            | Self::RateLimitExceeded { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Server { correlation_id, .. }
            | Self::Unknown { correlation_id, .. } => correlation_id.as_deref(),
        }
    }
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timed out after {} seconds", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("TLS error: {message}")]
    TlsError { message: String },

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TlsError { .. } | Self::CircuitOpen)
    }
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
        }
    }
}

/// Token storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },
}

/// Failure while converting between wire and domain types.
#[derive(Error, Debug)]
#[error("Failed to map {source_type} to {target_type}{}: {message}", .property.as_ref().map(|p| format!(" (property {p})")).unwrap_or_default())]
pub struct MappingError {
    pub source_type: &'static str,
    pub target_type: &'static str,
    pub property: Option<String>,
    pub message: String,
}

impl MappingError {
    /// Create new mapping error.
    pub fn new(source_type: &'static str, target_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            source_type,
            target_type,
            property: None,
            message: message.into(),
        }
    }

    /// Name the property that failed to map.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }
}

/// Result type for SDK operations.
pub type ProcoreResult<T> = Result<T, ProcoreError>;

/// OAuth2 error response from the token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map token error response to error type.
pub fn map_token_error(response: &OAuth2ErrorResponse) -> ProviderError {
    let description = || response.error_description.clone();
    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: description(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: description().unwrap_or_else(|| "Invalid grant".to_string()),
        },
        "invalid_scope" => ProviderError::InvalidScope {
            scope: description().unwrap_or_default(),
        },
        "unauthorized_client" => ProviderError::UnauthorizedClient {
            error_description: description(),
        },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType {
            grant_type: description().unwrap_or_default(),
        },
        "server_error" => ProviderError::ServerError {
            message: description().unwrap_or_else(|| "Server error".to_string()),
        },
        "temporarily_unavailable" => ProviderError::TemporarilyUnavailable { retry_after: None },
        _ => ProviderError::InvalidRequest {
            message: description().unwrap_or_else(|| response.error.clone()),
        },
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Build an error from a failed token endpoint response.
pub fn create_token_error_from_response(status: u16, body: &str) -> ProcoreError {
    if let Some(response) = parse_error_response(body) {
        return ProcoreError::Provider(map_token_error(&response));
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        },
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        },
        403 => ProviderError::UnauthorizedClient {
            error_description: Some("Forbidden".to_string()),
        },
        429 | 503 => ProviderError::TemporarilyUnavailable { retry_after: None },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        },
    };

    ProcoreError::Provider(error)
}
