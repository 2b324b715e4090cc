//! Configuration Types
//!
//! Client, authentication and resilience configuration.

use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, ProcoreError, ProcoreResult};

pub const DEFAULT_BASE_URL: &str = "https://api.procore.com";
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://app.procore.com/oauth/authorize";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.procore.com/oauth/token";
pub const DEFAULT_USER_AGENT: &str = concat!("procore-sdk-rust/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 50 * 1024 * 1024;

/// OAuth2 settings for the Procore identity provider.
#[derive(Clone)]
pub struct ProcoreAuthOptions {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Redirect URI registered with the application.
    pub redirect_uri: String,
    /// Scopes to request.
    pub scopes: Vec<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Refresh tokens this long before they expire.
    pub token_refresh_margin: Duration,
    /// Use PKCE (S256) in the authorization code flow.
    pub use_pkce: bool,
}

impl Default for ProcoreAuthOptions {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            redirect_uri: String::new(),
            scopes: Vec::new(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            token_refresh_margin: Duration::from_secs(5 * 60),
            use_pkce: true,
        }
    }
}

impl std::fmt::Debug for ProcoreAuthOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcoreAuthOptions")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("use_pkce", &self.use_pkce)
            .finish()
    }
}

impl ProcoreAuthOptions {
    /// Validate the auth options.
    pub fn validate(&self) -> ProcoreResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            }
            .into());
        }
        for endpoint in [&self.authorization_endpoint, &self.token_endpoint] {
            Url::parse(endpoint).map_err(|_| ConfigurationError::InvalidEndpoint {
                url: endpoint.clone(),
            })?;
        }
        if !self.redirect_uri.is_empty() {
            Url::parse(&self.redirect_uri).map_err(|_| ConfigurationError::InvalidEndpoint {
                url: self.redirect_uri.clone(),
            })?;
        }
        Ok(())
    }
}

/// Retry policy settings.
#[derive(Clone, Debug)]
pub struct RetryOptions {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
    pub use_exponential_backoff: bool,
    pub use_jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_millis(1000),
            use_exponential_backoff: true,
            use_jitter: true,
        }
    }
}

/// Circuit breaker settings.
#[derive(Clone, Debug)]
pub struct CircuitBreakerOptions {
    /// Consecutive handled failures before the circuit opens.
    pub failure_threshold: u32,
    pub duration_of_break: Duration,
    pub minimum_throughput: u32,
    pub enabled: bool,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            duration_of_break: Duration::from_secs(30),
            minimum_throughput: 10,
            enabled: true,
        }
    }
}

/// Per-attempt timeout settings.
#[derive(Clone, Debug)]
pub struct TimeoutOptions {
    pub default_timeout: Duration,
    /// Used for uploads and other long-running requests.
    pub long_running_timeout: Duration,
    pub enabled: bool,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            long_running_timeout: Duration::from_secs(300),
            enabled: true,
        }
    }
}

/// Which resilience events get logged.
#[derive(Clone, Debug)]
pub struct ResilienceLoggingOptions {
    pub log_retry_attempts: bool,
    pub log_circuit_breaker_events: bool,
    pub log_timeouts: bool,
    pub log_performance_metrics: bool,
    /// Include method and URL in resilience logs.
    pub include_request_details: bool,
}

impl Default for ResilienceLoggingOptions {
    fn default() -> Self {
        Self {
            log_retry_attempts: true,
            log_circuit_breaker_events: true,
            log_timeouts: true,
            log_performance_metrics: true,
            include_request_details: false,
        }
    }
}

/// Resilience policy configuration.
#[derive(Clone, Debug, Default)]
pub struct ResilienceOptions {
    pub retry: RetryOptions,
    pub circuit_breaker: CircuitBreakerOptions,
    pub timeout: TimeoutOptions,
    pub logging: ResilienceLoggingOptions,
}

fn check_range<T: PartialOrd + std::fmt::Debug>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> ProcoreResult<()> {
    if value < min || value > max {
        return Err(ProcoreError::Configuration(ConfigurationError::OutOfRange {
            field: field.to_string(),
            message: format!("{:?} is not within {:?}..={:?}", value, min, max),
        }));
    }
    Ok(())
}

impl ResilienceOptions {
    /// Reject values outside the supported ranges.
    pub fn validate(&self) -> ProcoreResult<()> {
        let retry = &self.retry;
        check_range("retry.max_retries", retry.max_retries, 0, 10)?;
        check_range(
            "retry.base_delay",
            retry.base_delay,
            Duration::from_millis(100),
            Duration::from_millis(60_000),
        )?;
        check_range(
            "retry.max_delay",
            retry.max_delay,
            Duration::from_millis(1000),
            Duration::from_millis(300_000),
        )?;
        check_range("retry.backoff_multiplier", retry.backoff_multiplier, 1.0, 5.0)?;
        check_range(
            "retry.max_jitter",
            retry.max_jitter,
            Duration::ZERO,
            Duration::from_millis(10_000),
        )?;

        let breaker = &self.circuit_breaker;
        check_range("circuit_breaker.failure_threshold", breaker.failure_threshold, 1, 50)?;
        check_range(
            "circuit_breaker.duration_of_break",
            breaker.duration_of_break,
            Duration::from_secs(1),
            Duration::from_secs(3600),
        )?;
        check_range(
            "circuit_breaker.minimum_throughput",
            breaker.minimum_throughput,
            1,
            1000,
        )?;

        let timeout = &self.timeout;
        check_range(
            "timeout.default_timeout",
            timeout.default_timeout,
            Duration::from_secs(1),
            Duration::from_secs(3600),
        )?;
        check_range(
            "timeout.long_running_timeout",
            timeout.long_running_timeout,
            Duration::from_secs(30),
            Duration::from_secs(3600),
        )?;
        Ok(())
    }
}

/// Complete client configuration.
#[derive(Clone, Debug)]
pub struct ProcoreConfig {
    /// API base URL.
    pub base_url: String,
    pub auth: ProcoreAuthOptions,
    pub resilience: ResilienceOptions,
    pub user_agent: String,
    /// Sent as `Procore-Company-Id` on every API request when set.
    pub company_id: Option<i64>,
    pub max_response_size: usize,
}

impl Default for ProcoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: ProcoreAuthOptions::default(),
            resilience: ResilienceOptions::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            company_id: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ProcoreConfig {
    /// Creates a configuration from environment variables.
    ///
    /// `PROCORE_CLIENT_ID` and `PROCORE_CLIENT_SECRET` are required.
    pub fn from_env() -> ProcoreResult<Self> {
        let client_id = required_env("PROCORE_CLIENT_ID")?;
        let client_secret = required_env("PROCORE_CLIENT_SECRET")?;

        let mut config = Self::default();
        config.auth.client_id = client_id;
        config.auth.client_secret = SecretString::new(client_secret);

        if let Ok(redirect_uri) = std::env::var("PROCORE_REDIRECT_URI") {
            config.auth.redirect_uri = redirect_uri;
        }
        if let Ok(scopes) = std::env::var("PROCORE_SCOPES") {
            config.auth.scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Ok(base_url) = std::env::var("PROCORE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(company_id) = std::env::var("PROCORE_COMPANY_ID") {
            let parsed = company_id.trim().parse::<i64>().map_err(|_| {
                ConfigurationError::InvalidConfig {
                    message: format!("PROCORE_COMPANY_ID is not a number: {}", company_id),
                }
            })?;
            config.company_id = Some(parsed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> ProcoreResult<()> {
        Url::parse(&self.base_url).map_err(|_| ConfigurationError::InvalidEndpoint {
            url: self.base_url.clone(),
        })?;
        self.auth.validate()?;
        self.resilience.validate()
    }
}

fn required_env(name: &str) -> ProcoreResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            ConfigurationError::MissingRequired {
                field: name.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_defaults() {
        let options = ProcoreAuthOptions::default();
        assert_eq!(options.authorization_endpoint, DEFAULT_AUTHORIZATION_ENDPOINT);
        assert_eq!(options.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(options.token_refresh_margin, Duration::from_secs(300));
        assert!(options.use_pkce);
    }

    #[test]
    fn test_auth_requires_client_id() {
        let options = ProcoreAuthOptions::default();
        assert!(options.validate().is_err());

        let options = ProcoreAuthOptions {
            client_id: "client".to_string(),
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_resilience_defaults_are_valid() {
        let options = ResilienceOptions::default();
        assert_eq!(options.retry.max_retries, 3);
        assert_eq!(options.circuit_breaker.failure_threshold, 5);
        assert_eq!(options.timeout.long_running_timeout, Duration::from_secs(300));
        assert!(!options.logging.include_request_details);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_resilience_rejects_out_of_range() {
        let mut options = ResilienceOptions::default();
        options.retry.max_retries = 11;
        assert!(options.validate().is_err());

        let mut options = ResilienceOptions::default();
        options.retry.backoff_multiplier = 0.5;
        assert!(options.validate().is_err());

        let mut options = ResilienceOptions::default();
        options.timeout.long_running_timeout = Duration::from_secs(10);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let options = ProcoreAuthOptions {
            client_secret: SecretString::new("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", options).contains("hunter2"));
    }
}
