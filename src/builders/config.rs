//! Configuration Builder
//!
//! Fluent builder for Procore client configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConfigurationError, ProcoreError, ProcoreResult};
use crate::types::{
    CircuitBreakerOptions, ProcoreAuthOptions, ProcoreConfig, ResilienceLoggingOptions,
    ResilienceOptions, RetryOptions, TimeoutOptions, DEFAULT_BASE_URL, DEFAULT_MAX_RESPONSE_SIZE,
    DEFAULT_USER_AGENT,
};

/// Procore configuration builder.
#[derive(Default)]
pub struct ProcoreConfigBuilder {
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    token_refresh_margin: Option<Duration>,
    use_pkce: bool,
    user_agent: Option<String>,
    company_id: Option<i64>,
    max_response_size: Option<usize>,
    resilience: ResilienceOptions,
}

impl ProcoreConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            use_pkce: true,
            ..Default::default()
        }
    }

    /// Set API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set redirect URI.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set scopes.
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Add a scope.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Refresh tokens this long before they expire.
    pub fn token_refresh_margin(mut self, margin: Duration) -> Self {
        self.token_refresh_margin = Some(margin);
        self
    }

    /// Enable or disable PKCE.
    pub fn use_pkce(mut self, enable: bool) -> Self {
        self.use_pkce = enable;
        self
    }

    /// Set User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Send `Procore-Company-Id` with every request.
    pub fn company_id(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Set maximum accepted response body size in bytes.
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = Some(size);
        self
    }

    /// Set retry options.
    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.resilience.retry = retry;
        self
    }

    /// Set maximum retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.resilience.retry.max_retries = max_retries;
        self
    }

    /// Set circuit breaker options.
    pub fn circuit_breaker(mut self, circuit_breaker: CircuitBreakerOptions) -> Self {
        self.resilience.circuit_breaker = circuit_breaker;
        self
    }

    /// Set timeout options.
    pub fn timeouts(mut self, timeout: TimeoutOptions) -> Self {
        self.resilience.timeout = timeout;
        self
    }

    /// Set default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.resilience.timeout.default_timeout = timeout;
        self
    }

    /// Set resilience logging options.
    pub fn resilience_logging(mut self, logging: ResilienceLoggingOptions) -> Self {
        self.resilience.logging = logging;
        self
    }

    /// Set all resilience options at once.
    pub fn resilience(mut self, resilience: ResilienceOptions) -> Self {
        self.resilience = resilience;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> ProcoreResult<ProcoreConfig> {
        let client_id = self.client_id.ok_or_else(|| {
            ProcoreError::Configuration(ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            })
        })?;

        let client_secret = self.client_secret.ok_or_else(|| {
            ProcoreError::Configuration(ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            })
        })?;

        if self.max_response_size == Some(0) {
            return Err(ProcoreError::Configuration(ConfigurationError::OutOfRange {
                field: "max_response_size".to_string(),
                message: "must be greater than zero".to_string(),
            }));
        }

        let defaults = ProcoreAuthOptions::default();
        let config = ProcoreConfig {
            base_url: self
                .base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth: ProcoreAuthOptions {
                client_id,
                client_secret,
                redirect_uri: self.redirect_uri.unwrap_or_default(),
                scopes: self.scopes,
                authorization_endpoint: self
                    .authorization_endpoint
                    .unwrap_or(defaults.authorization_endpoint),
                token_endpoint: self.token_endpoint.unwrap_or(defaults.token_endpoint),
                token_refresh_margin: self
                    .token_refresh_margin
                    .unwrap_or(defaults.token_refresh_margin),
                use_pkce: self.use_pkce,
            },
            resilience: self.resilience,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            company_id: self.company_id,
            max_response_size: self.max_response_size.unwrap_or(DEFAULT_MAX_RESPONSE_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Create a new Procore configuration builder.
pub fn procore_config() -> ProcoreConfigBuilder {
    ProcoreConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_builder_success() {
        let config = ProcoreConfigBuilder::new()
            .client_id("test-client")
            .client_secret("test-secret")
            .redirect_uri("https://app.example.com/callback")
            .base_url("https://sandbox.procore.com/")
            .company_id(42)
            .max_retries(5)
            .build()
            .unwrap();

        assert_eq!(config.auth.client_id, "test-client");
        assert_eq!(config.auth.client_secret.expose_secret(), "test-secret");
        assert_eq!(config.base_url, "https://sandbox.procore.com");
        assert_eq!(config.company_id, Some(42));
        assert_eq!(config.resilience.retry.max_retries, 5);
        assert!(config.auth.use_pkce);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_builder_missing_client_id() {
        let result = ProcoreConfigBuilder::new().client_secret("test-secret").build();

        assert!(matches!(
            result,
            Err(ProcoreError::Configuration(ConfigurationError::MissingRequired { ref field }))
                if field == "client_id"
        ));
    }

    #[test]
    fn test_builder_missing_secret() {
        let result = procore_config().client_id("test-client").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let result = procore_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .base_url("not a url")
            .build();

        assert!(matches!(
            result,
            Err(ProcoreError::Configuration(ConfigurationError::InvalidEndpoint { .. }))
        ));
    }

    #[test]
    fn test_builder_rejects_out_of_range_resilience() {
        let result = procore_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .timeout(Duration::from_millis(10))
            .build();

        assert!(matches!(
            result,
            Err(ProcoreError::Configuration(ConfigurationError::OutOfRange { .. }))
        ));
    }
}
