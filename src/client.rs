//! Procore Client
//!
//! High-level client that assembles the transport stack, token management
//! and the resource services.
//!
//! Requests flow through three layers:
//!
//! ```text
//! AuthenticatedTransport -> ResilientTransport -> ReqwestHttpTransport
//! ```
//!
//! Token endpoint calls made by the token manager and the OAuth flow helper
//! skip authentication and go through their own resilient layer: timeouts
//! apply, but a single-use grant is never resent and token endpoint failures
//! never trip the API circuit.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::auth::{
    AuthenticatedTransport, AuthorizationUrl, DefaultTokenManager, InMemoryTokenStorage,
    OAuthFlowHelper, TokenManager, TokenStorage,
};
use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm, ReqwestHttpTransport};
use crate::error::{ErrorContext, ErrorMapper, ProcoreError, ProcoreResult, ProtocolError};
use crate::mapping::{
    CompanyMapper, CustomFieldMapper, DocumentMapper, MappingMetricsSnapshot, ProjectMapper,
    TypeMapper, UserMapper,
};
use crate::resilience::{
    CircuitBreakerStats, CircuitState, ResilientTransport, RetryStats, CORRELATION_ID_HEADER,
};
use crate::services::{
    CompaniesService, CustomFieldsService, DocumentsService, ProjectsService, UsersService,
};
use crate::telemetry::StructuredLogger;
use crate::types::{AccessToken, ProcoreConfig, ResilienceOptions, TokenRefreshedEvent};

/// Header selecting the company an API request acts on.
pub const COMPANY_ID_HEADER: &str = "Procore-Company-Id";

/// Empty query string.
pub(crate) const NO_QUERY: &[(&str, &str)] = &[];

type Resilient = ResilientTransport<dyn HttpTransport>;

/// Resilient layer for the token endpoint: no retries and no circuit breaker,
/// so refresh tokens and authorization codes are sent at most once.
fn token_endpoint_transport(
    config: &ProcoreConfig,
    transport: Arc<dyn HttpTransport>,
) -> Arc<Resilient> {
    let mut options: ResilienceOptions = config.resilience.clone();
    options.retry.max_retries = 0;
    options.circuit_breaker.enabled = false;
    Arc::new(ResilientTransport::new(transport, options))
}

/// Per-call settings shared by the request helpers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call<'a> {
    pub operation: &'a str,
    /// Reported on 404s.
    pub resource_type: &'a str,
    pub company_id: Option<i64>,
}

impl<'a> Call<'a> {
    /// Create call settings.
    pub fn new(operation: &'a str, resource_type: &'a str) -> Self {
        Self {
            operation,
            resource_type,
            company_id: None,
        }
    }

    /// Scope the call to a company.
    pub fn company(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

/// Mappers shared by all services, so their metrics accumulate per client.
#[derive(Debug, Default)]
pub(crate) struct Mappers {
    pub company: CompanyMapper,
    pub user: UserMapper,
    pub document: DocumentMapper,
    pub custom_field: CustomFieldMapper,
    pub project: ProjectMapper,
}

/// Procore API client.
pub struct ProcoreClient {
    config: ProcoreConfig,
    transport: AuthenticatedTransport<Resilient>,
    resilient: Arc<Resilient>,
    token_manager: Arc<dyn TokenManager>,
    flow: OAuthFlowHelper,
    error_mapper: ErrorMapper,
    logger: StructuredLogger,
    pub(crate) mappers: Mappers,
}

impl std::fmt::Debug for ProcoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcoreClient")
            .field("config", &self.config)
            .field("circuit_state", &self.resilient.circuit_state())
            .finish_non_exhaustive()
    }
}

impl ProcoreClient {
    /// Create a client with the reqwest transport and in-memory token storage.
    pub fn new(config: ProcoreConfig) -> ProcoreResult<Self> {
        Self::with_storage(config, Arc::new(InMemoryTokenStorage::new()))
    }

    /// Create a client persisting tokens in `storage`.
    pub fn with_storage(config: ProcoreConfig, storage: Arc<dyn TokenStorage>) -> ProcoreResult<Self> {
        // Per-attempt deadlines are enforced by the resilience layer.
        let http = ReqwestHttpTransport::with_options(
            config.resilience.timeout.long_running_timeout,
            config.max_response_size,
        )?;
        Self::with_transport(config, Arc::new(http), storage)
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: ProcoreConfig,
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn TokenStorage>,
    ) -> ProcoreResult<Self> {
        config.validate()?;
        let token_transport = token_endpoint_transport(&config, transport.clone());
        let resilient: Arc<Resilient> =
            Arc::new(ResilientTransport::new(transport, config.resilience.clone()));
        let token_manager: Arc<dyn TokenManager> = Arc::new(DefaultTokenManager::new(
            config.auth.clone(),
            token_transport.clone(),
            storage,
        ));
        Ok(Self::assemble(config, resilient, token_transport, token_manager))
    }

    /// Create a client with a custom token manager.
    pub fn with_token_manager(
        config: ProcoreConfig,
        transport: Arc<dyn HttpTransport>,
        token_manager: Arc<dyn TokenManager>,
    ) -> ProcoreResult<Self> {
        config.validate()?;
        let token_transport = token_endpoint_transport(&config, transport.clone());
        let resilient: Arc<Resilient> =
            Arc::new(ResilientTransport::new(transport, config.resilience.clone()));
        Ok(Self::assemble(config, resilient, token_transport, token_manager))
    }

    fn assemble(
        config: ProcoreConfig,
        resilient: Arc<Resilient>,
        token_transport: Arc<Resilient>,
        token_manager: Arc<dyn TokenManager>,
    ) -> Self {
        let flow = OAuthFlowHelper::new(config.auth.clone(), token_transport);
        let transport = AuthenticatedTransport::new(resilient.clone(), token_manager.clone());
        Self {
            config,
            transport,
            resilient,
            token_manager,
            flow,
            error_mapper: ErrorMapper::new(),
            logger: StructuredLogger::new(),
            mappers: Mappers::default(),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ProcoreConfig {
        &self.config
    }

    /// Get the token manager.
    pub fn token_manager(&self) -> &Arc<dyn TokenManager> {
        &self.token_manager
    }

    /// Get the OAuth flow helper.
    pub fn oauth(&self) -> &OAuthFlowHelper {
        &self.flow
    }

    // ========== Authentication ==========

    /// Build the consent URL. Keep the returned verifier for
    /// [`ProcoreClient::complete_authorization`].
    pub fn authorization_url(&self, state: Option<&str>) -> ProcoreResult<AuthorizationUrl> {
        self.flow.generate_authorization_url(state)
    }

    /// Exchange the callback code and store the resulting token.
    pub async fn complete_authorization(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> ProcoreResult<AccessToken> {
        let token = self.flow.exchange_code_for_token(code, code_verifier).await?;
        self.token_manager.store_token(&token).await?;
        Ok(token)
    }

    /// Obtain and store a client credentials token.
    pub async fn authenticate_client_credentials(&self) -> ProcoreResult<AccessToken> {
        let token = self.flow.client_credentials_token().await?;
        self.token_manager.store_token(&token).await?;
        Ok(token)
    }

    /// Use a token obtained outside the SDK.
    pub async fn set_access_token(&self, token: &AccessToken) -> ProcoreResult<()> {
        self.token_manager.store_token(token).await
    }

    /// Forget the stored token.
    pub async fn sign_out(&self) -> ProcoreResult<()> {
        self.token_manager.clear_token().await
    }

    /// Subscribe to token refresh events.
    pub fn subscribe_token_refreshed(&self) -> broadcast::Receiver<TokenRefreshedEvent> {
        self.token_manager.subscribe()
    }

    // ========== Resilience ==========

    /// Get current circuit state.
    pub fn circuit_state(&self) -> CircuitState {
        self.resilient.circuit_state()
    }

    /// Force the API circuit closed.
    pub fn reset_circuit(&self) {
        self.resilient.reset_circuit()
    }

    /// Get circuit breaker statistics.
    pub fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        self.resilient.circuit_breaker_stats()
    }

    /// Get retry statistics.
    pub fn retry_stats(&self) -> RetryStats {
        self.resilient.retry_stats()
    }

    /// Mapping metrics keyed by domain type.
    pub fn mapping_metrics(&self) -> HashMap<&'static str, MappingMetricsSnapshot> {
        let m = &self.mappers;
        HashMap::from([
            (CompanyMapper::DOMAIN_TYPE, m.company.metrics().snapshot()),
            (UserMapper::DOMAIN_TYPE, m.user.metrics().snapshot()),
            (DocumentMapper::DOMAIN_TYPE, m.document.metrics().snapshot()),
            (CustomFieldMapper::DOMAIN_TYPE, m.custom_field.metrics().snapshot()),
            (ProjectMapper::DOMAIN_TYPE, m.project.metrics().snapshot()),
        ])
    }

    // ========== Services ==========

    /// Companies service.
    pub fn companies(&self) -> CompaniesService<'_> {
        CompaniesService::new(self)
    }

    /// Users service.
    pub fn users(&self) -> UsersService<'_> {
        UsersService::new(self)
    }

    /// Documents service.
    pub fn documents(&self) -> DocumentsService<'_> {
        DocumentsService::new(self)
    }

    /// Custom fields service.
    pub fn custom_fields(&self) -> CustomFieldsService<'_> {
        CustomFieldsService::new(self)
    }

    /// Projects service.
    pub fn projects(&self) -> ProjectsService<'_> {
        ProjectsService::new(self)
    }

    // ========== Request helpers ==========

    fn url<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> ProcoreResult<String> {
        let query = serde_urlencoded::to_string(query)
            .map_err(|e| ProcoreError::invalid_argument("query", e.to_string()))?;
        let base = self.config.base_url.trim_end_matches('/');
        if query.is_empty() {
            Ok(format!("{}{}", base, path))
        } else {
            Ok(format!("{}{}?{}", base, path, query))
        }
    }

    /// Send an API request inside an operation scope and map failures.
    async fn send(&self, call: Call<'_>, request: HttpRequest) -> ProcoreResult<HttpResponse> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let scope = self.logger.begin_operation(call.operation, &correlation_id);
        let path = request.path_and_query();

        let mut request = request
            .header("Accept", "application/json")
            .header("User-Agent", self.config.user_agent.clone())
            .header(CORRELATION_ID_HEADER, correlation_id.clone());
        if let Some(company_id) = call.company_id.or(self.config.company_id) {
            request.set_header(COMPANY_ID_HEADER, company_id.to_string());
        }

        let result = async {
            let response = self.transport.send(request).await?;
            if response.is_success() {
                return Ok(response);
            }
            let context = ErrorContext::new()
                .path(path)
                .correlation_id(correlation_id.clone())
                .resource_type(call.resource_type);
            Err(self.error_mapper.map_response(
                response.status,
                &response.headers,
                &response.body,
                &context,
            ))
        }
        .instrument(scope.span().clone())
        .await;

        scope.complete(result.is_ok());
        result
    }

    fn parse<R: DeserializeOwned>(response: &HttpResponse) -> ProcoreResult<R> {
        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        Ok(serde_json::from_str(body).map_err(ProtocolError::from)?)
    }

    pub(crate) async fn get<R, Q>(&self, call: Call<'_>, path: &str, query: &Q) -> ProcoreResult<R>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = HttpRequest::new(HttpMethod::Get, self.url(path, query)?);
        let response = self.send(call, request).await?;
        Self::parse(&response)
    }

    pub(crate) async fn post<B, R>(&self, call: Call<'_>, path: &str, body: &B) -> ProcoreResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = HttpRequest::new(HttpMethod::Post, self.url(path, NO_QUERY)?).json(body)?;
        let response = self.send(call, request).await?;
        Self::parse(&response)
    }

    pub(crate) async fn patch<B, R>(&self, call: Call<'_>, path: &str, body: &B) -> ProcoreResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = HttpRequest::new(HttpMethod::Patch, self.url(path, NO_QUERY)?).json(body)?;
        let response = self.send(call, request).await?;
        Self::parse(&response)
    }

    pub(crate) async fn delete(&self, call: Call<'_>, path: &str) -> ProcoreResult<()> {
        let request = HttpRequest::new(HttpMethod::Delete, self.url(path, NO_QUERY)?);
        self.send(call, request).await?;
        Ok(())
    }

    /// Multipart POST with the long-running timeout.
    pub(crate) async fn post_multipart<R: DeserializeOwned>(
        &self,
        call: Call<'_>,
        path: &str,
        form: MultipartForm,
    ) -> ProcoreResult<R> {
        let request = HttpRequest::new(HttpMethod::Post, self.url(path, NO_QUERY)?)
            .multipart(form)
            .timeout(self.config.resilience.timeout.long_running_timeout);
        let response = self.send(call, request).await?;
        Self::parse(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockTokenManager;
    use crate::core::MockHttpTransport;
    use crate::error::ApiError;
    use crate::types::{ResilienceOptions, RetryOptions};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn config() -> ProcoreConfig {
        let mut config = ProcoreConfig::default();
        config.auth.client_id = "client".to_string();
        config.auth.client_secret = SecretString::new("secret".to_string());
        config.resilience = ResilienceOptions {
            retry: RetryOptions {
                max_retries: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        config
    }

    fn client(transport: Arc<MockHttpTransport>) -> ProcoreClient {
        let tokens = Arc::new(MockTokenManager::with_token(AccessToken::bearer(
            "test-token",
            chrono::Duration::hours(1),
        )));
        ProcoreClient::with_token_manager(config(), transport, tokens).unwrap()
    }

    #[tokio::test]
    async fn test_sends_standard_headers() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"ok": true}));
        let client = client(transport.clone());

        let value: Value = client
            .get(
                Call::new("test", "Company").company(7),
                "/rest/v1.0/companies",
                &[("page", "2")],
            )
            .await
            .unwrap();
        assert_eq!(value["ok"], true);

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.url, "https://api.procore.com/rest/v1.0/companies?page=2");
        assert_eq!(sent.get_header("Authorization"), Some("Bearer test-token"));
        assert_eq!(sent.get_header(COMPANY_ID_HEADER), Some("7"));
        assert!(sent.get_header("User-Agent").unwrap().starts_with("procore-sdk-rust/"));
        assert!(sent.get_header(CORRELATION_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_default_company_header() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!([]));
        let mut config = config();
        config.company_id = Some(99);
        let tokens = Arc::new(MockTokenManager::new());
        let client = ProcoreClient::with_token_manager(config, transport.clone(), tokens).unwrap();

        let _: Value = client
            .get(Call::new("test", "Company"), "/rest/v1.0/companies", NO_QUERY)
            .await
            .unwrap();
        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.get_header(COMPANY_ID_HEADER), Some("99"));
    }

    #[tokio::test]
    async fn test_maps_error_with_correlation_id() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(404, r#"{"message":"missing"}"#));
        let client = client(transport.clone());

        let err = client
            .get::<Value, _>(Call::new("test", "Project"), "/rest/v1.0/projects/55", NO_QUERY)
            .await
            .unwrap_err();

        match &err {
            ProcoreError::Api(ApiError::ResourceNotFound {
                resource_type, id, ..
            }) => {
                assert_eq!(resource_type, "Project");
                assert_eq!(*id, 55);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let sent = transport.get_last_request().unwrap();
        assert_eq!(err.correlation_id(), sent.get_header(CORRELATION_ID_HEADER));
    }

    #[tokio::test]
    async fn test_invalid_json_is_protocol_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(200, "<html>"));
        let client = client(transport);

        let err = client
            .get::<Value, _>(Call::new("test", "Company"), "/rest/v1.0/companies", NO_QUERY)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcoreError::Protocol(ProtocolError::InvalidJson { .. })));
    }

    #[tokio::test]
    async fn test_multipart_uses_long_running_timeout() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(201, &json!({"id": 1}));
        let client = client(transport.clone());

        let _: Value = client
            .post_multipart(
                Call::new("upload", "Document"),
                "/rest/v1.0/companies/1/files",
                MultipartForm::new().field("file[name]", "a.txt"),
            )
            .await
            .unwrap();
        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.timeout, Some(Duration::from_secs(300)));
        assert!(sent.multipart.is_some());
    }

    #[tokio::test]
    async fn test_token_exchange_is_sent_once_and_spares_api_circuit() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(
            503,
            r#"{"error":"temporarily_unavailable"}"#,
        ));
        let mut config = config();
        config.resilience.retry = RetryOptions {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_jitter: false,
            ..Default::default()
        };
        config.resilience.circuit_breaker.failure_threshold = 1;
        let client = ProcoreClient::with_transport(
            config,
            transport.clone(),
            Arc::new(InMemoryTokenStorage::new()),
        )
        .unwrap();

        let result = client
            .complete_authorization("code", "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk")
            .await;
        assert!(result.is_err());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(client.circuit_state(), CircuitState::Closed);
        assert_eq!(client.retry_stats().total_attempts, 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockHttpTransport::new());
        let result = ProcoreClient::with_transport(
            ProcoreConfig::default(),
            transport,
            Arc::new(InMemoryTokenStorage::new()),
        );
        assert!(result.is_err());
    }
}
