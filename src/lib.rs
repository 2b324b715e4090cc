//! Procore SDK
//!
//! Typed client for the Procore construction management REST API.
//!
//! # Features
//!
//! - OAuth2 Authorization Code flow with PKCE (RFC 7636)
//! - Client Credentials flow for service accounts
//! - Token storage with proactive, single-flight refresh
//! - Retry with exponential backoff, circuit breaker and per-attempt timeouts
//! - Typed errors mapped from HTTP responses
//! - Companies, users, documents, custom fields and projects
//!
//! # Example
//!
//! ```rust,ignore
//! use procore_sdk::{procore_config, ProcoreClient, PaginationOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = procore_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .redirect_uri("https://myapp.com/callback")
//!         .company_id(42)
//!         .build()?;
//!
//!     let client = ProcoreClient::new(config)?;
//!
//!     // Send the user here, keep the verifier for the callback.
//!     let auth = client.authorization_url(None)?;
//!     println!("Authorize at: {}", auth.url);
//!
//!     // In the redirect handler:
//!     // client.complete_authorization(&code, &auth.code_verifier).await?;
//!
//!     let projects = client
//!         .projects()
//!         .list_paged(42, &PaginationOptions::new(1, 50))
//!         .await?;
//!     for project in projects.items {
//!         println!("{} {}", project.id, project.name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, tokens, domain models, requests and paging
//! - `error`: error hierarchy and the HTTP status mapper
//! - `core`: HTTP transport and PKCE primitives
//! - `auth`: token storage, token manager, OAuth flow and request signing
//! - `resilience`: retry, circuit breaker and timeout decorator
//! - `mapping`: wire DTOs and domain mappers with metrics
//! - `telemetry`: structured logging
//! - `builders`: fluent configuration builder
//! - `services`: per-resource operations
//! - `client`: [`ProcoreClient`] tying the layers together

pub mod auth;
pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod mapping;
pub mod resilience;
pub mod services;
pub mod telemetry;
pub mod types;

// Re-export main client
pub use client::{ProcoreClient, COMPANY_ID_HEADER};

// Re-export builders
pub use builders::{procore_config, ProcoreConfigBuilder};

// Re-export errors
pub use error::{
    ApiError, AuthError, ConfigurationError, ErrorContext, ErrorMapper, MappingError,
    NetworkError, ProcoreError, ProcoreResult, ProtocolError, ProviderError, StorageError,
};

// Re-export types
pub use types::{
    // Config
    CircuitBreakerOptions, ProcoreAuthOptions, ProcoreConfig, ResilienceLoggingOptions,
    ResilienceOptions, RetryOptions, TimeoutOptions,
    // Token
    AccessToken, StoredToken, TokenRefreshedEvent, TokenResponse,
    // Models
    Address, Company, CustomField, CustomFields, Document, Project, User,
    // Requests
    CreateCompanyRequest, CreateCustomFieldRequest, CreateProjectRequest, CreateUserRequest,
    UpdateCompanyRequest, UpdateCustomFieldRequest, UpdateDocumentRequest, UpdateProjectRequest,
    UpdateUserRequest, UploadDocumentRequest,
    // Paging
    PagedResult, PaginationOptions, SortDirection,
};

// Re-export auth components
pub use auth::{
    AuthenticatedTransport, AuthorizationUrl, DefaultTokenManager, FileTokenStorage,
    InMemoryTokenStorage, MockTokenManager, MockTokenStorage, OAuthFlowHelper, TokenManager,
    TokenStorage,
};

// Re-export core components
pub use core::{
    FileUpload, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    MultipartForm, PkceParams, ReqwestHttpTransport,
};

// Re-export resilience
pub use resilience::{CircuitBreaker, CircuitState, ResilientTransport, RetryPolicy};

// Re-export services
pub use services::{
    CompaniesService, CustomFieldsService, DocumentsService, ProjectsService, UsersService,
};

// Re-export mapping
pub use mapping::{MappingMetricsSnapshot, TypeMapper};

// Re-export telemetry
pub use telemetry::{init_logging, LogFormat, LogLevel, LoggingConfig, StructuredLogger};
