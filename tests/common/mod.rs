//! Shared helpers for the wiremock integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use procore_sdk::{
    procore_config, AccessToken, InMemoryTokenStorage, ProcoreClient, ProcoreConfigBuilder,
    RetryOptions, TokenStorage,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "client-123";
pub const STORAGE_KEY: &str = "procore_token_client-123";
pub const TOKEN_PATH: &str = "/oauth/token";

/// Builder pointed at `server` for both the API and the token endpoint.
pub fn config_builder(server: &MockServer) -> ProcoreConfigBuilder {
    procore_config()
        .base_url(server.uri())
        .token_endpoint(format!("{}{}", server.uri(), TOKEN_PATH))
        .authorization_endpoint(format!("{}/oauth/authorize", server.uri()))
        .client_id(CLIENT_ID)
        .client_secret("secret")
        .redirect_uri("https://app.example.com/callback")
        .retry(fast_retry(0))
}

/// Retry policy with short, deterministic delays.
pub fn fast_retry(max_retries: u32) -> RetryOptions {
    RetryOptions {
        max_retries,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
        use_jitter: false,
        ..Default::default()
    }
}

/// Client whose in-memory storage already holds `token`.
pub async fn client_with_token(
    builder: ProcoreConfigBuilder,
    token: AccessToken,
) -> (ProcoreClient, Arc<InMemoryTokenStorage>) {
    let storage = Arc::new(InMemoryTokenStorage::new());
    storage.store_token(STORAGE_KEY, &token).await.unwrap();

    let config = builder.build().unwrap();
    let client = ProcoreClient::with_storage(config, storage.clone()).unwrap();
    (client, storage)
}

/// Client with a bearer token `abc` valid for an hour.
pub async fn authenticated_client(server: &MockServer) -> ProcoreClient {
    let (client, _) = client_with_token(
        config_builder(server),
        AccessToken::bearer("abc", chrono::Duration::hours(1)),
    )
    .await;
    client
}

/// Token that is inside the default refresh margin.
pub fn expiring_token(value: &str, refresh_token: &str) -> AccessToken {
    AccessToken::new(
        value,
        "Bearer",
        Utc::now() + chrono::Duration::seconds(30),
        Some(refresh_token.to_string()),
        None,
    )
}

pub fn token_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 7200,
        "refresh_token": refresh_token,
        "created_at": 1700000000
    })
}

/// Token endpoint answering every request with `access_token`.
pub async fn mount_token_endpoint(server: &MockServer, access_token: &str, refresh_token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, refresh_token)))
        .mount(server)
        .await;
}
