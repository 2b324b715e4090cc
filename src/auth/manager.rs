//! Token Manager
//!
//! Caches the access token in [`TokenStorage`] and refreshes it before it
//! expires. Refreshes are single-flight: concurrent callers wait for the
//! refresh in progress and reuse its result.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::storage::TokenStorage;
use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_token_error_from_response, AuthError, ProcoreResult, ProtocolError};
use crate::types::{AccessToken, ProcoreAuthOptions, TokenRefreshedEvent, TokenResponse};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Current token, refreshed first when it is inside the refresh margin.
    ///
    /// Returns `None` when no token is stored or storage is unavailable. If
    /// a refresh fails the stale token is returned.
    async fn get_access_token(&self) -> ProcoreResult<Option<AccessToken>>;

    /// Force a refresh using the stored refresh token.
    async fn refresh_token(&self) -> ProcoreResult<AccessToken>;

    /// Persist a token obtained elsewhere (e.g. the authorization code flow).
    async fn store_token(&self, token: &AccessToken) -> ProcoreResult<()>;

    /// Remove the stored token.
    async fn clear_token(&self) -> ProcoreResult<()>;

    /// Stored token without any refresh.
    async fn current_token(&self) -> ProcoreResult<Option<AccessToken>>;

    /// Receive an event after each successful refresh.
    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshedEvent>;
}

/// Default token manager implementation.
pub struct DefaultTokenManager<T: HttpTransport + ?Sized, S: TokenStorage + ?Sized> {
    options: ProcoreAuthOptions,
    transport: Arc<T>,
    storage: Arc<S>,
    storage_key: String,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<TokenRefreshedEvent>,
}

impl<T: HttpTransport + ?Sized, S: TokenStorage + ?Sized> DefaultTokenManager<T, S> {
    /// Create new token manager.
    pub fn new(options: ProcoreAuthOptions, transport: Arc<T>, storage: Arc<S>) -> Self {
        let storage_key = storage_key_for(&options.client_id);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            options,
            transport,
            storage,
            storage_key,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// Key under which this client's token is stored.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn build_refresh_request(&self, refresh_token: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, &self.options.token_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.options.client_id.as_str()),
                ("client_secret", self.options.client_secret.expose_secret().as_str()),
            ])
    }

    /// Perform the refresh. Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> ProcoreResult<AccessToken> {
        let old_token = self.storage.get_token(&self.storage_key).await?;
        let refresh_token = old_token
            .as_ref()
            .and_then(|t| t.refresh_token())
            .map(str::to_string)
            .ok_or(AuthError::NoRefreshToken)?;

        debug!(client_id = %self.options.client_id, "Refreshing access token");
        let response = self
            .transport
            .send(self.build_refresh_request(&refresh_token))
            .await?;

        if !response.is_success() {
            return Err(create_token_error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(ProtocolError::from)?;
        let new_token = token_response.into_access_token(Some(&refresh_token))?;

        self.storage.store_token(&self.storage_key, &new_token).await?;

        // No receivers is fine.
        let _ = self.events.send(TokenRefreshedEvent {
            new_token: new_token.clone(),
            old_token,
        });

        info!(expires_at = %new_token.expires_at, "Token refreshed successfully");
        Ok(new_token)
    }
}

fn storage_key_for(client_id: &str) -> String {
    format!("procore_token_{}", client_id)
}

#[async_trait]
impl<T: HttpTransport + ?Sized, S: TokenStorage + ?Sized> TokenManager
    for DefaultTokenManager<T, S>
{
    async fn get_access_token(&self) -> ProcoreResult<Option<AccessToken>> {
        let margin = self.options.token_refresh_margin;

        let token = match self.storage.get_token(&self.storage_key).await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to read token from storage");
                return Ok(None);
            }
        };

        if !token.needs_refresh(margin) {
            return Ok(Some(token));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Ok(Some(current)) = self.storage.get_token(&self.storage_key).await {
            if !current.needs_refresh(margin) {
                debug!("Using token refreshed by a concurrent caller");
                return Ok(Some(current));
            }
        }

        match self.refresh_locked().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, returning existing token");
                Ok(Some(token))
            }
        }
    }

    async fn refresh_token(&self) -> ProcoreResult<AccessToken> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn store_token(&self, token: &AccessToken) -> ProcoreResult<()> {
        self.storage.store_token(&self.storage_key, token).await
    }

    async fn clear_token(&self) -> ProcoreResult<()> {
        self.storage.delete_token(&self.storage_key).await?;
        debug!("Cleared stored token");
        Ok(())
    }

    async fn current_token(&self) -> ProcoreResult<Option<AccessToken>> {
        self.storage.get_token(&self.storage_key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshedEvent> {
        self.events.subscribe()
    }
}

/// Mock token manager for testing.
pub struct MockTokenManager {
    token: std::sync::Mutex<Option<AccessToken>>,
    refresh_results: std::sync::Mutex<std::collections::VecDeque<ProcoreResult<AccessToken>>>,
    get_count: std::sync::atomic::AtomicU32,
    refresh_count: std::sync::atomic::AtomicU32,
    events: broadcast::Sender<TokenRefreshedEvent>,
}

impl Default for MockTokenManager {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            token: std::sync::Mutex::new(None),
            refresh_results: std::sync::Mutex::new(Default::default()),
            get_count: Default::default(),
            refresh_count: Default::default(),
            events,
        }
    }
}

impl MockTokenManager {
    /// Create new mock token manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock holding `token`.
    pub fn with_token(token: AccessToken) -> Self {
        let manager = Self::default();
        *manager.token.lock().unwrap() = Some(token);
        manager
    }

    /// Queue the result of the next `refresh_token` call. With nothing
    /// queued a refresh yields `refreshed-token-{n}`.
    pub fn queue_refresh_result(&self, result: ProcoreResult<AccessToken>) -> &Self {
        self.refresh_results.lock().unwrap().push_back(result);
        self
    }

    /// Replace the held token without a refresh.
    pub fn set_token(&self, token: Option<AccessToken>) -> &Self {
        *self.token.lock().unwrap() = token;
        self
    }

    /// Number of `get_access_token` calls.
    pub fn get_count(&self) -> u32 {
        self.get_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of `refresh_token` calls.
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    async fn get_access_token(&self) -> ProcoreResult<Option<AccessToken>> {
        self.get_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.token.lock().unwrap().clone())
    }

    async fn refresh_token(&self) -> ProcoreResult<AccessToken> {
        let n = self
            .refresh_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        let result = self
            .refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(AccessToken::bearer(
                    format!("refreshed-token-{}", n),
                    chrono::Duration::hours(1),
                ))
            });

        if let Ok(token) = &result {
            let old_token = self.token.lock().unwrap().replace(token.clone());
            let _ = self.events.send(TokenRefreshedEvent {
                new_token: token.clone(),
                old_token,
            });
        }
        result
    }

    async fn store_token(&self, token: &AccessToken) -> ProcoreResult<()> {
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }

    async fn clear_token(&self) -> ProcoreResult<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }

    async fn current_token(&self) -> ProcoreResult<Option<AccessToken>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<TokenRefreshedEvent> {
        self.events.subscribe()
    }
}
