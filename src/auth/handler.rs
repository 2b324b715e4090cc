//! Authentication Handler
//!
//! Transport decorator that attaches the bearer token and recovers from a
//! single 401 by refreshing the token and replaying the request once.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::manager::TokenManager;
use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::ProcoreResult;
use crate::types::AccessToken;

const AUTHORIZATION: &str = "Authorization";

/// [`HttpTransport`] that authenticates requests through a [`TokenManager`].
pub struct AuthenticatedTransport<T: HttpTransport + ?Sized> {
    inner: Arc<T>,
    token_manager: Arc<dyn TokenManager>,
    refresh_lock: Mutex<()>,
}

impl<T: HttpTransport + ?Sized> AuthenticatedTransport<T> {
    /// Create new authenticated transport.
    pub fn new(inner: Arc<T>, token_manager: Arc<dyn TokenManager>) -> Self {
        Self {
            inner,
            token_manager,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Token to replay with after `rejected` got a 401.
    async fn replacement_token(&self, rejected: Option<&AccessToken>) -> ProcoreResult<AccessToken> {
        let _guard = self.refresh_lock.lock().await;

        // A concurrent request may already have refreshed.
        if let (Some(rejected), Ok(Some(current))) =
            (rejected, self.token_manager.current_token().await)
        {
            if !current.same_value(rejected) && !current.is_expired() {
                debug!("Reusing token refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.token_manager.refresh_token().await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for AuthenticatedTransport<T> {
    async fn send(&self, mut request: HttpRequest) -> ProcoreResult<HttpResponse> {
        let mut sent_token = None;

        if request.get_header(AUTHORIZATION).is_none() {
            match self.token_manager.get_access_token().await {
                Ok(Some(token)) => {
                    request.set_header(AUTHORIZATION, token.authorization_header());
                    sent_token = Some(token);
                }
                Ok(None) => debug!("No access token available, sending request unauthenticated"),
                Err(e) => warn!(error = %e, "Failed to obtain access token"),
            }
        }

        let mut replay = request.clone();
        let response = self.inner.send(request).await?;
        if response.status != 401 {
            return Ok(response);
        }

        debug!("Received 401, refreshing token and retrying once");
        match self.replacement_token(sent_token.as_ref()).await {
            Ok(token) => {
                replay.set_header(AUTHORIZATION, token.authorization_header());
                self.inner.send(replay).await
            }
            Err(e) => {
                warn!(error = %e, "Token refresh after 401 failed");
                Ok(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockTokenManager;
    use crate::core::{HttpMethod, MockHttpTransport};
    use crate::error::{AuthError, ProcoreError};
    use chrono::Duration;

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "https://api.procore.com/rest/v1.0/me")
    }

    fn setup(token: Option<&str>) -> (Arc<MockHttpTransport>, Arc<MockTokenManager>) {
        let manager = MockTokenManager::new();
        manager.set_token(token.map(|t| AccessToken::bearer(t, Duration::hours(1))));
        (Arc::new(MockHttpTransport::new()), Arc::new(manager))
    }

    #[tokio::test]
    async fn test_injects_bearer_token() {
        let (inner, manager) = setup(Some("abc"));
        inner.queue_response(HttpResponse::new(200, "{}"));
        let transport = AuthenticatedTransport::new(inner.clone(), manager);

        transport.send(request()).await.unwrap();
        assert_eq!(
            inner.get_last_request().unwrap().get_header("authorization"),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn test_keeps_existing_authorization_header() {
        let (inner, manager) = setup(Some("abc"));
        inner.queue_response(HttpResponse::new(200, "{}"));
        let transport = AuthenticatedTransport::new(inner.clone(), manager.clone());

        transport
            .send(request().header("Authorization", "Bearer caller"))
            .await
            .unwrap();
        assert_eq!(
            inner.get_last_request().unwrap().get_header("Authorization"),
            Some("Bearer caller")
        );
        assert_eq!(manager.get_count(), 0);
    }

    #[tokio::test]
    async fn test_no_token_sends_unauthenticated() {
        let (inner, manager) = setup(None);
        inner.queue_response(HttpResponse::new(200, "{}"));
        let transport = AuthenticatedTransport::new(inner.clone(), manager);

        transport.send(request()).await.unwrap();
        assert!(inner.get_last_request().unwrap().get_header("Authorization").is_none());
    }

    #[tokio::test]
    async fn test_refreshes_and_retries_once_on_401() {
        let (inner, manager) = setup(Some("expired"));
        inner.queue_response(HttpResponse::new(401, ""));
        inner.queue_response(HttpResponse::new(200, "{\"ok\":true}"));
        let transport = AuthenticatedTransport::new(inner.clone(), manager.clone());

        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(manager.refresh_count(), 1);

        let requests = inner.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].get_header("Authorization"), Some("Bearer refreshed-token-1"));
    }

    #[tokio::test]
    async fn test_second_401_is_returned() {
        let (inner, manager) = setup(Some("expired"));
        inner.queue_response(HttpResponse::new(401, ""));
        inner.queue_response(HttpResponse::new(401, ""));
        let transport = AuthenticatedTransport::new(inner.clone(), manager.clone());

        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(inner.request_count(), 2);
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401() {
        let (inner, manager) = setup(Some("expired"));
        manager.queue_refresh_result(Err(ProcoreError::Auth(AuthError::NoRefreshToken)));
        inner.queue_response(HttpResponse::new(401, "denied"));
        let transport = AuthenticatedTransport::new(inner.clone(), manager);

        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.body, "denied");
        assert_eq!(inner.request_count(), 1);
    }

    #[tokio::test]
    async fn test_reuses_token_refreshed_concurrently() {
        let (inner, manager) = setup(Some("old"));
        let transport = AuthenticatedTransport::new(inner, manager.clone());

        // Simulate another request refreshing between send and the 401 handling.
        let rejected = AccessToken::bearer("old", Duration::hours(1));
        manager.set_token(Some(AccessToken::bearer("new", Duration::hours(1))));
        let token = transport.replacement_token(Some(&rejected)).await.unwrap();
        assert_eq!(token.secret(), "new");
        assert_eq!(manager.refresh_count(), 0);
    }
}
