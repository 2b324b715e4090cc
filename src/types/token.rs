//! Token Types
//!
//! OAuth2 token type definitions.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AuthError, ProcoreResult};

/// Token response from the Procore token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    #[serde(default)]
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes, space separated.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields (`created_at`, ...).
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Validate the response and convert it into an [`AccessToken`].
    ///
    /// `fallback_refresh_token` is kept when the server does not rotate the
    /// refresh token.
    pub fn into_access_token(
        self,
        fallback_refresh_token: Option<&str>,
    ) -> ProcoreResult<AccessToken> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::InvalidToken {
                message: "Token response is missing access_token".to_string(),
            }
            .into());
        }
        if self.token_type.trim().is_empty() {
            return Err(AuthError::InvalidToken {
                message: "Token response is missing token_type".to_string(),
            }
            .into());
        }

        let expires_at = Utc::now() + Duration::seconds(self.expires_in.unwrap_or(0));
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| fallback_refresh_token.map(str::to_string));
        let scopes = self.scope.as_deref().map(split_scopes);

        Ok(AccessToken::new(
            self.access_token,
            self.token_type,
            expires_at,
            refresh_token,
            scopes,
        ))
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope
        .split(' ')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// OAuth2 access token with its refresh metadata.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    /// Token type.
    pub token_type: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    refresh_token: Option<SecretString>,
    /// Granted scopes.
    pub scopes: Option<Vec<String>>,
}

impl AccessToken {
    /// Create new access token.
    pub fn new(
        value: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
        scopes: Option<Vec<String>>,
    ) -> Self {
        Self {
            value: SecretString::new(value.into()),
            token_type: token_type.into(),
            expires_at,
            refresh_token: refresh_token.map(SecretString::new),
            scopes,
        }
    }

    /// Bearer token expiring `expires_in` from now.
    pub fn bearer(value: impl Into<String>, expires_in: Duration) -> Self {
        Self::new(value, "Bearer", Utc::now() + expires_in, None, None)
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::new(refresh_token.into()));
        self
    }

    /// Get token value (for Authorization header).
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Get the refresh token, if any.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// True when the token expires within `margin` from now.
    pub fn needs_refresh(&self, margin: std::time::Duration) -> bool {
        let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::zero());
        self.expires_at <= Utc::now() + margin
    }

    /// Get time until expiration.
    pub fn expires_in(&self) -> Option<std::time::Duration> {
        (self.expires_at - Utc::now()).to_std().ok()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value.expose_secret())
    }

    /// Compares token values without exposing them.
    pub fn same_value(&self, other: &AccessToken) -> bool {
        self.secret() == other.secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Serializable form of an [`AccessToken`] used by persistent storage.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl From<&AccessToken> for StoredToken {
    fn from(token: &AccessToken) -> Self {
        Self {
            token: token.secret().to_string(),
            token_type: token.token_type.clone(),
            expires_at: token.expires_at,
            refresh_token: token.refresh_token().map(str::to_string),
            scopes: token.scopes.clone(),
        }
    }
}

impl From<StoredToken> for AccessToken {
    fn from(stored: StoredToken) -> Self {
        AccessToken::new(
            stored.token,
            stored.token_type,
            stored.expires_at,
            stored.refresh_token,
            stored.scopes,
        )
    }
}

/// Broadcast after a successful token refresh.
#[derive(Clone, Debug)]
pub struct TokenRefreshedEvent {
    pub new_token: AccessToken,
    pub old_token: Option<AccessToken>,
}
