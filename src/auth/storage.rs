//! Token Storage
//!
//! Pluggable persistence for access tokens.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

use crate::error::{ProcoreError, ProcoreResult, StorageError};
use crate::types::AccessToken;

/// Token storage interface.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Retrieve the token stored under `key`.
    async fn get_token(&self, key: &str) -> ProcoreResult<Option<AccessToken>>;

    /// Store a token under `key`, replacing any existing one.
    async fn store_token(&self, key: &str, token: &AccessToken) -> ProcoreResult<()>;

    /// Delete the token stored under `key`. Deleting a missing key succeeds.
    async fn delete_token(&self, key: &str) -> ProcoreResult<()>;
}

/// Reject empty or whitespace-only storage keys.
pub fn validate_key(key: &str) -> ProcoreResult<()> {
    if key.trim().is_empty() {
        return Err(ProcoreError::invalid_argument(
            "key",
            "Key cannot be null or empty",
        ));
    }
    Ok(())
}

/// In-memory token storage implementation.
#[derive(Default)]
pub struct InMemoryTokenStorage {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl InMemoryTokenStorage {
    /// Create new in-memory token storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn get_token(&self, key: &str) -> ProcoreResult<Option<AccessToken>> {
        validate_key(key)?;
        Ok(self.tokens.read().await.get(key).cloned())
    }

    async fn store_token(&self, key: &str, token: &AccessToken) -> ProcoreResult<()> {
        validate_key(key)?;
        self.tokens
            .write()
            .await
            .insert(key.to_string(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, key: &str) -> ProcoreResult<()> {
        validate_key(key)?;
        self.tokens.write().await.remove(key);
        Ok(())
    }
}

/// Mock token storage for testing.
#[derive(Default)]
pub struct MockTokenStorage {
    tokens: Mutex<HashMap<String, AccessToken>>,
    store_history: Mutex<Vec<(String, AccessToken)>>,
    get_history: Mutex<Vec<String>>,
    delete_history: Mutex<Vec<String>>,
    next_error: Mutex<Option<ProcoreError>>,
    should_fail: Mutex<bool>,
}

impl MockTokenStorage {
    /// Create new mock token storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: ProcoreError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Set storage to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Pre-populate a token.
    pub fn add_token(&self, key: &str, token: AccessToken) -> &Self {
        self.tokens.lock().unwrap().insert(key.to_string(), token);
        self
    }

    /// Get store history.
    pub fn get_store_history(&self) -> Vec<(String, AccessToken)> {
        self.store_history.lock().unwrap().clone()
    }

    /// Get retrieve history.
    pub fn get_get_history(&self) -> Vec<String> {
        self.get_history.lock().unwrap().clone()
    }

    /// Get delete history.
    pub fn get_delete_history(&self) -> Vec<String> {
        self.delete_history.lock().unwrap().clone()
    }

    fn check_error(&self) -> ProcoreResult<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(ProcoreError::Storage(StorageError::ReadFailed {
                message: "Mock storage failure".to_string(),
            }));
        }

        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn get_token(&self, key: &str) -> ProcoreResult<Option<AccessToken>> {
        validate_key(key)?;
        self.check_error()?;

        self.get_history.lock().unwrap().push(key.to_string());
        Ok(self.tokens.lock().unwrap().get(key).cloned())
    }

    async fn store_token(&self, key: &str, token: &AccessToken) -> ProcoreResult<()> {
        validate_key(key)?;
        self.check_error()?;

        self.store_history
            .lock()
            .unwrap()
            .push((key.to_string(), token.clone()));
        self.tokens
            .lock()
            .unwrap()
            .insert(key.to_string(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, key: &str) -> ProcoreResult<()> {
        validate_key(key)?;
        self.check_error()?;

        self.delete_history.lock().unwrap().push(key.to_string());
        self.tokens.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_token() -> AccessToken {
        AccessToken::bearer("test-access-token", Duration::hours(1))
            .with_refresh_token("test-refresh-token")
    }

    #[tokio::test]
    async fn test_in_memory_store_and_get() {
        let storage = InMemoryTokenStorage::new();

        storage.store_token("user1", &create_test_token()).await.unwrap();

        let retrieved = storage.get_token("user1").await.unwrap().unwrap();
        assert_eq!(retrieved.secret(), "test-access-token");
        assert_eq!(retrieved.refresh_token(), Some("test-refresh-token"));
    }

    #[tokio::test]
    async fn test_in_memory_replace_and_delete() {
        let storage = InMemoryTokenStorage::new();
        storage.store_token("user1", &create_test_token()).await.unwrap();
        storage
            .store_token("user1", &AccessToken::bearer("second", Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(
            storage.get_token("user1").await.unwrap().unwrap().secret(),
            "second"
        );

        storage.delete_token("user1").await.unwrap();
        assert!(storage.get_token("user1").await.unwrap().is_none());

        // deleting again is fine
        storage.delete_token("user1").await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_keys_rejected() {
        let storage = InMemoryTokenStorage::new();
        for key in ["", "   "] {
            assert!(matches!(
                storage.get_token(key).await,
                Err(ProcoreError::InvalidArgument { .. })
            ));
            assert!(storage.store_token(key, &create_test_token()).await.is_err());
            assert!(storage.delete_token(key).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_mock_storage_history() {
        let storage = MockTokenStorage::new();

        storage.store_token("test-key", &create_test_token()).await.unwrap();
        assert_eq!(storage.get_store_history()[0].0, "test-key");

        assert!(storage.get_token("test-key").await.unwrap().is_some());
        assert_eq!(storage.get_get_history(), vec!["test-key".to_string()]);

        storage.delete_token("test-key").await.unwrap();
        assert_eq!(storage.get_delete_history().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_storage_failure() {
        let storage = MockTokenStorage::new();
        storage.set_should_fail(true);
        assert!(storage.get_token("key").await.is_err());

        storage.set_should_fail(false);
        storage.set_next_error(ProcoreError::Storage(StorageError::WriteFailed {
            message: "disk full".to_string(),
        }));
        assert!(storage.store_token("key", &create_test_token()).await.is_err());
        assert!(storage.store_token("key", &create_test_token()).await.is_ok());
    }
}
