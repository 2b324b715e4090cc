//! Encrypted File Token Storage
//!
//! Persists tokens to a single file holding an AES-256-GCM encrypted JSON
//! map of `key -> token`. The file layout is `nonce (12 bytes) || ciphertext || tag`.
//!
//! When no key is supplied the encryption key is derived from the file path
//! and host name. That ties the file to one machine but is not a substitute
//! for a managed secret; pass an explicit key with [`FileTokenStorage::with_key`]
//! when the file may leave the host.

use async_trait::async_trait;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::storage::{validate_key, TokenStorage};
use crate::error::{ConfigurationError, ProcoreResult, StorageError};
use crate::types::{AccessToken, StoredToken};

const KEY_LEN: usize = 32;

type TokenMap = HashMap<String, StoredToken>;

/// Token storage backed by an encrypted file.
pub struct FileTokenStorage {
    path: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
    file_lock: Mutex<()>,
}

impl std::fmt::Debug for FileTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTokenStorage")
            .field("path", &self.path)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl FileTokenStorage {
    /// Storage at `path` with a key derived from the path and host name.
    pub fn new(path: impl Into<PathBuf>) -> ProcoreResult<Self> {
        let path = path.into();
        let key = derive_machine_key(&path);
        Self::with_key(path, &key)
    }

    /// Storage at `path` encrypted with a caller-supplied 32-byte key.
    pub fn with_key(path: impl Into<PathBuf>, key: &[u8]) -> ProcoreResult<Self> {
        if key.len() != KEY_LEN {
            return Err(ConfigurationError::InvalidConfig {
                message: format!("Encryption key must be {} bytes, got {}", KEY_LEN, key.len()),
            }
            .into());
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| {
            StorageError::EncryptionFailed {
                message: "Invalid AES-256-GCM key".to_string(),
            }
        })?;

        Ok(Self {
            path: path.into(),
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
            file_lock: Mutex::new(()),
        })
    }

    /// Default location: `$HOME/.procore/tokens.dat`.
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        home.join(".procore").join("tokens.dat")
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encrypt(&self, plaintext: &[u8]) -> ProcoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StorageError::EncryptionFailed {
                message: "Failed to generate nonce".to_string(),
            })?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| StorageError::EncryptionFailed {
                message: "Failed to encrypt token data".to_string(),
            })?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&in_out);
        Ok(output)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(StorageError::CorruptedData {
                message: "Token file is truncated".to_string(),
            });
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| {
            StorageError::CorruptedData {
                message: "Invalid nonce".to_string(),
            }
        })?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::DecryptionFailed {
                message: "Token file could not be decrypted".to_string(),
            })?;
        Ok(plaintext.to_vec())
    }

    /// Read the token map. `Ok(None)` when the file does not exist.
    async fn read_file(&self) -> ProcoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                message: format!("{}: {}", self.path.display(), e),
            }
            .into()),
        }
    }

    fn decode(&self, data: &[u8]) -> Result<TokenMap, StorageError> {
        let plaintext = self.decrypt(data)?;
        serde_json::from_slice(&plaintext).map_err(|e| StorageError::CorruptedData {
            message: e.to_string(),
        })
    }

    /// Load the map, treating an unreadable file as empty.
    async fn load_or_empty(&self) -> ProcoreResult<TokenMap> {
        let Some(data) = self.read_file().await? else {
            return Ok(TokenMap::new());
        };
        match self.decode(&data) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Token file is corrupted, treating as empty");
                Ok(TokenMap::new())
            }
        }
    }

    async fn write_map(&self, map: &TokenMap) -> ProcoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::WriteFailed {
                        message: format!("{}: {}", parent.display(), e),
                    })?;
            }
        }

        let json = serde_json::to_vec(map).map_err(|e| StorageError::WriteFailed {
            message: e.to_string(),
        })?;
        let encrypted = self.encrypt(&json)?;

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &encrypted)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: format!("{}: {}", tmp_path.display(), e),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = tokio::fs::set_permissions(&tmp_path, perms).await {
                debug!(error = %e, "Could not restrict token file permissions");
            }
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: format!("{}: {}", self.path.display(), e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get_token(&self, key: &str) -> ProcoreResult<Option<AccessToken>> {
        validate_key(key)?;
        let _guard = self.file_lock.lock().await;

        let map = self.load_or_empty().await?;
        Ok(map.get(key).cloned().map(AccessToken::from))
    }

    async fn store_token(&self, key: &str, token: &AccessToken) -> ProcoreResult<()> {
        validate_key(key)?;
        let _guard = self.file_lock.lock().await;

        let mut map = self.load_or_empty().await?;
        map.insert(key.to_string(), StoredToken::from(token));
        self.write_map(&map).await?;
        debug!(key, "Stored token");
        Ok(())
    }

    async fn delete_token(&self, key: &str) -> ProcoreResult<()> {
        validate_key(key)?;
        let _guard = self.file_lock.lock().await;

        let Some(data) = self.read_file().await? else {
            return Ok(());
        };
        let mut map = match self.decode(&data) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring delete on corrupted token file");
                return Ok(());
            }
        };

        if map.remove(key).is_none() {
            return Ok(());
        }

        if map.is_empty() {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::DeleteFailed {
                        message: format!("{}: {}", self.path.display(), e),
                    }
                    .into())
                }
            }
        } else {
            self.write_map(&map).await?;
        }
        debug!(key, "Deleted token");
        Ok(())
    }
}

fn derive_machine_key(path: &Path) -> [u8; KEY_LEN] {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(host.as_bytes());
    hasher.finalize().into()
}
