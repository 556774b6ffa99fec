//! Token record persistence
//!
//! [`TokenStore`] is the durable projection of the authenticated session. It
//! layers whole-record load/save/clear semantics over a per-key
//! [`KeyValueStore`] backend: all six fields are read and written under one
//! internal lock so a concurrent reader can never observe a partially written
//! record, even when the backend only offers per-key operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::errors::AuthError;
use crate::models::TokenRecord;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persisted key layout. All six keys are written and cleared as one logical
/// unit.
mod keys {
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const ID_TOKEN: &str = "idToken";
    pub const TOKEN_TYPE: &str = "tokenType";
    pub const SCOPES: &str = "scopes";
    pub const EXPIRES_AT: &str = "accessTokenExpirationDate";

    pub const ALL: [&str; 6] = [
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        ID_TOKEN,
        TOKEN_TYPE,
        SCOPES,
        EXPIRES_AT,
    ];
}

/// Failure in the persistence layer. "Not found" is never an error; only the
/// backend itself failing is.
#[derive(Debug, Clone, Error)]
#[error("storage failure: {0}")]
pub struct StorageError(pub String);

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::StorageFailure(err.0)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// External key-value persistence capability, string keys and values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error only for a backend failure; a missing key is
    /// `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for a backend failure.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed, atomic persistence of the current [`TokenRecord`].
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    // Serializes multi-key operations; backends only guarantee per-key
    // atomicity.
    guard: Mutex<()>,
}

impl TokenStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            guard: Mutex::new(()),
        }
    }

    /// Load the persisted record. `Ok(None)` when no session is stored,
    /// including the case where other fields are present but the access token
    /// is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] only for a backend failure.
    pub async fn load(&self) -> Result<Option<TokenRecord>, StorageError> {
        let _guard = self.guard.lock().await;

        let access_token = match self.backend.get(keys::ACCESS_TOKEN).await? {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };

        let refresh_token = non_empty(self.backend.get(keys::REFRESH_TOKEN).await?);
        let id_token = non_empty(self.backend.get(keys::ID_TOKEN).await?);
        let token_type = non_empty(self.backend.get(keys::TOKEN_TYPE).await?);

        let scopes = match self.backend.get(keys::SCOPES).await? {
            Some(raw) if !raw.is_empty() => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(scopes) => Some(scopes),
                Err(e) => {
                    log::warn!("ignoring unparseable stored scopes: {e}");
                    None
                }
            },
            _ => None,
        };

        let expires_at = match self.backend.get(keys::EXPIRES_AT).await? {
            Some(raw) if !raw.is_empty() => match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    log::warn!("ignoring unparseable stored expiration date: {e}");
                    None
                }
            },
            _ => None,
        };

        Ok(Some(TokenRecord {
            access_token,
            refresh_token,
            id_token,
            token_type,
            scopes,
            expires_at,
        }))
    }

    /// Persist the record wholesale, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if any key cannot be written; callers must
    /// not assume a partial write took effect.
    pub async fn save(&self, record: &TokenRecord) -> Result<(), StorageError> {
        let _guard = self.guard.lock().await;

        self.backend
            .set(keys::ACCESS_TOKEN, &record.access_token)
            .await?;
        self.set_optional(keys::REFRESH_TOKEN, record.refresh_token.as_deref())
            .await?;
        self.set_optional(keys::ID_TOKEN, record.id_token.as_deref())
            .await?;
        self.set_optional(keys::TOKEN_TYPE, record.token_type.as_deref())
            .await?;

        let scopes = match &record.scopes {
            Some(scopes) => Some(serde_json::to_string(scopes)?),
            None => None,
        };
        self.set_optional(keys::SCOPES, scopes.as_deref()).await?;

        let expires_at = record
            .expires_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.set_optional(keys::EXPIRES_AT, expires_at.as_deref())
            .await?;

        Ok(())
    }

    /// Remove every persisted field. Clearing an already-empty store
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] only for a backend failure.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.guard.lock().await;
        for key in keys::ALL {
            self.backend.remove(key).await?;
        }
        Ok(())
    }

    async fn set_optional(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.backend.set(key, value).await,
            None => self.backend.remove(key).await,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Timelike};

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStore::new()))
    }

    fn full_record() -> TokenRecord {
        TokenRecord {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
            id_token: Some("ghi".to_string()),
            token_type: Some("Bearer".to_string()),
            scopes: Some(vec!["openid".to_string(), "profile".to_string()]),
            expires_at: Some(
                (Utc::now() + Duration::hours(1))
                    .with_nanosecond(0)
                    .unwrap(),
            ),
        }
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let store = store();
        let record = full_record();
        store.save(&record).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn sparse_record_round_trips() {
        let store = store();
        let record = TokenRecord {
            access_token: "abc".to_string(),
            refresh_token: None,
            id_token: None,
            token_type: None,
            scopes: None,
            expires_at: None,
        };
        store.save(&record).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn empty_store_loads_none() {
        assert_eq!(store().load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = store();
        store.clear().await.unwrap();
        store.save(&full_record()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_access_token_means_no_session() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("refreshToken", "def").await.unwrap();
        backend.set("idToken", "ghi").await.unwrap();

        let store = TokenStore::new(backend);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_access_token_means_no_session() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("accessToken", "").await.unwrap();
        backend.set("refreshToken", "def").await.unwrap();

        let store = TokenStore::new(backend);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_replaces_previous_record_wholesale() {
        let store = store();
        store.save(&full_record()).await.unwrap();

        let sparse = TokenRecord {
            access_token: "abc2".to_string(),
            refresh_token: None,
            id_token: None,
            token_type: None,
            scopes: None,
            expires_at: None,
        };
        store.save(&sparse).await.unwrap();

        // Fields absent in the new record must not survive from the old one.
        assert_eq!(store.load().await.unwrap(), Some(sparse));
    }

    #[tokio::test]
    async fn unparseable_expiration_is_dropped_not_fatal() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("accessToken", "abc").await.unwrap();
        backend
            .set("accessTokenExpirationDate", "not-a-date")
            .await
            .unwrap();

        let store = TokenStore::new(backend);
        let record = store.load().await.unwrap().unwrap();
        assert_eq!(record.expires_at, None);
    }
}
