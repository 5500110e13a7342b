use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// TTL-aware key-value store holding one user's credential entries.
///
/// Implementations guarantee per-key atomicity (a `set` fully replaces the
/// prior value) but no cross-key transactionality; the cascade is written
/// around that.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Never errors for a missing key.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// With a TTL the entry becomes unreadable via `get` once it elapses;
    /// `None` stores indefinitely.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
}

/// Cache key layout for one authorized user's grant:
/// `{prefix}:{client_key}:{open_id}` for the grant record, with
/// `:access_token` / `:refresh_token` suffixes for the derived entries.
#[derive(Debug, Clone)]
pub struct NamespaceKeys {
    pub grant: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl NamespaceKeys {
    pub fn new(prefix: &str, client_key: &str, open_id: &str) -> Self {
        let grant = format!("{prefix}:{client_key}:{open_id}");
        let access_token = format!("{grant}:access_token");
        let refresh_token = format!("{grant}:refresh_token");
        Self {
            grant,
            access_token,
            refresh_token,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-process [`CredentialStore`]. Expired entries are dropped lazily on
/// read. Deadlines sit on the tokio clock, so paused-time tests can drive
/// expiry deterministically.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.get(key) else {
            return Ok(None);
        };
        if entry
            .expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            inner.remove(key);
            return Ok(None);
        }
        Ok(inner.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.inner.lock().insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }
}
