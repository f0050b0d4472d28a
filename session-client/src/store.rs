use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use common_auth::{decode_str, AuthResult, DecodedPayload};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::storage::{DurableStorage, MemoryStorage};

/// Raw bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn decode(&self) -> Option<DecodedPayload> {
        decode_str(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

/// Holder of the current access token.
///
/// The durable storage is the source of truth when the store is opened;
/// afterwards every write goes to storage first and then to the in-memory
/// mirror under one lock, so no reader sees the two disagree. Clones share
/// the same state.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn DurableStorage>,
    key: String,
    write_lock: Mutex<()>,
    mirror: watch::Sender<Option<AccessToken>>,
}

impl TokenStore {
    /// Opens the store, loading any token already persisted under `key`.
    pub fn open(storage: Arc<dyn DurableStorage>, key: impl Into<String>) -> AuthResult<Self> {
        let key = key.into();
        let initial = storage.get(&key)?.filter(|raw| !raw.is_empty()).map(AccessToken);
        debug!(key = %key, present = initial.is_some(), "token store opened");
        let (mirror, _) = watch::channel(initial);
        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                key,
                write_lock: Mutex::new(()),
                mirror,
            }),
        })
    }

    /// Store backed by fresh process-local storage.
    pub fn in_memory(key: impl Into<String>) -> Self {
        let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
        let (mirror, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                storage,
                key: key.into(),
                write_lock: Mutex::new(()),
                mirror,
            }),
        }
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.inner.mirror.borrow().clone()
    }

    /// Decoded payload of the current token, if any.
    pub fn payload(&self) -> Option<DecodedPayload> {
        self.inner.mirror.borrow().as_ref().and_then(AccessToken::decode)
    }

    pub fn set(&self, token: AccessToken) -> AuthResult<()> {
        let _guard = self.inner.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.storage.set(&self.inner.key, token.as_str())?;
        self.inner.mirror.send_replace(Some(token));
        debug!("access token stored");
        Ok(())
    }

    /// Drops the token. The mirror is cleared even when the durable removal
    /// fails, so the process never keeps acting on a token it meant to drop.
    pub fn clear(&self) -> AuthResult<()> {
        let _guard = self.inner.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.inner.storage.remove(&self.inner.key);
        self.inner.mirror.send_replace(None);
        if let Err(err) = &removed {
            warn!(error = %err, "failed to remove persisted access token");
        } else {
            debug!("access token cleared");
        }
        removed
    }

    /// Re-reads durable storage into the mirror, picking up writes made by
    /// another process sharing the same storage.
    pub fn reload(&self) -> AuthResult<Option<AccessToken>> {
        let _guard = self.inner.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self
            .inner
            .storage
            .get(&self.inner.key)?
            .filter(|raw| !raw.is_empty())
            .map(AccessToken);
        self.inner.mirror.send_if_modified(|value| {
            if *value == current {
                false
            } else {
                *value = current.clone();
                true
            }
        });
        Ok(current)
    }

    /// Reactive view of the token for consumers that re-render on change.
    pub fn subscribe(&self) -> watch::Receiver<Option<AccessToken>> {
        self.inner.mirror.subscribe()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &self.inner.key)
            .field("present", &self.inner.mirror.borrow().is_some())
            .finish()
    }
}
