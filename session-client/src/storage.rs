//! Durable key-value storage behind the token store.
//!
//! Mirrors a browser profile's local storage: string keys, string values,
//! surviving restarts of the process that wrote them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use common_auth::{AuthError, AuthResult};

const STORAGE_FILE: &str = "session.json";

pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> AuthResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AuthResult<()>;
    fn remove(&self, key: &str) -> AuthResult<()>;
}

/// Process-local storage, used in tests and when persistence is not wanted.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| AuthError::Storage("memory storage lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AuthError::Storage("memory storage lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AuthError::Storage("memory storage lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

/// JSON document on disk holding every key. Writes go through a temporary
/// file and a rename so a crash never leaves a half-written document.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Storage rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORAGE_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> AuthResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                AuthError::Storage(format!("corrupt storage file {}: {err}", self.path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(AuthError::Storage(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AuthError::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let body = serde_json::to_vec_pretty(entries)
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|err| {
            AuthError::Storage(format!("failed to write {}: {err}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            AuthError::Storage(format!("failed to replace {}: {err}", self.path.display()))
        })
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> AuthResult<T>) -> AuthResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AuthError::Storage("file storage lock poisoned".into()))?;
        f()
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.with_lock(|| Ok(self.read_all()?.remove(key)))
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.with_lock(|| {
            let mut entries = self.read_all()?;
            entries.insert(key.to_string(), value.to_string());
            self.write_all(&entries)
        })
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        self.with_lock(|| {
            let mut entries = self.read_all()?;
            if entries.remove(key).is_none() {
                return Ok(());
            }
            self.write_all(&entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("accessToken").expect("get"), None);
        storage.set("accessToken", "abc").expect("set");
        assert_eq!(storage.get("accessToken").expect("get").as_deref(), Some("abc"));
        storage.remove("accessToken").expect("remove");
        assert_eq!(storage.get("accessToken").expect("get"), None);
    }

    #[test]
    fn memory_storage_clones_share_entries() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.set("k", "v").expect("set");
        assert_eq!(other.get("k").expect("get").as_deref(), Some("v"));
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("profile"));
        assert_eq!(storage.get("accessToken").expect("get"), None);
        storage.set("accessToken", "abc").expect("set");
        storage.set("other", "keep").expect("set");

        let reopened = FileStorage::new(dir.path().join("profile"));
        assert_eq!(reopened.get("accessToken").expect("get").as_deref(), Some("abc"));

        reopened.remove("accessToken").expect("remove");
        assert_eq!(storage.get("accessToken").expect("get"), None);
        assert_eq!(storage.get("other").expect("get").as_deref(), Some("keep"));
    }

    #[test]
    fn file_storage_reports_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        fs::write(storage.path(), b"{not json").expect("write");
        let err = storage.get("accessToken").expect_err("corrupt file");
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[test]
    fn removing_missing_key_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        storage.remove("accessToken").expect("remove");
        assert!(!storage.path().exists());
    }
}
