//! Durable client storage for carts.
//!
//! Storage is a flat string key/value space. The local cart keeps its item
//! list under [`keys::CART_ITEMS`]; the remote cart keeps its session token
//! under [`keys::CART_SESSION_ID`]. Access is synchronous from the engines'
//! point of view.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cartkeeper_core::{CartSessionId, VisitorId};
use thiserror::Error;
use tracing::warn;

/// Storage keys used by the cart engines.
pub mod keys {
    /// JSON array of `CartLineItem` records (local cart).
    pub const CART_ITEMS: &str = "cart_items";

    /// Remote cart session token. Absent means no server cart yet.
    pub const CART_SESSION_ID: &str = "cart_session_id";
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes were not valid UTF-8.
    #[error("Stored value for {0} is not valid UTF-8")]
    Encoding(String),
}

/// A synchronous string key/value store that survives reloads.
///
/// Implementations must treat removing a missing key as success.
pub trait DurableStore: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store. Used in tests and for ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

/// One file per key under a root directory.
///
/// Writes land in a sibling temp file and are renamed into place, so readers
/// see either the old record or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_file_name(key)))
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::Encoding(key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Escape a key into a file name: ASCII alphanumerics, `-` and `_` pass
/// through, every other byte becomes `%XX`.
fn encode_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

// =============================================================================
// Scoped store
// =============================================================================

/// A view of a shared store where every key is prefixed with a namespace.
///
/// One backing store serves every visitor; each visitor's cart sees only its
/// own keys.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn DurableStore>,
    prefix: String,
}

impl ScopedStore {
    /// Scope `inner` to a visitor.
    #[must_use]
    pub fn for_visitor(inner: Arc<dyn DurableStore>, visitor: &VisitorId) -> Self {
        Self {
            inner,
            prefix: format!("{visitor}:"),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl DurableStore for ScopedStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.read(&self.scoped(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.write(&self.scoped(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(&self.scoped(key))
    }
}

// =============================================================================
// Session identity store
// =============================================================================

/// Reads and writes the remote cart's session token.
///
/// Injected into the remote engine so tests can hand it an in-memory store.
#[derive(Clone)]
pub struct SessionIdentityStore {
    store: Arc<dyn DurableStore>,
}

impl SessionIdentityStore {
    /// Wrap a durable store.
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Load the stored token. Unreadable storage counts as "no session".
    #[must_use]
    pub fn load(&self) -> Option<CartSessionId> {
        match self.store.read(keys::CART_SESSION_ID) {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(CartSessionId::from),
            Err(e) => {
                warn!(error = %e, "Failed to read cart session id, starting without one");
                None
            }
        }
    }

    /// Persist a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    pub fn save(&self, id: &CartSessionId) -> Result<(), StorageError> {
        self.store.write(keys::CART_SESSION_ID, id.as_str())
    }

    /// Forget the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the removal.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::CART_SESSION_ID)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip_and_remove_missing() {
        let store = MemoryStore::new();
        assert!(store.read("k").unwrap().is_none());

        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.read("k").unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        FileStore::open(dir.path())
            .unwrap()
            .write("visitor:cart_items", "[]")
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.read("visitor:cart_items").unwrap().as_deref(),
            Some("[]")
        );
        reopened.remove("visitor:cart_items").unwrap();
        assert!(reopened.read("visitor:cart_items").unwrap().is_none());
    }

    #[test]
    fn test_encode_file_name_escapes_separators() {
        assert_eq!(encode_file_name("abc-1_2"), "abc-1_2");
        assert_eq!(encode_file_name("v:cart/../x"), "v%3Acart%2F%2E%2E%2Fx");
    }

    #[test]
    fn test_scoped_store_isolates_visitors() {
        let shared: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let alice = ScopedStore::for_visitor(Arc::clone(&shared), &VisitorId::new("alice"));
        let bob = ScopedStore::for_visitor(Arc::clone(&shared), &VisitorId::new("bob"));

        alice.write(keys::CART_ITEMS, "[1]").unwrap();
        assert!(bob.read(keys::CART_ITEMS).unwrap().is_none());
        assert_eq!(
            shared.read("alice:cart_items").unwrap().as_deref(),
            Some("[1]")
        );
    }

    #[test]
    fn test_session_identity_store_lifecycle() {
        let identity = SessionIdentityStore::new(Arc::new(MemoryStore::new()));
        assert!(identity.load().is_none());

        identity.save(&CartSessionId::new("cart-1")).unwrap();
        assert_eq!(identity.load(), Some(CartSessionId::new("cart-1")));

        identity.clear().unwrap();
        assert!(identity.load().is_none());
    }

    #[test]
    fn test_blank_session_id_is_treated_as_absent() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        store.write(keys::CART_SESSION_ID, "  ").unwrap();
        assert!(SessionIdentityStore::new(store).load().is_none());
    }
}
