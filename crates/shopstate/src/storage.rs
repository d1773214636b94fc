//! Key/value persistence for cart and wishlist snapshots.
//!
//! The backend is injected at construction time - callers in contexts with
//! no durable medium (tests, server-side rendering) inject [`NoopBackend`]
//! instead of the code sniffing its environment.
//!
//! Failures never cross this boundary: a missing key, malformed payload, or
//! backend error on load yields the type's empty value; a failed save is
//! logged and the in-memory state stays authoritative.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Logical key for the persisted cart snapshot.
pub const CART_KEY: &str = "cart";
/// Logical key for the persisted wishlist snapshot.
pub const WISHLIST_KEY: &str = "wishlist";

/// Errors a storage backend can report.
///
/// These never propagate past [`Store`]; they exist so backends have a typed
/// channel to the adapter's logging.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A durable (or deliberately non-durable) key/value medium.
pub trait StorageBackend {
    /// Read the payload stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the medium could not be read. Callers go
    /// through [`Store`], which absorbs the error.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `payload` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the medium could not be written.
    fn save(&self, key: &str, payload: &str) -> Result<(), StorageError>;
}

impl<B: StorageBackend> StorageBackend for std::sync::Arc<B> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        (**self).save(key, payload)
    }
}

// =============================================================================
// Backends
// =============================================================================

/// File-per-key backend: each logical key becomes `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created lazily on
    /// first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), payload)?;
        Ok(())
    }
}

/// In-memory backend for tests and short-lived tooling.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key with a raw payload (e.g. deliberately malformed JSON).
    pub fn seed(&self, key: &str, payload: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), payload.to_string());
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), payload.to_string());
        Ok(())
    }
}

/// Backend for contexts with no durable medium: loads are empty, saves are
/// dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl StorageBackend for NoopBackend {
    fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _payload: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

// =============================================================================
// Store adapter
// =============================================================================

/// Serde layer over a [`StorageBackend`] that absorbs every failure.
#[derive(Debug)]
pub struct Store<B> {
    backend: B,
}

impl<B: StorageBackend> Store<B> {
    /// Wrap a backend.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Load and deserialize the value under `key`.
    ///
    /// A missing key, unreadable medium, or payload that fails to parse all
    /// yield `T::default()` - logged, never propagated.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let payload = match self.backend.load(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Storage load failed, starting empty");
                return T::default();
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored snapshot is corrupt, starting empty");
                T::default()
            }
        }
    }

    /// Serialize and persist `value` under `key`.
    ///
    /// Failures (quota, disabled medium) are logged; the in-memory value the
    /// caller holds remains authoritative.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to serialize snapshot");
                return;
            }
        };

        if let Err(e) = self.backend.save(key, &payload) {
            tracing::warn!(key, error = %e, "Storage save failed, keeping in-memory state");
        }
    }
}
