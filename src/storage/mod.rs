//! Synchronous key-value storage backends
//!
//! The cache and the token store sit on top of a plain string store, the
//! same shape as a mini-program's `getStorageSync`/`setStorageSync` surface.
//! Every call may fail with I/O; callers on the cache path treat a failure
//! as a miss.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors from a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage key is not valid: {0}")]
    InvalidKey(String),

    #[error("storage backend poisoned")]
    Poisoned,
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Synchronous string key-value store
pub trait StorageBackend: Send + Sync {
    /// Read a value; `Ok(None)` when absent
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored
    fn list_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Remove everything
    fn clear(&self) -> Result<(), StorageError>;
}
