//! Object storage for post images.
//!
//! The orchestrator only needs create-only writes and deletes, plus listing
//! for the reconciliation sweep and get for serving. Backends:
//!
//! - [`LocalObjectStore`]: one file per object under a bucket directory
//! - [`MemoryObjectStore`]: process memory, with switches to force failures

mod local;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use self::local::LocalObjectStore;
pub use self::memory::MemoryObjectStore;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Object store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a new object. An existing object under `key` is left untouched
    /// and the write fails with [`ObjectStoreError::AlreadyExists`].
    async fn put_new(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, ObjectStoreError>;

    /// Remove an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    async fn list_keys(&self) -> Result<Vec<String>, ObjectStoreError>;
}

/// Keys are flat names: ASCII letters, digits, `.`, `_` and `-`, not starting
/// with a dot and never containing `..`.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    }
}
