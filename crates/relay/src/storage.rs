//! Object storage seam used to fetch inbound messages and keep outbound copies.
//!
//! Concrete engines live in [`backends`](crate::backends): [`FileStore`](crate::FileStore)
//! for the local filesystem and [`MemoryStore`](crate::MemoryStore) for tests
//! and dry runs.

use std::{fmt::Display, future::Future, io, pin::Pin};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future type for storage operations, enabling object safety.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = StorageResult<T>> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The requested object does not exist.
    NotFound,
    /// The key cannot be mapped to an object location.
    InvalidKey(String),
    /// An I/O error occurred.
    Io(io::Error),
    /// The storage backend failed.
    Backend(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "Object not found"),
            StorageError::InvalidKey(key) => write!(f, "Invalid object key: {key}"),
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Backend(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for object stores addressed by bucket and key.
pub trait ObjectStore: Send + Sync {
    /// Reads the object stored under `key` in `bucket`.
    fn fetch<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, Vec<u8>>;

    /// Writes `data` under `key` in `bucket`, replacing any previous object.
    fn write<'a>(&'a self, bucket: &'a str, key: &'a str, data: &'a [u8])
        -> StorageFuture<'a, ()>;

    /// Returns the name of this store.
    fn name(&self) -> &str;
}
