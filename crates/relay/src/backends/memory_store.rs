//! In-memory object store.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::{ObjectStore, StorageError, StorageFuture};

/// Object store keeping objects in a `HashMap` keyed by `(bucket, key)`.
///
/// Useful for testing and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object directly, bypassing the async interface.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Returns a copy of an object, if present.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn fetch<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, Vec<u8>> {
        Box::pin(async move { self.get(bucket, key).ok_or(StorageError::NotFound) })
    }

    fn write<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        data: &'a [u8],
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.insert(bucket, key, data);
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "memory_store"
    }
}
