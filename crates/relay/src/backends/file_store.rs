//! Filesystem-backed object store.
//!
//! Buckets are directories under a base path and keys are relative paths
//! inside them, so `inbound/abc` in bucket `mail` lives at
//! `{base_path}/mail/inbound/abc`.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::{ObjectStore, StorageError, StorageFuture, StorageResult};

/// Object store keeping every object as a plain file.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Creates a new [`FileStore`] rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Maps a bucket and key to a path below the base path.
    ///
    /// Empty, `.` and `..` segments are rejected so objects can never
    /// escape the bucket directory.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if !is_safe_segment(bucket) {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        let mut path = self.base_path.join(bucket);
        for segment in key.split('/') {
            if !is_safe_segment(segment) {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(PathBuf::from("storage"))
    }
}

impl ObjectStore for FileStore {
    fn fetch<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            debug!(path = %path.display(), "Reading object from filesystem");
            Ok(fs::read(&path).await?)
        })
    }

    fn write<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        data: &'a [u8],
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            debug!(path = %path.display(), size = data.len(), "Writing object to filesystem");
            fs::write(&path, data).await?;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "file_store"
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.contains('\\')
}
