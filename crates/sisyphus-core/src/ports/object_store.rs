//! ObjectStore port - bucket/key object storage.
//!
//! No versioning and no conditional writes: the last upload of a key wins.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy `bucket:key` into `destination`, overwriting it.
    async fn download(&self, bucket: &str, key: &str, destination: &Path)
    -> Result<(), StorageError>;

    /// Store the contents of `source` under `bucket:key`.
    async fn upload(&self, bucket: &str, source: &Path, key: &str) -> Result<(), StorageError>;
}
