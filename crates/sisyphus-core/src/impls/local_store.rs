//! LocalObjectStore - buckets as directories under a base path.
//!
//! `bucket:key` lives at `<base>/<bucket>/<key>`. Used for development and as
//! the storage backend of the local runner.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::ports::ObjectStore;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let escapes = |s: &str| {
            Path::new(s)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        };
        if bucket.is_empty() || key.is_empty() || escapes(bucket) || escapes(key) {
            return Err(StorageError::Backend(format!(
                "invalid object location {bucket}:{key}"
            )));
        }
        Ok(self.base.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<(), StorageError> {
        let source = self.object_path(bucket, key)?;
        match tokio::fs::copy(&source, destination).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(source) => Err(StorageError::Io {
                path: destination.to_path_buf(),
                source,
            }),
        }
    }

    async fn upload(&self, bucket: &str, source: &Path, key: &str) -> Result<(), StorageError> {
        let destination = self.object_path(bucket, key)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        tokio::fs::copy(source, &destination)
            .await
            .map_err(|e| StorageError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download() {
        let base = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(base.path());

        let local = work.path().join("a.txt");
        tokio::fs::write(&local, b"hi\n").await.unwrap();
        store.upload("mybucket", &local, "result/a.txt").await.unwrap();

        assert_eq!(
            std::fs::read(base.path().join("mybucket/result/a.txt")).unwrap(),
            b"hi\n"
        );

        let copy = work.path().join("copy.txt");
        store.download("mybucket", "result/a.txt", &copy).await.unwrap();
        assert_eq!(std::fs::read(copy).unwrap(), b"hi\n");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let base = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(base.path());

        let err = store
            .download("b", "missing", &base.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn rejects_escaping_keys() {
        let store = LocalObjectStore::new("/srv/objects");
        assert!(store.object_path("b", "../../etc/passwd").is_err());
        assert!(store.object_path("..", "k").is_err());
    }
}
