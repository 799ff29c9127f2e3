//! Artifact references and their local staging paths.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::ResolveError;

/// Which side of the container an artifact is staged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inputs,
    Outputs,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inputs => "inputs",
            Direction::Outputs => "outputs",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote object location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    pub bucket: String,
    pub key: String,
}

impl ArtifactRef {
    /// Split `bucket:key` on the first colon. A bare `key` lands in `default_bucket`.
    pub fn parse(reference: &str, default_bucket: &str) -> Self {
        match reference.split_once(':') {
            Some((bucket, key)) => Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            None => Self {
                bucket: default_bucket.to_string(),
                key: reference.to_string(),
            },
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.key)
    }
}

/// Maps artifact references onto `root/<direction>/<key>`.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    default_bucket: String,
    root: PathBuf,
}

impl ArtifactResolver {
    /// A relative `root` is anchored at the current directory, since bind
    /// mounts need absolute sources.
    pub fn new(default_bucket: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            default_bucket: default_bucket.into(),
            root,
        }
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn parse(&self, reference: &str) -> ArtifactRef {
        ArtifactRef::parse(reference, &self.default_bucket)
    }

    /// Compute the staging path without touching the filesystem.
    ///
    /// Separators inside `key` become subdirectories. Keys that are absolute or
    /// climb out with `..` are rejected.
    pub fn staging_path(&self, direction: Direction, key: &str) -> Result<PathBuf, ResolveError> {
        let mut path = self.root.join(direction.as_str());
        let mut depth = 0usize;
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ResolveError::UnsafeKey(key.to_string()));
                }
            }
        }
        if depth == 0 {
            return Err(ResolveError::EmptyKey(key.to_string()));
        }
        Ok(path)
    }

    /// Compute the staging path and make sure its parent directory exists.
    pub async fn prepare(&self, direction: Direction, key: &str) -> Result<PathBuf, ResolveError> {
        let path = self.staging_path(direction, key)?;
        if let Some(parent) = path.parent() {
            // create_dir_all treats an existing directory as success
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ResolveError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::with_bucket("b:k", "b", "k")]
    #[case::bare_key("k", "sisyphus", "k")]
    #[case::colon_in_key("b:k:extra", "b", "k:extra")]
    #[case::nested_key("data:runs/7/out.txt", "data", "runs/7/out.txt")]
    #[case::empty_key("b:", "b", "")]
    fn parse_splits_on_first_colon(
        #[case] reference: &str,
        #[case] bucket: &str,
        #[case] key: &str,
    ) {
        let parsed = ArtifactRef::parse(reference, "sisyphus");
        assert_eq!(parsed.bucket, bucket);
        assert_eq!(parsed.key, key);
    }

    #[test]
    fn staging_path_keeps_key_directories() {
        let resolver = ArtifactResolver::new("sisyphus", "/tmp/root");
        let path = resolver
            .staging_path(Direction::Outputs, "result/a.txt")
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/root/outputs/result/a.txt"));
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let resolver = ArtifactResolver::new("sisyphus", "staging");
        assert!(resolver.root().is_absolute());
        assert!(resolver.root().ends_with("staging"));

        let path = resolver.staging_path(Direction::Inputs, "k").unwrap();
        assert!(path.is_absolute());
    }

    #[test]
    fn inputs_and_outputs_never_collide() {
        let resolver = ArtifactResolver::new("sisyphus", "/tmp/root");
        let input = resolver.staging_path(Direction::Inputs, "same/key").unwrap();
        let output = resolver.staging_path(Direction::Outputs, "same/key").unwrap();
        assert_ne!(input, output);
    }

    #[rstest]
    #[case::parent("../etc/passwd")]
    #[case::nested_parent("a/../../b")]
    #[case::absolute("/etc/passwd")]
    fn staging_path_rejects_escaping_keys(#[case] key: &str) {
        let resolver = ArtifactResolver::new("sisyphus", "/tmp/root");
        let err = resolver.staging_path(Direction::Inputs, key).unwrap_err();
        assert!(matches!(err, ResolveError::UnsafeKey(_)));
    }

    #[test]
    fn staging_path_rejects_empty_key() {
        let resolver = ArtifactResolver::new("sisyphus", "/tmp/root");
        let err = resolver.staging_path(Direction::Inputs, "").unwrap_err();
        assert!(matches!(err, ResolveError::EmptyKey(_)));
    }

    #[tokio::test]
    async fn prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ArtifactResolver::new("sisyphus", dir.path());

        let first = resolver.prepare(Direction::Inputs, "a/b/c.txt").await.unwrap();
        let second = resolver.prepare(Direction::Inputs, "a/b/c.txt").await.unwrap();

        assert_eq!(first, second);
        assert!(first.parent().unwrap().is_dir());
        assert!(!first.exists());
    }
}
