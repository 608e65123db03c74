//! Local filesystem artifact store

use super::{content_hash, logical_path, validate_component, ArtifactStore, ReadLocator, StoredArtifact};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact store writing under a configured root directory
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| AppError::Storage {
            message: format!("Failed to create storage root {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    /// Resolve a logical path against the root, re-validating every
    /// component so a path read back from the database cannot escape
    fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        for component in storage_path.split('/') {
            validate_component(component, "storage_path")?;
        }

        let resolved = self.root.join(storage_path);
        if !resolved.starts_with(&self.root) {
            return Err(AppError::Validation {
                message: format!("storage path escapes root: {:?}", storage_path),
                field: Some("storage_path".to_string()),
            });
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save_original(
        &self,
        bytes: &[u8],
        extension: &str,
        group_hint: Option<&str>,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<StoredArtifact> {
        let storage_path = logical_path(extension, group_hint, assignment_id, submission_id)?;
        let target = self.root.join(&storage_path);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                })?;
        }

        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to write artifact {}: {}", target.display(), e),
            })?;

        debug!(path = %storage_path, size = bytes.len(), "Artifact written to disk");

        Ok(StoredArtifact {
            storage_path,
            content_hash: content_hash(bytes),
            size: bytes.len() as u64,
        })
    }

    async fn read_locator(&self, storage_path: &str) -> Result<ReadLocator> {
        let resolved = self.resolve(storage_path)?;

        if !resolved.is_file() {
            return Err(AppError::NotFound {
                resource_type: "artifact".to_string(),
                id: storage_path.to_string(),
            });
        }

        Ok(ReadLocator::LocalPath(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_save_and_locate() {
        let (dir, store) = store();

        let saved = store
            .save_original(b"hello", "txt", Some("school-7"), "a1", "sub_1")
            .await
            .unwrap();

        assert_eq!(saved.storage_path, "school-7/a1/sub_1.txt");
        assert_eq!(saved.size, 5);
        assert_eq!(saved.content_hash, content_hash(b"hello"));

        let locator = store.read_locator(&saved.storage_path).await.unwrap();
        match locator {
            ReadLocator::LocalPath(path) => {
                assert!(path.starts_with(dir.path()));
                assert_eq!(std::fs::read(path).unwrap(), b"hello");
            }
            other => panic!("expected a local path, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_traversal_extension_rejected() {
        let (_dir, store) = store();

        let err = store
            .save_original(b"x", "../escape", None, "a1", "sub_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_read_locator_rejects_traversal() {
        let (_dir, store) = store();

        let err = store.read_locator("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let (_dir, store) = store();

        let err = store.read_locator("a1/nope.txt").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
