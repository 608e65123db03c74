//! Artifact storage abstraction
//!
//! Persists raw submission bytes and hands back a logical storage path and
//! a read locator. Two interchangeable backends implement the same
//! contract:
//! - Local filesystem (resolved paths, guaranteed inside the storage root)
//! - S3 (time-limited presigned read URLs)
//!
//! Storage never touches the database; the metadata record and the bytes
//! live in separate systems that are not transactionally linked.

mod local;
mod s3;

pub use local::LocalArtifactStore;
pub use s3::S3ArtifactStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of a successful artifact write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Logical path, relative to the backend root; this is what gets
    /// persisted, never an absolute filesystem path
    pub storage_path: String,
    /// SHA-256 hex digest of the bytes as written
    pub content_hash: String,
    pub size: u64,
}

/// How a stored artifact can be read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLocator {
    /// Resolved filesystem path inside the local storage root
    LocalPath(PathBuf),
    /// Read-only URL valid for a bounded window
    SignedUrl(String),
}

/// Trait for artifact storage backends
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the original bytes of a submission.
    ///
    /// Any caller-supplied path component containing traversal sequences
    /// fails with a validation error; nothing is silently sanitized.
    async fn save_original(
        &self,
        bytes: &[u8],
        extension: &str,
        group_hint: Option<&str>,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<StoredArtifact>;

    /// Resolve a logical storage path into something readable
    async fn read_locator(&self, storage_path: &str) -> Result<ReadLocator>;
}

/// Construct the configured artifact store backend
pub async fn create_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalArtifactStore::new(&config.local_root)?)),
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "storage.s3_bucket is required for the s3 backend".to_string(),
                })?;
            Ok(Arc::new(
                S3ArtifactStore::new(
                    bucket,
                    config.s3_key_prefix.clone(),
                    config.signed_url_ttl_secs,
                    config.signed_url_skew_secs,
                )
                .await?,
            ))
        }
    }
}

/// SHA-256 hex digest of raw bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reject path components that could escape the storage root
pub(crate) fn validate_component(value: &str, field: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');

    if invalid {
        return Err(AppError::Validation {
            message: format!("invalid path component in {}: {:?}", field, value),
            field: Some(field.to_string()),
        });
    }
    Ok(())
}

/// Build the logical storage path shared by every backend
pub(crate) fn logical_path(
    extension: &str,
    group_hint: Option<&str>,
    assignment_id: &str,
    submission_id: &str,
) -> Result<String> {
    validate_component(extension, "extension")?;
    validate_component(assignment_id, "assignment_id")?;
    validate_component(submission_id, "submission_id")?;

    let file_name = format!("{}.{}", submission_id, extension);

    match group_hint {
        Some(group) => {
            validate_component(group, "group_hint")?;
            Ok(format!("{}/{}/{}", group, assignment_id, file_name))
        }
        None => Ok(format!("{}/{}", assignment_id, file_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_vector() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_logical_path_with_and_without_group() {
        assert_eq!(
            logical_path("pdf", Some("school-7"), "a1", "sub_1").unwrap(),
            "school-7/a1/sub_1.pdf"
        );
        assert_eq!(logical_path("txt", None, "a1", "sub_1").unwrap(), "a1/sub_1.txt");
    }

    #[test]
    fn test_traversal_components_rejected() {
        assert!(logical_path("../../etc/passwd", None, "a1", "s1").is_err());
        assert!(logical_path("pdf", Some("../up"), "a1", "s1").is_err());
        assert!(logical_path("pdf", None, "a/1", "s1").is_err());
        assert!(logical_path("pdf", None, "a1", "s\\1").is_err());
        assert!(logical_path("", None, "a1", "s1").is_err());
    }
}
