//! S3 artifact store
//!
//! Writes submission bytes to a bucket and resolves reads into presigned
//! GET URLs with a bounded validity window. The start time is backdated by
//! a small skew allowance so a slightly-ahead client clock cannot see the
//! URL as not-yet-valid.

use super::{content_hash, logical_path, ArtifactStore, ReadLocator, StoredArtifact};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Artifact store backed by an S3 bucket
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    key_prefix: String,
    signed_url_ttl: Duration,
    signed_url_skew: Duration,
}

impl S3ArtifactStore {
    /// Create a store for the given bucket, loading AWS configuration from
    /// the environment
    pub async fn new(
        bucket: String,
        key_prefix: String,
        signed_url_ttl_secs: u64,
        signed_url_skew_secs: u64,
    ) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let client = Client::new(&config);

        Ok(Self {
            client,
            bucket,
            key_prefix,
            signed_url_ttl: Duration::from_secs(signed_url_ttl_secs),
            signed_url_skew: Duration::from_secs(signed_url_skew_secs),
        })
    }

    fn object_key(&self, storage_path: &str) -> String {
        format!("{}/{}", self.key_prefix, storage_path)
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn save_original(
        &self,
        bytes: &[u8],
        extension: &str,
        group_hint: Option<&str>,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<StoredArtifact> {
        let storage_path = logical_path(extension, group_hint, assignment_id, submission_id)?;
        let key = self.object_key(&storage_path);
        let hash = content_hash(bytes);
        let size = bytes.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(bytes.to_vec().into())
            .metadata("sha256", &hash)
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: format!("S3 put failed for {}: {}", key, e),
            })?;

        debug!(bucket = %self.bucket, key = %key, size, "Artifact written to S3");

        Ok(StoredArtifact {
            storage_path,
            content_hash: hash,
            size,
        })
    }

    async fn read_locator(&self, storage_path: &str) -> Result<ReadLocator> {
        let key = self.object_key(storage_path);

        let start_time = SystemTime::now()
            .checked_sub(self.signed_url_skew)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let presigning = PresigningConfig::builder()
            .start_time(start_time)
            .expires_in(self.signed_url_ttl + self.signed_url_skew)
            .build()
            .map_err(|e| AppError::Storage {
                message: format!("Failed to build presigning config: {}", e),
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("S3 presign failed for {}: {}", key, e),
            })?;

        Ok(ReadLocator::SignedUrl(presigned.uri().to_string()))
    }
}
