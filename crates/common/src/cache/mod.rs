//! Relational cache store
//!
//! Generic expiring key/value store backed by the `cache_entries` table.
//! Provides:
//! - Get/set operations with TTL
//! - Coarse invalidation by key prefix
//! - A periodic sweep of expired rows
//!
//! Expiry is always judged against this store's own clock, never the
//! caller's, so clock skew cannot produce false negatives.

use crate::config::CacheConfig;
use crate::db::models::{CacheEntryActiveModel, CacheEntryColumn, CacheEntryEntity};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Cache store over the relational backing table
#[derive(Clone)]
pub struct CacheStore {
    pool: DbPool,
    config: CacheConfig,
}

impl CacheStore {
    /// Create a new cache store
    pub fn new(pool: DbPool, config: CacheConfig) -> Self {
        Self { pool, config }
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Get a value from cache; expired entries read as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);

        let entry = CacheEntryEntity::find_by_id(&full_key)
            .one(self.pool.conn())
            .await?;

        match entry {
            Some(entry) if entry.expires_at > Utc::now() => {
                let parsed =
                    serde_json::from_value(entry.payload).map_err(|e| AppError::CacheError {
                        message: format!("Failed to parse cached value: {}", e),
                    })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            Some(_) => {
                debug!(key = %full_key, "Cache entry expired");
                Ok(None)
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value in cache with the default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, Duration::from_secs(self.config.default_ttl_secs))
            .await
    }

    /// Set a value with a custom TTL, inserting or overwriting the row
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        if ttl.is_zero() {
            return Err(AppError::Validation {
                message: "cache TTL must be positive".to_string(),
                field: Some("ttl".to_string()),
            });
        }

        let full_key = self.key(key);
        let payload = serde_json::to_value(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let now = Utc::now();
        let expires = now
            + chrono::Duration::from_std(ttl).map_err(|e| AppError::CacheError {
                message: format!("Invalid TTL: {}", e),
            })?;

        let entry = CacheEntryActiveModel {
            key: Set(full_key.clone()),
            payload: Set(payload),
            created_at: Set(now.into()),
            expires_at: Set(expires.into()),
        };

        CacheEntryEntity::insert(entry)
            .on_conflict(
                OnConflict::column(CacheEntryColumn::Key)
                    .update_columns([
                        CacheEntryColumn::Payload,
                        CacheEntryColumn::CreatedAt,
                        CacheEntryColumn::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec(self.pool.conn())
            .await?;

        debug!(key = %full_key, ttl_ms = ttl.as_millis() as u64, "Cache set");
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);

        let result = CacheEntryEntity::delete_by_id(&full_key)
            .exec(self.pool.conn())
            .await?;

        debug!(key = %full_key, deleted = result.rows_affected > 0, "Cache delete");
        Ok(result.rows_affected > 0)
    }

    /// Delete every entry under a key prefix, returning the count removed.
    ///
    /// Callers choose prefixes deliberately; an accidental shared prefix
    /// would invalidate unrelated entries.
    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<u64> {
        let full_prefix = self.key(prefix);

        let result = CacheEntryEntity::delete_many()
            .filter(CacheEntryColumn::Key.starts_with(&full_prefix))
            .exec(self.pool.conn())
            .await?;

        debug!(prefix = %full_prefix, removed = result.rows_affected, "Cache prefix delete");
        Ok(result.rows_affected)
    }

    /// Remove expired rows, returning the count removed
    pub async fn sweep_expired(&self) -> Result<u64> {
        let result = CacheEntryEntity::delete_many()
            .filter(CacheEntryColumn::ExpiresAt.lte(Utc::now()))
            .exec(self.pool.conn())
            .await?;

        if result.rows_affected > 0 {
            debug!(removed = result.rows_affected, "Swept expired cache entries");
        }
        Ok(result.rows_affected)
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Prefix shared by all submission listing pages
    pub const SUBMISSION_LIST_PREFIX: &str = "submissions:list";

    /// Build a submission listing page key
    pub fn submission_list(limit: u64, offset: u64) -> String {
        format!("{}:{}:{}", SUBMISSION_LIST_PREFIX, limit, offset)
    }

    /// Build a single-submission cache key
    pub fn submission(id: &str) -> String {
        format!("submissions:one:{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::models::CacheEntry;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn entry(key: &str, expires_in_ms: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: key.to_string(),
            payload: json!(["page"]),
            created_at: now.into(),
            expires_at: (now + chrono::Duration::milliseconds(expires_in_ms)).into(),
        }
    }

    fn store_over(results: Vec<Vec<CacheEntry>>) -> CacheStore {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(results)
            .into_connection();
        CacheStore::new(DbPool::from_connection(conn), AppConfig::default().cache)
    }

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::submission_list(50, 100), "submissions:list:50:100");
        assert!(keys::submission("sub_1").starts_with("submissions:one:"));
        // Listing keys must share the invalidation prefix
        assert!(keys::submission_list(1, 0).starts_with(keys::SUBMISSION_LIST_PREFIX));
        // Single-submission keys must not, or invalidation would remove them
        assert!(!keys::submission("sub_1").starts_with(keys::SUBMISSION_LIST_PREFIX));
    }

    #[tokio::test]
    async fn test_entry_readable_before_ttl_absent_after() {
        // One row with a 100ms TTL, served for both reads. The first read
        // lands at ~50ms and must hit; the second at ~150ms must miss,
        // judged solely by the store's clock against expires_at.
        let row = entry("classdata:listing", 100);
        let store = store_over(vec![vec![row.clone()], vec![row]]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let live: Option<Vec<String>> = store.get("listing").await.unwrap();
        assert_eq!(live, Some(vec!["page".to_string()]));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let expired: Option<Vec<String>> = store.get("listing").await.unwrap();
        assert_eq!(expired, None);
    }

    #[tokio::test]
    async fn test_already_expired_row_reads_as_absent() {
        let store = store_over(vec![vec![entry("classdata:stale", -1_000)]]);

        let got: Option<Vec<String>> = store.get("stale").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = store_over(Vec::new());

        let err = store
            .set_with_ttl("k", &"v", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
