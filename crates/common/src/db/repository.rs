//! Repository pattern for database operations
//!
//! Provides a clean interface for submission and event persistence. The
//! unique index over (assignment_id, student_id, content_hash) is the
//! serialization point for concurrent duplicate uploads; a violation is
//! surfaced as `AppError::Duplicate` so the orchestrator can recover.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};

/// One page of submissions plus the total row count
#[derive(Debug, Clone)]
pub struct SubmissionPage {
    pub items: Vec<Submission>,
    pub total: u64,
}

/// Persistence operations the ingestion orchestrator depends on.
///
/// The repository is the production implementation; tests substitute an
/// in-memory store.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Find a submission by its idempotency triple
    async fn find_by_triple(
        &self,
        assignment_id: &str,
        student_id: &str,
        content_hash: &str,
    ) -> Result<Option<Submission>>;

    /// Insert a submission row. A unique-triple violation returns
    /// `AppError::Duplicate`, distinguishable from all other failures.
    async fn insert_submission(&self, submission: Submission) -> Result<Submission>;

    /// Append an immutable lifecycle event
    async fn append_event(
        &self,
        submission_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<SubmissionEvent>;
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Submission Operations
    // ========================================================================

    /// Find submission by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Submission>> {
        SubmissionEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List submissions, newest first.
    ///
    /// `limit` must already be clamped to [1, 200] by the caller.
    pub async fn list(&self, limit: u64, offset: u64) -> Result<SubmissionPage> {
        let total = SubmissionEntity::find().count(self.conn()).await?;

        let items = SubmissionEntity::find()
            .order_by_desc(SubmissionColumn::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.conn())
            .await?;

        Ok(SubmissionPage { items, total })
    }

    // ========================================================================
    // Event Log Operations
    // ========================================================================

    /// Get the event trail for a submission, ordered by created_at with
    /// ties broken by event_id
    pub async fn events_for_submission(&self, submission_id: &str) -> Result<Vec<SubmissionEvent>> {
        SubmissionEventEntity::find()
            .filter(SubmissionEventColumn::SubmissionId.eq(submission_id))
            .order_by_asc(SubmissionEventColumn::CreatedAt)
            .order_by_asc(SubmissionEventColumn::EventId)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl SubmissionStore for Repository {
    async fn find_by_triple(
        &self,
        assignment_id: &str,
        student_id: &str,
        content_hash: &str,
    ) -> Result<Option<Submission>> {
        // Ordered by earliest created_at: more than one row cannot happen
        // under the unique index, but the query stays defensive.
        SubmissionEntity::find()
            .filter(SubmissionColumn::AssignmentId.eq(assignment_id))
            .filter(SubmissionColumn::StudentId.eq(student_id))
            .filter(SubmissionColumn::ContentHash.eq(content_hash))
            .order_by_asc(SubmissionColumn::CreatedAt)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
        let active = SubmissionActiveModel {
            id: Set(submission.id),
            assignment_id: Set(submission.assignment_id),
            student_id: Set(submission.student_id),
            mime: Set(submission.mime),
            size: Set(submission.size),
            content_hash: Set(submission.content_hash),
            storage_path: Set(submission.storage_path),
            status: Set(submission.status),
            extraction_status: Set(submission.extraction_status),
            ocr_required: Set(submission.ocr_required),
            extracted_text: Set(submission.extracted_text),
            correlation_id: Set(submission.correlation_id),
            created_at: Set(submission.created_at),
            updated_at: Set(submission.updated_at),
        };

        match active.insert(self.conn()).await {
            Ok(model) => Ok(model),
            Err(err) => {
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(AppError::Duplicate {
                        message: "submission triple already exists".to_string(),
                    })
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn append_event(
        &self,
        submission_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<SubmissionEvent> {
        if !event_type.is_emittable() {
            return Err(AppError::Validation {
                message: format!(
                    "event type '{}' is legacy and must not be emitted",
                    String::from(event_type)
                ),
                field: Some("event_type".to_string()),
            });
        }

        let now = chrono::Utc::now();

        let event = SubmissionEventActiveModel {
            submission_id: Set(submission_id.to_string()),
            event_type: Set(String::from(event_type)),
            payload: Set(payload),
            correlation_id: Set(correlation_id),
            created_at: Set(now.into()),
            ..Default::default()
        };

        event.insert(self.conn()).await.map_err(Into::into)
    }
}
