//! Submission entity
//!
//! One row per distinct (assignment, student, content) triple. The triple
//! uniqueness is enforced by a database constraint, not by id generation.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Submission lifecycle status. Only `received` is produced by the
/// ingestion core; `error` and `deleted` are reserved for future use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Received,
    Error,
    Deleted,
}

impl From<String> for SubmissionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "received" => SubmissionStatus::Received,
            "error" => SubmissionStatus::Error,
            "deleted" => SubmissionStatus::Deleted,
            _ => SubmissionStatus::Received,
        }
    }
}

impl From<SubmissionStatus> for String {
    fn from(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Received => "received".to_string(),
            SubmissionStatus::Error => "error".to_string(),
            SubmissionStatus::Deleted => "deleted".to_string(),
        }
    }
}

/// Whether usable text has already been derived from the artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Parsed,
    PendingOcr,
}

impl From<String> for ExtractionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "parsed" => ExtractionStatus::Parsed,
            "pending_ocr" => ExtractionStatus::PendingOcr,
            _ => ExtractionStatus::PendingOcr,
        }
    }
}

impl From<ExtractionStatus> for String {
    fn from(status: ExtractionStatus) -> Self {
        match status {
            ExtractionStatus::Parsed => "parsed".to_string(),
            ExtractionStatus::PendingOcr => "pending_ocr".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    /// Opaque identifier, time-based plus random suffix. Not unique by
    /// construction; the triple constraint is what deduplicates.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub assignment_id: String,

    #[sea_orm(column_type = "Text")]
    pub student_id: String,

    /// Declared content type of the original bytes
    #[sea_orm(column_type = "Text")]
    pub mime: String,

    pub size: i64,

    /// SHA-256 hex digest of the raw bytes
    #[sea_orm(column_type = "Text")]
    pub content_hash: String,

    /// Logical path returned by the artifact store, never an absolute path
    #[sea_orm(column_type = "Text")]
    pub storage_path: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text")]
    pub extraction_status: String,

    pub ocr_required: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub extracted_text: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub correlation_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Generate a candidate submission id: millisecond timestamp plus a
    /// random alphanumeric suffix
    pub fn generate_id() -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        format!("sub_{}_{}", millis, suffix)
    }

    /// Get the lifecycle status as an enum
    pub fn submission_status(&self) -> SubmissionStatus {
        SubmissionStatus::from(self.status.clone())
    }

    /// Get the extraction status as an enum
    pub fn extraction(&self) -> ExtractionStatus {
        ExtractionStatus::from(self.extraction_status.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::submission_event::Entity")]
    Events,
}

impl Related<super::submission_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_shape() {
        let id = Model::generate_id();
        assert!(id.starts_with("sub_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            SubmissionStatus::from(String::from(SubmissionStatus::Received)),
            SubmissionStatus::Received
        );
        assert_eq!(
            ExtractionStatus::from(String::from(ExtractionStatus::PendingOcr)),
            ExtractionStatus::PendingOcr
        );
    }
}
