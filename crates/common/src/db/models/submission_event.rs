//! Submission lifecycle event entity
//!
//! Append-only: events are immutable once written and are only removed by
//! cascade when the owning submission is deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Event type vocabulary.
///
/// `OcrQueued` is a legacy value tolerated when reading historical rows;
/// new code must never emit it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Updated,
    Parsed,
    OcrPending,
    OcrQueued,
}

impl EventType {
    /// Whether this value may still be written by new code
    pub fn is_emittable(&self) -> bool {
        !matches!(self, EventType::OcrQueued)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => EventType::Created,
            "updated" => EventType::Updated,
            "parsed" => EventType::Parsed,
            "ocr_pending" => EventType::OcrPending,
            "ocr_queued" => EventType::OcrQueued,
            _ => EventType::Created,
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Created => "created".to_string(),
            EventType::Updated => "updated".to_string(),
            EventType::Parsed => "parsed".to_string(),
            EventType::OcrPending => "ocr_pending".to_string(),
            EventType::OcrQueued => "ocr_queued".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub event_id: i64,

    #[sea_orm(column_type = "Text")]
    pub submission_id: String,

    #[sea_orm(column_type = "Text")]
    pub event_type: String,

    /// Opaque structured data describing the event
    pub payload: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub correlation_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the event type as an enum
    pub fn kind(&self) -> EventType {
        EventType::from(self.event_type.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::submission::Entity",
        from = "Column::SubmissionId",
        to = "super::submission::Column::Id",
        on_delete = "Cascade"
    )]
    Submission,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_value_is_readable_but_not_emittable() {
        let legacy = EventType::from("ocr_queued".to_string());
        assert_eq!(legacy, EventType::OcrQueued);
        assert!(!legacy.is_emittable());
        assert!(EventType::Created.is_emittable());
    }
}
