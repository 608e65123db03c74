//! SeaORM entity models
//!
//! Database entities for the submission ingestion core

mod cache_entry;
mod submission;
mod submission_event;

pub use submission::{
    ActiveModel as SubmissionActiveModel, Column as SubmissionColumn, Entity as SubmissionEntity,
    ExtractionStatus, Model as Submission, SubmissionStatus,
};

pub use submission_event::{
    ActiveModel as SubmissionEventActiveModel, Column as SubmissionEventColumn,
    Entity as SubmissionEventEntity, EventType, Model as SubmissionEvent,
};

pub use cache_entry::{
    ActiveModel as CacheEntryActiveModel, Column as CacheEntryColumn, Entity as CacheEntryEntity,
    Model as CacheEntry,
};
