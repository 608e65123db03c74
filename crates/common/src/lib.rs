//! ClassData Common Library
//!
//! Shared code for the ClassData services including:
//! - Database models and repository patterns
//! - Artifact storage abstraction (local disk, S3)
//! - Content classification for uploaded artifacts
//! - Relational cache store with TTL semantics
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod cache;
pub mod classify;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{Repository, SubmissionStore};
pub use errors::{AppError, Result};
pub use storage::{ArtifactStore, ReadLocator, StoredArtifact};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum accepted artifact size in bytes (10 MiB)
pub const MAX_ARTIFACT_BYTES: usize = 10_485_760;
