pub mod m20250801_000001_create_submissions;
pub mod m20250801_000002_create_submission_events;
pub mod m20250801_000003_create_cache_entries;
