//! Submission ingestion orchestrator
//!
//! Core logic for accepting a student-submitted artifact: content hashing,
//! the idempotency pre-check, artifact storage, classification, the
//! insert-and-recover race protocol, event appends, and cache
//! invalidation.
//!
//! There is deliberately no in-process locking around the idempotency
//! check. Two concurrent identical uploads may both pass the pre-check and
//! both write artifact bytes; the unique triple index is the only
//! serialization point. Exactly one insert succeeds, the loser re-queries
//! and answers with the winner's row. The loser's stored bytes become an
//! orphan this core does not clean up.

use classdata_common::cache::{keys, CacheStore};
use classdata_common::classify::{classify, is_accepted_mime};
use classdata_common::db::models::{
    EventType, ExtractionStatus, Submission, SubmissionStatus,
};
use classdata_common::db::SubmissionStore;
use classdata_common::errors::{AppError, Result};
use classdata_common::storage::{content_hash, ArtifactStore};
use classdata_common::{metrics, MAX_ARTIFACT_BYTES};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Exactly one content source per submission
#[derive(Debug, Clone)]
pub enum SubmissionContent {
    Binary {
        bytes: Vec<u8>,
        mime: String,
        file_name: String,
    },
    Text(String),
}

/// A validated-at-the-edge ingestion request
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub assignment_id: String,
    pub student_id: String,
    pub content: SubmissionContent,
    pub group_hint: Option<String>,
    pub correlation_id: Option<String>,
}

/// Result of one ingestion call
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub extraction_status: ExtractionStatus,
    pub ocr_required: bool,
    /// True when the caller's content matched an existing row and no new
    /// submission was created
    pub deduplicated: bool,
}

impl IngestOutcome {
    fn from_existing(submission: &Submission, deduplicated: bool) -> Self {
        Self {
            submission_id: submission.id.clone(),
            status: submission.submission_status(),
            extraction_status: submission.extraction(),
            ocr_required: submission.ocr_required,
            deduplicated,
        }
    }
}

/// Submission ingestion orchestrator
///
/// All collaborators are injected; nothing here reaches for ambient state.
pub struct SubmissionProcessor<S: SubmissionStore> {
    store: S,
    artifacts: Arc<dyn ArtifactStore>,
    cache: Option<CacheStore>,
}

impl<S: SubmissionStore> SubmissionProcessor<S> {
    pub fn new(store: S, artifacts: Arc<dyn ArtifactStore>, cache: Option<CacheStore>) -> Self {
        Self {
            store,
            artifacts,
            cache,
        }
    }

    /// Ingest one submission, returning the persisted outcome.
    ///
    /// Identical content for the same (assignment, student) pair always
    /// resolves to the same submission id, whether the duplicate is caught
    /// by the pre-check or by the unique index under concurrency.
    #[instrument(skip(self, request), fields(assignment_id = %request.assignment_id, student_id = %request.student_id))]
    pub async fn ingest(&self, request: NewSubmission) -> Result<IngestOutcome> {
        let started = Instant::now();

        let (bytes, mime, extension) = validate(&request)?;

        // Step 1: the content hash is the third column of the idempotency key
        let hash = content_hash(&bytes);

        // Step 2: idempotency pre-check. A hit short-circuits everything:
        // no artifact write, no event, no cache invalidation.
        if let Some(existing) = self
            .store
            .find_by_triple(&request.assignment_id, &request.student_id, &hash)
            .await?
        {
            info!(submission_id = %existing.id, "Duplicate content, returning existing submission");
            metrics::record_ingest(started, true);
            return Ok(IngestOutcome::from_existing(&existing, true));
        }

        // Step 3: persist bytes, classify, build the candidate row
        let submission_id = Submission::generate_id();

        let saved = self
            .artifacts
            .save_original(
                &bytes,
                &extension,
                request.group_hint.as_deref(),
                &request.assignment_id,
                &submission_id,
            )
            .await?;

        let classification = classify(&mime, &bytes);
        let now = chrono::Utc::now();

        let candidate = Submission {
            id: submission_id,
            assignment_id: request.assignment_id.clone(),
            student_id: request.student_id.clone(),
            mime: mime.clone(),
            size: saved.size as i64,
            content_hash: saved.content_hash,
            storage_path: saved.storage_path,
            status: String::from(SubmissionStatus::Received),
            extraction_status: String::from(classification.extraction_status),
            ocr_required: classification.ocr_required,
            extracted_text: classification.extracted_text,
            correlation_id: request.correlation_id.clone(),
            created_at: now.into(),
            updated_at: now.into(),
        };

        // Step 4: insert, with the unique index as the serialization point
        let inserted = match self.store.insert_submission(candidate).await {
            Ok(model) => model,
            Err(err) if err.is_duplicate() => {
                // A concurrent identical upload won the race. Defer to the
                // winner; our already-written bytes are orphaned.
                let winner = self
                    .store
                    .find_by_triple(&request.assignment_id, &request.student_id, &hash)
                    .await?
                    .ok_or_else(|| AppError::Internal {
                        message: "winning submission not found after unique conflict".to_string(),
                    })?;

                warn!(
                    submission_id = %winner.id,
                    "Lost insert race to concurrent identical upload, deferring to winner"
                );
                metrics::record_ingest(started, true);
                return Ok(IngestOutcome::from_existing(&winner, true));
            }
            Err(err) => return Err(err),
        };

        // Step 5: event trail and cache invalidation. The `created` event
        // always precedes the classification event.
        self.store
            .append_event(
                &inserted.id,
                EventType::Created,
                json!({
                    "assignment_id": inserted.assignment_id,
                    "student_id": inserted.student_id,
                    "mime": inserted.mime,
                    "size": inserted.size,
                    "content_hash": inserted.content_hash,
                }),
                request.correlation_id.clone(),
            )
            .await?;

        self.invalidate_listings().await;

        match inserted.extraction() {
            ExtractionStatus::Parsed => {
                self.store
                    .append_event(
                        &inserted.id,
                        EventType::Parsed,
                        json!({ "source": "classifier" }),
                        request.correlation_id.clone(),
                    )
                    .await?;
            }
            ExtractionStatus::PendingOcr if inserted.ocr_required => {
                self.store
                    .append_event(
                        &inserted.id,
                        EventType::OcrPending,
                        json!({ "source": "classifier" }),
                        request.correlation_id.clone(),
                    )
                    .await?;
            }
            ExtractionStatus::PendingOcr => {}
        }

        info!(
            submission_id = %inserted.id,
            extraction_status = %inserted.extraction_status,
            size = inserted.size,
            "Submission ingested"
        );
        metrics::record_ingest(started, false);

        Ok(IngestOutcome::from_existing(&inserted, false))
    }

    /// Invalidate cached listing pages. Best-effort: a cache failure must
    /// not fail an ingestion that already persisted.
    async fn invalidate_listings(&self) {
        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.delete_by_prefix(keys::SUBMISSION_LIST_PREFIX).await {
                warn!(error = %e, "Failed to invalidate listing cache, continuing");
            }
        }
    }
}

/// Validate the request and normalize its content source into
/// (bytes, mime, file extension)
fn validate(request: &NewSubmission) -> Result<(Vec<u8>, String, String)> {
    if request.assignment_id.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "assignment_id".to_string(),
        });
    }
    if request.student_id.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "student_id".to_string(),
        });
    }

    let (bytes, mime, extension) = match &request.content {
        SubmissionContent::Text(text) => {
            if text.is_empty() {
                return Err(AppError::Validation {
                    message: "text content must not be empty".to_string(),
                    field: Some("text".to_string()),
                });
            }
            (
                text.clone().into_bytes(),
                "text/plain".to_string(),
                "txt".to_string(),
            )
        }
        SubmissionContent::Binary {
            bytes,
            mime,
            file_name,
        } => {
            if bytes.is_empty() {
                return Err(AppError::Validation {
                    message: "file content must not be empty".to_string(),
                    field: Some("file".to_string()),
                });
            }
            if !is_accepted_mime(mime) {
                return Err(AppError::UnsupportedMedia { mime: mime.clone() });
            }
            let extension = file_name
                .rsplit('.')
                .next()
                .filter(|ext| !ext.is_empty() && *ext != file_name.as_str())
                .unwrap_or("bin")
                .to_lowercase();
            (bytes.clone(), mime.clone(), extension)
        }
    };

    // Checked here defensively even when an earlier layer already enforced it
    if bytes.len() > MAX_ARTIFACT_BYTES {
        return Err(AppError::PayloadTooLarge {
            size: bytes.len(),
            limit: MAX_ARTIFACT_BYTES,
        });
    }

    Ok((bytes, mime, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use classdata_common::db::models::SubmissionEvent;
    use classdata_common::storage::LocalArtifactStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store standing in for the repository. Can be armed to
    /// fail the next insert with a unique conflict, simulating a
    /// concurrent identical upload winning the race between the pre-check
    /// and the insert.
    #[derive(Default)]
    struct MockStore {
        rows: Mutex<Vec<Submission>>,
        events: Mutex<Vec<SubmissionEvent>>,
        conflict_armed: AtomicBool,
        race_winner: Mutex<Option<Submission>>,
    }

    impl MockStore {
        fn arm_conflict(&self, winner: Submission) {
            self.conflict_armed.store(true, Ordering::SeqCst);
            *self.race_winner.lock().unwrap() = Some(winner);
        }

        fn events_for(&self, submission_id: &str) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.submission_id == submission_id)
                .map(|e| e.event_type.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SubmissionStore for MockStore {
        async fn find_by_triple(
            &self,
            assignment_id: &str,
            student_id: &str,
            content_hash: &str,
        ) -> Result<Option<Submission>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|s| {
                    s.assignment_id == assignment_id
                        && s.student_id == student_id
                        && s.content_hash == content_hash
                })
                .min_by_key(|s| s.created_at)
                .cloned())
        }

        async fn insert_submission(&self, submission: Submission) -> Result<Submission> {
            if self.conflict_armed.swap(false, Ordering::SeqCst) {
                // The concurrent winner lands first, then our insert
                // violates the unique index.
                let winner = self.race_winner.lock().unwrap().take().unwrap();
                self.rows.lock().unwrap().push(winner);
                return Err(AppError::Duplicate {
                    message: "submission triple already exists".to_string(),
                });
            }

            let mut rows = self.rows.lock().unwrap();
            let duplicate = rows.iter().any(|s| {
                s.assignment_id == submission.assignment_id
                    && s.student_id == submission.student_id
                    && s.content_hash == submission.content_hash
            });
            if duplicate {
                return Err(AppError::Duplicate {
                    message: "submission triple already exists".to_string(),
                });
            }
            rows.push(submission.clone());
            Ok(submission)
        }

        async fn append_event(
            &self,
            submission_id: &str,
            event_type: EventType,
            payload: serde_json::Value,
            correlation_id: Option<String>,
        ) -> Result<SubmissionEvent> {
            let mut events = self.events.lock().unwrap();
            let event = SubmissionEvent {
                event_id: events.len() as i64 + 1,
                submission_id: submission_id.to_string(),
                event_type: String::from(event_type),
                payload,
                correlation_id,
                created_at: chrono::Utc::now().into(),
            };
            events.push(event.clone());
            Ok(event)
        }
    }

    fn processor(store: MockStore) -> (TempDir, SubmissionProcessor<MockStore>) {
        let dir = TempDir::new().unwrap();
        let artifacts = Arc::new(LocalArtifactStore::new(dir.path()).unwrap());
        (dir, SubmissionProcessor::new(store, artifacts, None))
    }

    fn text_request(text: &str) -> NewSubmission {
        NewSubmission {
            assignment_id: "a1".to_string(),
            student_id: "s1".to_string(),
            content: SubmissionContent::Text(text.to_string()),
            group_hint: None,
            correlation_id: Some("corr-1".to_string()),
        }
    }

    fn binary_request(bytes: Vec<u8>, mime: &str, file_name: &str) -> NewSubmission {
        NewSubmission {
            assignment_id: "a1".to_string(),
            student_id: "s1".to_string(),
            content: SubmissionContent::Binary {
                bytes,
                mime: mime.to_string(),
                file_name: file_name.to_string(),
            },
            group_hint: None,
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn test_plain_text_scenario() {
        let (_dir, processor) = processor(MockStore::default());

        let outcome = processor.ingest(text_request("hello")).await.unwrap();

        assert_eq!(outcome.status, SubmissionStatus::Received);
        assert_eq!(outcome.extraction_status, ExtractionStatus::Parsed);
        assert!(!outcome.ocr_required);
        assert!(!outcome.deduplicated);
    }

    #[tokio::test]
    async fn test_idempotence_same_id_single_created_event() {
        let (_dir, processor) = processor(MockStore::default());

        let first = processor.ingest(text_request("hello")).await.unwrap();
        let second = processor.ingest(text_request("hello")).await.unwrap();

        assert_eq!(first.submission_id, second.submission_id);
        assert!(!first.deduplicated);
        assert!(second.deduplicated);

        assert_eq!(processor.store.rows.lock().unwrap().len(), 1);
        let created: Vec<_> = processor
            .store
            .events_for(&first.submission_id)
            .into_iter()
            .filter(|t| t == "created")
            .collect();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_different_content_creates_new_row() {
        let (_dir, processor) = processor(MockStore::default());

        let first = processor.ingest(text_request("hello")).await.unwrap();
        let second = processor.ingest(text_request("goodbye")).await.unwrap();

        assert_ne!(first.submission_id, second.submission_id);
        assert_eq!(processor.store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_size_boundary() {
        let (_dir, processor) = processor(MockStore::default());

        let at_limit = binary_request(vec![0u8; MAX_ARTIFACT_BYTES], "application/pdf", "big.pdf");
        assert!(processor.ingest(at_limit).await.is_ok());

        let over_limit = binary_request(
            vec![0u8; MAX_ARTIFACT_BYTES + 1],
            "application/pdf",
            "too-big.pdf",
        );
        let err = processor.ingest(over_limit).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_image_upload_goes_to_ocr() {
        let (_dir, processor) = processor(MockStore::default());

        let outcome = processor
            .ingest(binary_request(vec![0xFF, 0xD8, 0xFF], "image/jpeg", "scan.jpg"))
            .await
            .unwrap();

        assert_eq!(outcome.extraction_status, ExtractionStatus::PendingOcr);
        assert!(outcome.ocr_required);

        // `created` always precedes the classification event
        let events = processor.store.events_for(&outcome.submission_id);
        assert_eq!(events, vec!["created".to_string(), "ocr_pending".to_string()]);
    }

    #[tokio::test]
    async fn test_parsed_event_follows_created() {
        let (_dir, processor) = processor(MockStore::default());

        let outcome = processor.ingest(text_request("essay body")).await.unwrap();

        let events = processor.store.events_for(&outcome.submission_id);
        assert_eq!(events, vec!["created".to_string(), "parsed".to_string()]);
    }

    #[tokio::test]
    async fn test_race_loser_defers_to_winner() {
        let store = MockStore::default();

        let hash = content_hash(b"hello");
        let now = chrono::Utc::now();
        let winner = Submission {
            id: "sub_winner".to_string(),
            assignment_id: "a1".to_string(),
            student_id: "s1".to_string(),
            mime: "text/plain".to_string(),
            size: 5,
            content_hash: hash,
            storage_path: "a1/sub_winner.txt".to_string(),
            status: String::from(SubmissionStatus::Received),
            extraction_status: String::from(ExtractionStatus::Parsed),
            ocr_required: false,
            extracted_text: Some("stub".to_string()),
            correlation_id: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        store.arm_conflict(winner);

        let (_dir, processor) = processor(store);

        let outcome = processor.ingest(text_request("hello")).await.unwrap();

        // The caller sees the winner's row as its own successful outcome
        assert_eq!(outcome.submission_id, "sub_winner");
        assert!(outcome.deduplicated);
        assert_eq!(outcome.status, SubmissionStatus::Received);

        // The loser appended nothing
        assert_eq!(processor.store.rows.lock().unwrap().len(), 1);
        assert!(processor.store.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_fields() {
        let (_dir, processor) = processor(MockStore::default());

        let mut request = text_request("hello");
        request.assignment_id = "  ".to_string();
        let err = processor.ingest(request).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "assignment_id"));

        let mut request = text_request("hello");
        request.student_id = String::new();
        let err = processor.ingest(request).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "student_id"));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (_dir, processor) = processor(MockStore::default());

        let err = processor.ingest(text_request("")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = processor
            .ingest(binary_request(Vec::new(), "application/pdf", "empty.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_mime_rejected_before_storage() {
        let (dir, processor) = processor(MockStore::default());

        let err = processor
            .ingest(binary_request(vec![1, 2, 3], "video/mp4", "clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMedia { .. }));

        // Rejected before any side effect
        assert!(processor.store.rows.lock().unwrap().is_empty());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_skips_artifact_write() {
        let (dir, processor) = processor(MockStore::default());

        processor.ingest(text_request("hello")).await.unwrap();
        let count_files = |root: &std::path::Path| {
            walk(root).len()
        };
        let before = count_files(dir.path());

        processor.ingest(text_request("hello")).await.unwrap();
        assert_eq!(count_files(dir.path()), before);
    }

    fn walk(root: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    files.extend(walk(&path));
                } else {
                    files.push(path);
                }
            }
        }
        files
    }
}
