//! Submission handlers
//!
//! Thin adapters between the wire and the ingestion orchestrator: the
//! endpoint accepts either a multipart upload (binary content) or a JSON
//! body (plain-text content), never both.

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cursor;
use crate::ingest::{IngestOutcome, NewSubmission, SubmissionContent};
use crate::AppState;
use classdata_common::{
    cache::keys,
    db::models::{ExtractionStatus, Submission, SubmissionEvent, SubmissionStatus},
    errors::{AppError, Result},
    storage::ReadLocator,
};

/// JSON request body for plain-text submissions
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTextSubmissionRequest {
    #[validate(length(min = 1, max = 255))]
    pub assignment_id: String,

    #[validate(length(min = 1, max = 255))]
    pub student_id: String,

    pub text: Option<String>,

    #[serde(default)]
    pub group_hint: Option<String>,
}

/// Response after creating (or deduplicating) a submission
#[derive(Serialize)]
pub struct CreateSubmissionResponse {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub extraction_status: ExtractionStatus,
    pub ocr_required: bool,
}

impl From<&IngestOutcome> for CreateSubmissionResponse {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            submission_id: outcome.submission_id.clone(),
            status: outcome.status,
            extraction_status: outcome.extraction_status,
            ocr_required: outcome.ocr_required,
        }
    }
}

/// Full submission representation for read paths
#[derive(Serialize, Deserialize, Clone)]
pub struct SubmissionResponse {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub mime: String,
    pub size: i64,
    pub content_hash: String,
    pub status: SubmissionStatus,
    pub extraction_status: ExtractionStatus,
    pub ocr_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Submission> for SubmissionResponse {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id.clone(),
            assignment_id: submission.assignment_id.clone(),
            student_id: submission.student_id.clone(),
            mime: submission.mime.clone(),
            size: submission.size,
            content_hash: submission.content_hash.clone(),
            status: submission.submission_status(),
            extraction_status: submission.extraction(),
            ocr_required: submission.ocr_required,
            extracted_text: submission.extracted_text.clone(),
            correlation_id: submission.correlation_id.clone(),
            created_at: submission.created_at.to_rfc3339(),
            updated_at: submission.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub cursor: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct ListSubmissionsResponse {
    pub items: Vec<SubmissionResponse>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub event_id: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub created_at: String,
}

impl From<&SubmissionEvent> for EventResponse {
    fn from(event: &SubmissionEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            correlation_id: event.correlation_id.clone(),
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

/// Ingest a submission.
///
/// 201 for a newly created row, 200 when identical content for the same
/// (assignment, student) pair already exists.
pub async fn create_submission(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<CreateSubmissionResponse>)> {
    let correlation_id = correlation_id_from(request.headers());
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let new_submission = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidFormat {
                message: format!("invalid multipart body: {}", e),
            })?;
        parse_multipart(multipart, correlation_id).await?
    } else {
        let Json(body): Json<CreateTextSubmissionRequest> = Json::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidFormat {
                message: format!("invalid JSON body: {}", e),
            })?;
        body.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: None,
        })?;

        let text = body.text.ok_or_else(|| AppError::Validation {
            message: "either a file upload or a text body is required".to_string(),
            field: Some("text".to_string()),
        })?;

        NewSubmission {
            assignment_id: body.assignment_id,
            student_id: body.student_id,
            content: SubmissionContent::Text(text),
            group_hint: body.group_hint,
            correlation_id,
        }
    };

    let outcome = state.processor.ingest(new_submission).await?;

    let status = if outcome.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(CreateSubmissionResponse::from(&outcome))))
}

/// List submissions, newest first, with opaque cursor pagination
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListSubmissionsResponse>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = cursor::decode_cursor(params.cursor.as_deref());

    let cache_key = keys::submission_list(limit, offset);
    if let Ok(Some(cached)) = state.cache.get::<ListSubmissionsResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let page = state.repo.list(limit, offset).await?;

    let next_cursor = cursor::next_cursor(offset, limit, page.total);

    let response = ListSubmissionsResponse {
        items: page.items.iter().map(SubmissionResponse::from).collect(),
        total: page.total,
        next_cursor,
    };

    if let Err(e) = state.cache.set(&cache_key, &response).await {
        tracing::warn!(error = %e, "Failed to cache listing page, continuing");
    }

    Ok(Json(response))
}

/// Get a submission by ID
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionResponse>> {
    let submission = state
        .repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::SubmissionNotFound { id })?;

    Ok(Json(SubmissionResponse::from(&submission)))
}

/// Get the lifecycle event trail for a submission
pub async fn get_submission_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventResponse>>> {
    state
        .repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::SubmissionNotFound { id: id.clone() })?;

    let events = state.repo.events_for_submission(&id).await?;

    Ok(Json(events.iter().map(EventResponse::from).collect()))
}

/// Retrieve the original artifact bytes.
///
/// S3 backend: redirect to a time-limited signed URL. Local backend:
/// stream the bytes directly.
pub async fn get_submission_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let submission = state
        .repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::SubmissionNotFound { id })?;

    match state.storage.read_locator(&submission.storage_path).await? {
        ReadLocator::SignedUrl(url) => Ok(Redirect::temporary(&url).into_response()),
        ReadLocator::LocalPath(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| AppError::Storage {
                message: format!("Failed to read artifact {}: {}", path.display(), e),
            })?;
            Ok(([(header::CONTENT_TYPE, submission.mime)], bytes).into_response())
        }
    }
}

/// Correlation id echoed from the request; generated upstream by the
/// request-id middleware when absent
fn correlation_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Pull the ingestion fields out of a multipart body
async fn parse_multipart(
    mut multipart: Multipart,
    correlation_id: Option<String>,
) -> Result<NewSubmission> {
    let mut assignment_id = String::new();
    let mut student_id = String::new();
    let mut group_hint = None;
    let mut text: Option<String> = None;
    let mut file: Option<(Vec<u8>, String, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidFormat {
            message: format!("invalid multipart field: {}", e),
        })?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "assignment_id" => assignment_id = read_text_field(field).await?,
            "student_id" => student_id = read_text_field(field).await?,
            "group_hint" => group_hint = Some(read_text_field(field).await?),
            "text" => text = Some(read_text_field(field).await?),
            "file" => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::InvalidFormat {
                    message: format!("failed to read file field: {}", e),
                })?;
                file = Some((bytes.to_vec(), mime, file_name));
            }
            _ => {}
        }
    }

    let content = match (file, text) {
        (Some((bytes, mime, file_name)), None) => SubmissionContent::Binary {
            bytes,
            mime,
            file_name,
        },
        (None, Some(text)) => SubmissionContent::Text(text),
        (Some(_), Some(_)) => {
            return Err(AppError::Validation {
                message: "exactly one content source is allowed: file or text".to_string(),
                field: None,
            })
        }
        (None, None) => {
            return Err(AppError::Validation {
                message: "either a file upload or a text body is required".to_string(),
                field: None,
            })
        }
    };

    Ok(NewSubmission {
        assignment_id,
        student_id,
        content,
        group_hint,
        correlation_id,
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field.text().await.map_err(|e| AppError::InvalidFormat {
        message: format!("failed to read field: {}", e),
    })
}
