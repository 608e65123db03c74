//! Health probes
//!
//! Liveness reports service identity; readiness exercises the database and
//! names the active storage backend so an operator can tell which artifact
//! path a ready instance will take.

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use classdata_common::config::StorageBackend;
use serde::Serialize;

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub storage_backend: StorageBackend,
    pub database: DependencyCheck,
}

#[derive(Serialize)]
pub struct DependencyCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe: the process is up and serving
pub async fn health(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        service: state.config.observability.service_name.clone(),
        version: classdata_common::VERSION,
    })
}

/// Readiness probe: 503 until the database answers
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let started = std::time::Instant::now();

    let database = match state.db.ping().await {
        Ok(_) => DependencyCheck {
            ok: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => DependencyCheck {
            ok: false,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let ready = database.ok;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            storage_backend: state.config.storage.backend,
            database,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_body_shape() {
        let body = ReadinessResponse {
            ready: false,
            storage_backend: StorageBackend::S3,
            database: DependencyCheck {
                ok: false,
                latency_ms: None,
                error: Some("connection refused".to_string()),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ready"], false);
        assert_eq!(json["storage_backend"], "s3");
        assert_eq!(json["database"]["error"], "connection refused");
        // Absent measurements are omitted, not null
        assert!(json["database"].get("latency_ms").is_none());
    }
}
