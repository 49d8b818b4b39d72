use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::parse_body;
use crate::error::Result;
use crate::pipeline::{IngestOutcome, IngestSource};
use crate::server::state::AppState;

/// Summary returned for every ingested batch
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub total: usize,
    pub successful: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /events - Ingest an Alertmanager webhook or a native event.
pub async fn handler(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let body: serde_json::Value = parse_body(&body)?;
    let ingestor = state.ingestor.clone();
    let outcome = state
        .run_publish(move |ctx| async move { ingestor.ingest(&ctx, body).await })
        .await?;
    Ok(summarize(outcome))
}

/// Map a batch outcome to its status and summary body
pub fn summarize(outcome: IngestOutcome) -> Response {
    let report = outcome.report;
    let (total, successful) = (report.total, report.successful);

    if total > 0 && successful == 0 {
        let response = IngestResponse {
            message: format!("Failed to publish {} event(s)", total),
            total,
            successful,
            failed: Some(report.failed()),
            error: report.error.map(|e| e.to_string()),
        };
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
    }

    if successful < total || report.error.is_some() {
        let response = IngestResponse {
            message: format!("Published {} of {} event(s)", successful, total),
            total,
            successful,
            failed: Some(report.failed()),
            error: report.error.map(|e| e.to_string()),
        };
        return (StatusCode::ACCEPTED, Json(response)).into_response();
    }

    let (status, message) = match outcome.source {
        IngestSource::Prometheus => (StatusCode::OK, "Processed Prometheus alerts"),
        IngestSource::Native => (StatusCode::CREATED, "Event published"),
    };
    let response = IngestResponse {
        message: message.to_string(),
        total,
        successful,
        failed: None,
        error: None,
    };
    (status, Json(response)).into_response()
}
