//! API route handlers for the stemsplit server.

pub mod analyze;
pub mod download;
pub mod health;
pub mod metrics;
pub mod progress;
pub mod separate;
pub mod status;
pub mod upload;
pub mod youtube;

use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::jobs::JobId;
use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - POST /separate - Upload audio and start stem separation
/// - GET  /status/{job_id} - Poll a job
/// - GET  /progress/{job_id} - SSE stream of job progress
/// - GET  /download/{job_id}/{song}/{filename} - Fetch a stem (wav or mp3)
/// - POST /youtube-info - Video metadata
/// - POST /youtube-download - Start audio extraction from a video
/// - GET  /youtube-file/{job_id} - Fetch the extracted mp3
/// - POST /analyze - Key and tempo of an uploaded file
/// - GET  /health - Health check
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(separate::router())
        .merge(status::router())
        .merge(progress::router())
        .merge(download::router())
        .merge(youtube::router())
        .merge(analyze::router())
        .merge(health::router())
        .merge(metrics::router())
        .with_state(state)
}

/// Body of a 202 response for a newly submitted job.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub job_id: JobId,
}

impl SubmitResponse {
    pub fn new(message: impl Into<String>, job_id: JobId) -> Self {
        Self {
            success: true,
            message: message.into(),
            job_id,
        }
    }
}

/// Path segment to job id; malformed ids are simply unknown.
pub(crate) fn parse_job_id(raw: &str) -> Option<JobId> {
    Uuid::parse_str(raw).ok()
}

/// Short random token used to keep per-request filenames unique.
pub(crate) fn file_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(12);
    token
}
