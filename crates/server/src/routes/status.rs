// crates/server/src/routes/status.rs
//! GET /status/{job_id}: polling surface for job progress.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use stemsplit_core::Stem;

use super::parse_job_id;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{Job, JobKind};
use crate::state::AppState;

/// Status body for a job.
///
/// | State      | Code | Body                                     |
/// |------------|------|------------------------------------------|
/// | running    | 200  | `{done:false, progress}`                 |
/// | failed     | 500  | `{done:true, success:false, error}`      |
/// | succeeded  | 200  | `{done:true, success:true, <locators>}`  |
///
/// Separation locators are one download URL per stem label; a download
/// job has a single `file` URL.
pub fn status_body(job: &Job) -> (StatusCode, Value) {
    if !job.done {
        return (
            StatusCode::OK,
            json!({ "done": false, "progress": job.progress }),
        );
    }
    if job.failed {
        let error = job.error.clone().unwrap_or_else(|| "Job failed".to_string());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "done": true, "success": false, "error": error }),
        );
    }

    let mut body = Map::new();
    body.insert("done".into(), Value::Bool(true));
    body.insert("success".into(), Value::Bool(true));
    match &job.kind {
        JobKind::Separation { folder, .. } => {
            for stem in Stem::ALL {
                body.insert(
                    stem.label().into(),
                    Value::String(format!("/download/{}/{folder}/{}", job.id, stem.file_name())),
                );
            }
        }
        JobKind::Download { .. } => {
            body.insert("file".into(), Value::String(format!("/youtube-file/{}", job.id)));
        }
    }
    (StatusCode::OK, Value::Object(body))
}

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let job = parse_job_id(&job_id)
        .and_then(|id| state.jobs.get(&id))
        .ok_or(ApiError::JobNotFound(job_id))?;
    let (status, body) = status_body(&job);
    Ok((status, Json(body)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status/{job_id}", get(job_status))
}
