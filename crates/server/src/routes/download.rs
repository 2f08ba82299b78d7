// crates/server/src/routes/download.rs
//! GET /download/{job_id}/{song}/{filename}: serve one separated stem.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use stemsplit_core::tools::Transcoder;
use stemsplit_core::{attachment_name, is_safe_component, AudioFormat, Stem};

use super::{file_token, parse_job_id};
use crate::artifact::{attachment, RemoveOnDrop};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobKind, JobStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// Serve a stem as `"<original name> [<label>].<ext>"`.
///
/// Only stems of a finished separation are served, and only under the
/// folder that job wrote: an unknown id is 404 `Job not found`, a job still
/// running is 404 `Job not ready`, and a folder owned by another job is 404.
///
/// With `format=mp3` the wav is transcoded to a per-request temporary that
/// is deleted when the response body is dropped, whether or not the client
/// read it to the end.
pub async fn download_stem(
    State(state): State<Arc<AppState>>,
    Path((job_id, song, filename)): Path<(String, String, String)>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let format = match query.format.as_deref() {
        None => AudioFormat::default(),
        Some(raw) => AudioFormat::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unsupported format: {raw}")))?,
    };
    let job = parse_job_id(&job_id)
        .and_then(|id| state.jobs.get(&id))
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;
    let title = match (job.status(), job.kind) {
        (JobStatus::Completed, JobKind::Separation { folder, original_name }) if folder == song => {
            original_name
        }
        (JobStatus::Completed, _) => {
            return Err(ApiError::FileNotFound(format!("Directory not found: {song}")));
        }
        (JobStatus::Failed, _) => {
            return Err(ApiError::JobFailed(
                job.error.unwrap_or_else(|| "Separation failed".to_string()),
            ));
        }
        (JobStatus::Pending | JobStatus::Running, _) => return Err(ApiError::JobNotReady(job_id)),
    };

    if !is_safe_component(&filename) {
        return Err(ApiError::FileNotFound(filename));
    }
    let song_dir = state.paths.song_dir(&song);
    if !tokio::fs::try_exists(&song_dir).await.unwrap_or(false) {
        return Err(ApiError::FileNotFound(format!("Directory not found: {song}")));
    }
    let wav = song_dir.join(&filename);
    if !tokio::fs::try_exists(&wav).await.unwrap_or(false) {
        return Err(ApiError::FileNotFound(format!("File '{filename}' not found.")));
    }

    let label = Stem::from_file_name(&filename)
        .map(Stem::label)
        .unwrap_or("output");
    let download_name = attachment_name(&title, label, format);

    match format {
        AudioFormat::Wav => attachment(&wav, &download_name, format.mime_type(), None).await,
        AudioFormat::Mp3 => {
            let temp = Transcoder::temp_mp3_path(&wav, &file_token());
            let guard = RemoveOnDrop::new(&temp);
            if let Err(e) = state.transcoder.to_mp3(&wav, &temp).await {
                tracing::error!(job_id = %job_id, error = %e, "mp3 conversion failed");
                return Err(ApiError::JobFailed("MP3 conversion failed.".to_string()));
            }
            attachment(&temp, &download_name, format.mime_type(), Some(guard)).await
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/{job_id}/{song}/{filename}", get(download_stem))
}
