// crates/server/src/routes/youtube.rs
//! Video URL endpoints: metadata, audio extraction job, and file retrieval.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stemsplit_core::tools::downloader::is_youtube_url;
use stemsplit_core::tools::VideoInfo;

use super::{file_token, parse_job_id, SubmitResponse};
use crate::artifact::{attachment, RemoveOnDrop};
use crate::error::{ApiError, ApiResult};
use crate::jobs::JobKind;
use crate::state::AppState;
use crate::tasks::DownloadTask;

#[derive(Debug, Default, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: VideoInfo,
}

/// Trimmed URL, or 400 when it is empty or not a YouTube link.
fn checked_url(body: Result<Json<UrlRequest>, JsonRejection>) -> ApiResult<String> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("URL is required".to_string()));
    }
    if !is_youtube_url(url) {
        return Err(ApiError::BadRequest("Invalid YouTube URL".to_string()));
    }
    Ok(url.to_string())
}

/// POST /youtube-info
pub async fn youtube_info(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<Json<InfoResponse>> {
    let url = checked_url(body)?;
    let info = state.downloader.info(&url).await?;
    Ok(Json(InfoResponse {
        success: true,
        info,
    }))
}

/// POST /youtube-download - start an extraction job.
pub async fn youtube_download(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let url = checked_url(body)?;
    let task = DownloadTask {
        downloader: Arc::clone(&state.downloader),
        url,
        output_stem: state.paths.uploads.join(format!("youtube_{}", file_token())),
    };
    let job_id = state
        .runner
        .submit(JobKind::Download { file_path: None }, task)?;

    tracing::info!(job_id = %job_id, "download queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse::new("Download started", job_id)),
    ))
}

/// GET /youtube-file/{job_id} - the extracted mp3, deleted once served.
pub async fn youtube_file(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = parse_job_id(&job_id)
        .and_then(|id| state.jobs.get(&id))
        .filter(|job| job.done)
        .ok_or_else(|| ApiError::JobNotReady(job_id.clone()))?;
    if job.failed {
        return Err(ApiError::JobFailed(
            job.error.unwrap_or_else(|| "Download failed".to_string()),
        ));
    }

    let path = match job.kind {
        JobKind::Download {
            file_path: Some(path),
        } => path,
        _ => return Err(ApiError::FileNotFound("File not found".to_string())),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{job_id}.mp3"));

    let guard = RemoveOnDrop::new(&path);
    attachment(&path, &name, "audio/mpeg", Some(guard)).await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/youtube-info", post(youtube_info))
        .route("/youtube-download", post(youtube_download))
        .route("/youtube-file/{job_id}", get(youtube_file))
}
