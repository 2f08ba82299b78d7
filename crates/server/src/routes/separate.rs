// crates/server/src/routes/separate.rs
//! POST /separate: upload a song and start stem separation.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use stemsplit_core::{display_stem, sanitize_filename, ValidationError};

use super::upload::receive_audio;
use super::{file_token, SubmitResponse};
use crate::error::ApiResult;
use crate::jobs::JobKind;
use crate::state::AppState;
use crate::tasks::SeparationTask;

/// Validate the upload, then hand it to a separation job.
///
/// Checks run in order: pool capacity, extension, size, duration. A probe
/// that cannot read the duration skips the duration check. No job exists
/// unless every check passed.
pub async fn separate(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    state.runner.check_capacity()?;
    let mut multipart = multipart.map_err(|_| ValidationError::MissingFile)?;

    let limits = &state.config.limits;
    let uploads = &state.paths.uploads;
    let upload = receive_audio(&mut multipart, limits, |filename| {
        let ext = limits.check_extension(filename)?;
        let stem = sanitize_filename(&display_stem(filename));
        Ok(uploads.join(format!("{stem}_{}{ext}", file_token())))
    })
    .await?;

    match state.probe.duration(upload.path()).await {
        Ok(duration) => limits.check_duration(duration)?,
        Err(e) => tracing::warn!(error = %e, "duration probe failed; skipping duration check"),
    }

    let folder = upload
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let task = SeparationTask {
        separator: Arc::clone(&state.separator),
        input: upload.path().to_path_buf(),
        out_root: state.paths.separated.clone(),
        song_dir: state.paths.song_dir(&folder),
    };
    let kind = JobKind::Separation {
        folder: folder.clone(),
        original_name: upload.original_name.clone(),
    };

    let job_id = state.runner.submit(kind, task)?;
    upload.keep();

    tracing::info!(job_id = %job_id, folder = %folder, "separation queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse::new("Separation started.", job_id)),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/separate", post(separate))
}
