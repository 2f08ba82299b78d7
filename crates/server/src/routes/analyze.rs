// crates/server/src/routes/analyze.rs
//! POST /analyze: key and tempo of an uploaded file.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use stemsplit_core::tools::KeyTempo;
use stemsplit_core::{extension_of, ValidationError};

use super::file_token;
use super::upload::receive_audio;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: KeyTempo,
}

/// The upload and the analyzer's scratch output are both removed before
/// the response is sent, on success and on failure.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let mut multipart = multipart.map_err(|_| ValidationError::MissingFile)?;
    let token = file_token();
    let uploads = &state.paths.uploads;

    let upload = receive_audio(&mut multipart, &state.config.limits, |filename| {
        let ext = match extension_of(filename) {
            ext if ext.is_empty() => ".mp3".to_string(),
            ext => ext,
        };
        Ok(uploads.join(format!("analyze_{token}{ext}")))
    })
    .await?;

    let scratch = uploads.join(format!("analyze_{token}_out.json"));
    let result = state.analyzer.analyze(upload.path(), &scratch).await?;
    drop(upload);

    tracing::info!(bpm = result.bpm, key = %result.key, "analysis finished");
    Ok(Json(AnalyzeResponse {
        success: true,
        result,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(analyze))
}
