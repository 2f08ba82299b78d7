// crates/server/src/routes/progress.rs
//! GET /progress/{job_id}: SSE stream of a job's progress.
//!
//! Each frame is `data: <percent>`. The stream ends after 100, after the
//! configured max wait, or immediately after a single `0` for unknown ids.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use uuid::Uuid;

use super::parse_job_id;
use crate::jobs::progress_stream;
use crate::state::AppState;

pub async fn job_progress(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    // The registry never issues the nil id, so a malformed id streams as unknown.
    let id = parse_job_id(&job_id).unwrap_or(Uuid::nil());
    let stream = progress_stream(Arc::clone(&state.jobs), id, state.config.progress.clone())
        .map(|progress| Ok(Event::default().data(progress.to_string())));
    Sse::new(stream)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/progress/{job_id}", get(job_progress))
}
