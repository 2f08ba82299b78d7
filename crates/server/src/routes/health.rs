// crates/server/src/routes/health.rs
//! GET /health: liveness plus a glance at the job pool.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Separations and downloads holding or waiting for a worker slot.
    pub jobs_in_flight: usize,
    /// Job records kept for polling, finished ones included until evicted.
    pub jobs_tracked: usize,
}

/// Always `ok` while the process serves requests.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        jobs_in_flight: state.runner.in_flight(),
        jobs_tracked: state.jobs.len(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
