// crates/server/src/lib.rs
//! Stemsplit server library.
//!
//! Axum HTTP server that accepts audio uploads and video URLs, runs the
//! external separation, download, analysis and transcoding tools as
//! background jobs, and exposes their progress by polling and SSE.

pub mod artifact;
pub mod cleanup;
pub mod cli;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod tasks;

pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Headroom over the upload limit for multipart framing and for measuring
/// how far an oversize upload went.
const BODY_LIMIT_SLACK: u64 = 16 * 1024 * 1024;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes
/// - A request body limit derived from the upload limit
/// - CORS allowing any origin and exposing `Content-Disposition`
/// - Request tracing
/// - The static frontend, when `config.static_dir` is set
pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .limits
        .max_bytes
        .saturating_add(BODY_LIMIT_SLACK);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);
    let static_dir = state.config.static_dir.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    let mut app = api_routes(state);
    if let Some(dir) = static_dir {
        tracing::info!(dir = %dir.display(), "serving static frontend");
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
