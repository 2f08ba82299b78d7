// crates/server/src/tasks/mod.rs
//! Job bodies for the two kinds of background work.

pub mod download;
pub mod separation;

pub use download::DownloadTask;
pub use separation::SeparationTask;

use std::path::Path;

/// Remove a file, treating "already gone" as success. Other failures are
/// logged; cleanup never fails a request or a job.
pub(crate) async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

/// Directory counterpart of [`remove_file_quietly`].
pub(crate) async fn remove_dir_quietly(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove directory"),
    }
}
