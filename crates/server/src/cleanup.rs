// crates/server/src/cleanup.rs
//! Periodic best-effort removal of old artifacts and job records.
//!
//! Nothing here returns an error: every failure is logged and the sweep moves
//! on to the next entry.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use stemsplit_core::tools::transcoder::TEMP_MP3_SUFFIX;
use tokio::task::JoinHandle;

use crate::metrics;
use crate::state::AppState;
use crate::tasks::{remove_dir_quietly, remove_file_quietly};

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub output_dirs: u64,
    pub temp_files: u64,
    pub stale_files: u64,
    pub jobs_evicted: u64,
}

/// Run one sweep over the output and upload directories and the registry.
///
/// - song directories older than `max_output_age` go, unless a running job
///   owns them
/// - `*_temp.mp3` transcodes older than `max_temp_age` go
/// - uploads and downloads older than `max_output_age` go, unless a running
///   job owns them
/// - terminal job records older than the job TTL are evicted, if a TTL is set
pub async fn sweep(state: &AppState) -> CleanupReport {
    let config = &state.config.cleanup;
    let active = state.jobs.active_folders();
    let mut report = CleanupReport::default();

    if let Some(mut songs) = read_dir_logged(&state.paths.outputs).await {
        while let Ok(Some(entry)) = songs.next_entry().await {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) || active.contains(&name) {
                continue;
            }
            if older_than(&path, config.max_output_age).await {
                remove_dir_quietly(&path).await;
                report.output_dirs += 1;
            } else {
                report.temp_files += sweep_temp_mp3s(&path, config.max_temp_age).await;
            }
        }
    }

    if let Some(mut uploads) = read_dir_logged(&state.paths.uploads).await {
        while let Ok(Some(entry)) = uploads.next_entry().await {
            let path = entry.path();
            if owned_by_active_job(&path, &active) {
                continue;
            }
            if entry.file_type().await.is_ok_and(|t| t.is_file())
                && older_than(&path, config.max_output_age).await
            {
                remove_file_quietly(&path).await;
                report.stale_files += 1;
            }
        }
    }

    if let Some(cutoff) = state.config.jobs.ttl.and_then(ttl_cutoff) {
        report.jobs_evicted = state.jobs.evict_finished_before(cutoff) as u64;
    }

    metrics::record_cleanup(
        report.output_dirs,
        report.temp_files + report.stale_files,
        report.jobs_evicted,
    );
    report
}

/// `now - ttl`, or `None` when the TTL reaches past the representable range.
fn ttl_cutoff(ttl: Duration) -> Option<chrono::DateTime<chrono::Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    chrono::Utc::now().checked_sub_signed(ttl)
}

async fn sweep_temp_mp3s(song_dir: &Path, max_age: Duration) -> u64 {
    let Some(mut files) = read_dir_logged(song_dir).await else {
        return 0;
    };
    let mut removed = 0;
    while let Ok(Some(entry)) = files.next_entry().await {
        let path = entry.path();
        if entry.file_name().to_string_lossy().ends_with(TEMP_MP3_SUFFIX)
            && older_than(&path, max_age).await
        {
            remove_file_quietly(&path).await;
            removed += 1;
        }
    }
    removed
}

/// An upload named `<folder>.<ext>` belongs to the separation writing `<folder>`.
fn owned_by_active_job(path: &Path, active: &HashSet<String>) -> bool {
    path.file_stem()
        .map(|stem| active.contains(stem.to_string_lossy().as_ref()))
        .unwrap_or(false)
}

async fn read_dir_logged(dir: &Path) -> Option<tokio::fs::ReadDir> {
    match tokio::fs::read_dir(dir).await {
        Ok(entries) => Some(entries),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cleanup cannot list directory");
            None
        }
    }
}

async fn older_than(path: &Path, max_age: Duration) -> bool {
    let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot read mtime");
            return false;
        }
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age >= max_age)
        .unwrap_or(false)
}

/// Run [`sweep`] every `cleanup.interval`, starting one interval after launch.
pub fn spawn_scheduler(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = state.config.cleanup.interval;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let report = sweep(&state).await;
            tracing::info!(
                output_dirs = report.output_dirs,
                temp_files = report.temp_files,
                stale_files = report.stale_files,
                jobs_evicted = report.jobs_evicted,
                "cleanup sweep finished"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobKind, JobOutcome};
    use stemsplit_core::Config;
    use tempfile::TempDir;

    async fn state_with(max_age: Duration, ttl: Option<Duration>) -> (TempDir, Arc<AppState>) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_data_dir(tmp.path());
        config.cleanup.max_output_age = max_age;
        config.cleanup.max_temp_age = max_age;
        config.jobs.ttl = ttl;
        let state = AppState::new(config);
        state.paths.ensure().await.unwrap();
        (tmp, state)
    }

    async fn song(state: &AppState, folder: &str) -> std::path::PathBuf {
        let dir = state.paths.song_dir(folder);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("vocals.wav"), b"x").await.unwrap();
        dir
    }

    #[tokio::test]
    async fn removes_expired_outputs_but_keeps_active_ones() {
        let (_tmp, state) = state_with(Duration::ZERO, None).await;
        let old = song(&state, "old_abc").await;
        let busy = song(&state, "busy_def").await;
        tokio::fs::write(state.paths.uploads.join("busy_def.wav"), b"x").await.unwrap();
        tokio::fs::write(state.paths.uploads.join("left_ghi.mp3"), b"x").await.unwrap();

        let id = state.jobs.create(JobKind::Separation {
            folder: "busy_def".into(),
            original_name: "busy".into(),
        });
        state.jobs.start(&id).unwrap();

        let report = sweep(&state).await;
        assert_eq!(report.output_dirs, 1);
        assert_eq!(report.stale_files, 1);
        assert!(!old.exists());
        assert!(busy.exists());
        assert!(state.paths.uploads.join("busy_def.wav").exists());
        assert!(!state.paths.uploads.join("left_ghi.mp3").exists());
    }

    #[tokio::test]
    async fn fresh_outputs_survive_but_stale_temps_go() {
        let (_tmp, state) = state_with(Duration::from_secs(3600), None).await;
        let dir = song(&state, "fresh_abc").await;
        let temp = dir.join(format!("vocals_123{TEMP_MP3_SUFFIX}"));
        tokio::fs::write(&temp, b"mp3").await.unwrap();

        let report = sweep(&state).await;
        assert_eq!(report, CleanupReport::default());
        assert!(temp.exists());

        let mut config = state.config.clone();
        config.cleanup.max_temp_age = Duration::ZERO;
        let strict = AppState::new(config);
        let report = sweep(&strict).await;
        assert_eq!(report.temp_files, 1);
        assert!(!temp.exists());
        assert!(dir.join("vocals.wav").exists());
    }

    #[tokio::test]
    async fn ttl_evicts_finished_jobs_only() {
        let (_tmp, state) = state_with(Duration::from_secs(3600), Some(Duration::ZERO)).await;
        let done = state.jobs.create(JobKind::Download { file_path: None });
        let running = state.jobs.create(JobKind::Download { file_path: None });
        state.jobs.finish(&done, JobOutcome::Succeeded).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = sweep(&state).await;
        assert_eq!(report.jobs_evicted, 1);
        assert!(state.jobs.get(&done).is_none());
        assert!(state.jobs.get(&running).is_some());
    }

    #[tokio::test]
    async fn missing_directories_are_not_errors() {
        let tmp = TempDir::new().unwrap();
        let state = AppState::new(Config::with_data_dir(tmp.path().join("never-created")));
        assert_eq!(sweep(&state).await, CleanupReport::default());
    }
}
