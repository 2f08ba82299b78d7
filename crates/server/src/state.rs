// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use stemsplit_core::tools::{Analyzer, Downloader, DurationProbe, Separator, Transcoder};
use stemsplit_core::{Config, StoragePaths};

use crate::jobs::{JobRegistry, JobRunner};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: Config,
    /// Upload, output and download directories derived from `config`.
    pub paths: StoragePaths,
    pub jobs: Arc<JobRegistry>,
    /// Bounded pool every separation and download goes through.
    pub runner: JobRunner,
    pub separator: Arc<Separator>,
    pub transcoder: Transcoder,
    pub probe: DurationProbe,
    pub downloader: Arc<Downloader>,
    pub analyzer: Analyzer,
}

impl AppState {
    /// Build the state and the tool wrappers from `config`.
    ///
    /// Directories are not created here; see [`StoragePaths::ensure`].
    pub fn new(config: Config) -> Arc<Self> {
        let jobs = Arc::new(JobRegistry::new());
        let runner = JobRunner::new(Arc::clone(&jobs), &config.jobs);
        Arc::new(Self {
            start_time: Instant::now(),
            paths: config.paths(),
            jobs,
            runner,
            separator: Arc::new(Separator::new(config.separator.clone())),
            transcoder: Transcoder::new(config.tools.transcoder.clone()),
            probe: DurationProbe::new(config.tools.probe.clone()),
            downloader: Arc::new(Downloader::new(config.tools.downloader.clone())),
            analyzer: Analyzer::new(config.tools.analyzer.clone()),
            config,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_new() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::new(Config::with_data_dir(tmp.path()));
        assert!(state.uptime_secs() < 1);
        assert!(state.jobs.is_empty());
        assert!(state.paths.outputs.ends_with("separated/htdemucs"));
    }

    #[test]
    fn test_runner_shares_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AppState::new(Config::with_data_dir(tmp.path()));
        assert!(Arc::ptr_eq(&state.jobs, state.runner.registry()));
    }
}
