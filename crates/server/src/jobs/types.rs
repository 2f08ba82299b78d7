// crates/server/src/jobs/types.rs
//! Types for the background job system.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Opaque job identifier, unique for the life of the process.
pub type JobId = Uuid;

/// What a job does, plus the metadata its result locators are built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// Stem separation of an uploaded file.
    Separation {
        /// Directory name under the model output root.
        folder: String,
        /// Upload name without extension, used for download filenames.
        original_name: String,
    },
    /// Audio extraction from a video URL.
    Download {
        /// Set once the mp3 exists.
        file_path: Option<PathBuf>,
    },
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Separation { .. } => "separation",
            JobKind::Download { .. } => "download",
        }
    }
}

/// Derived lifecycle phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One tracked unit of work.
///
/// Invariants upheld by [`JobRegistry`](super::JobRegistry):
/// - `failed` and `error` are only set together with `done`
/// - `progress < 100` while `done` is false
/// - a record with `done == true` is never modified again
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub progress: u8,
    pub started: bool,
    pub done: bool,
    pub failed: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            progress: 0,
            started: false,
            done: false,
            failed: false,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        match (self.started, self.done, self.failed) {
            (_, true, true) => JobStatus::Failed,
            (_, true, false) => JobStatus::Completed,
            (true, false, _) => JobStatus::Running,
            (false, false, _) => JobStatus::Pending,
        }
    }
}

/// How a job ended. Applied by the terminal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

impl From<Result<(), String>> for JobOutcome {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => JobOutcome::Succeeded,
            Err(e) => JobOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download() -> JobKind {
        JobKind::Download { file_path: None }
    }

    #[test]
    fn new_job_is_pending() {
        let job = Job::new(Uuid::new_v4(), download());
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(!job.done && !job.failed && job.error.is_none());
    }

    #[test]
    fn status_derivation() {
        let mut job = Job::new(Uuid::new_v4(), download());
        job.started = true;
        assert_eq!(job.status(), JobStatus::Running);
        job.done = true;
        assert_eq!(job.status(), JobStatus::Completed);
        job.failed = true;
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn kind_serializes_with_tag() {
        let kind = JobKind::Separation {
            folder: "song_ab12".into(),
            original_name: "Song".into(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "separation");
        assert_eq!(json["folder"], "song_ab12");
        assert_eq!(kind.label(), "separation");
    }

    #[test]
    fn outcome_from_result() {
        assert_eq!(JobOutcome::from(Ok(())), JobOutcome::Succeeded);
        assert_eq!(
            JobOutcome::from(Err("boom".to_string())),
            JobOutcome::Failed("boom".into())
        );
    }
}
