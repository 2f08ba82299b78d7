// crates/server/src/jobs/registry.rs
//! In-memory job registry.
//!
//! Each job record lives in its own `tokio::sync::watch` channel. The map of
//! channels sits behind a single `std::sync::RwLock` that is only held for a
//! lookup, insert, or in-place update, never across an `.await`. Every write
//! replaces or edits the whole record under the channel's lock, so readers
//! never see `done` without the matching `progress`.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use super::types::{Job, JobId, JobKind, JobOutcome};

/// Highest progress a running job may report; 100 is reserved for the
/// terminal transition.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already finished: {0}")]
    Finished(JobId),
}

/// Shared id → job map. See the module docs for the locking discipline.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, watch::Sender<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new pending job and return its id.
    pub fn create(&self, kind: JobKind) -> JobId {
        let mut jobs = self.write();
        let id = loop {
            let candidate = Uuid::new_v4();
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        let (tx, _rx) = watch::channel(Job::new(id, kind));
        jobs.insert(id, tx);
        tracing::debug!(job_id = %id, "job created");
        id
    }

    /// Snapshot of a job, or `None` for an unknown id.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.read().get(id).map(|tx| tx.borrow().clone())
    }

    /// Receiver that wakes whenever the job record changes.
    ///
    /// The channel closes when the job is evicted.
    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<Job>> {
        self.read().get(id).map(|tx| tx.subscribe())
    }

    /// Apply `mutator` to a running job as one atomic update.
    ///
    /// Terminal jobs are immutable and yield [`RegistryError::Finished`].
    /// The terminal transition itself goes through [`JobRegistry::finish`];
    /// a mutator that sets `done` is undone.
    pub fn update<F>(&self, id: &JobId, mutator: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Job),
    {
        let jobs = self.read();
        let tx = jobs.get(id).ok_or(RegistryError::NotFound(*id))?;
        let mut result = Ok(());
        tx.send_if_modified(|job| {
            if job.done {
                result = Err(RegistryError::Finished(*id));
                return false;
            }
            let before = job.clone();
            mutator(job);
            job.done = false;
            job.failed = false;
            job.error = None;
            job.finished_at = None;
            job.progress = job.progress.min(MAX_RUNNING_PROGRESS);
            *job != before
        });
        result
    }

    /// Reset a job to the running state: progress 0, no failure recorded.
    pub fn start(&self, id: &JobId) -> Result<(), RegistryError> {
        self.update(id, |job| {
            job.started = true;
            job.progress = 0;
        })
    }

    /// Record a progress percentage for a running job.
    ///
    /// Values are clamped below 100. Repeating the current value does not
    /// wake subscribers.
    pub fn set_progress(&self, id: &JobId, progress: u8) -> Result<(), RegistryError> {
        self.update(id, |job| job.progress = progress)
    }

    /// The terminal transition: `progress = 100`, `done = true`, and the
    /// failure fields from `outcome`, written together exactly once.
    pub fn finish(&self, id: &JobId, outcome: JobOutcome) -> Result<Job, RegistryError> {
        let jobs = self.read();
        let tx = jobs.get(id).ok_or(RegistryError::NotFound(*id))?;
        let mut result = Err(RegistryError::Finished(*id));
        tx.send_if_modified(|job| {
            if job.done {
                return false;
            }
            job.progress = 100;
            job.done = true;
            match &outcome {
                JobOutcome::Succeeded => {
                    job.failed = false;
                    job.error = None;
                }
                JobOutcome::Failed(message) => {
                    job.failed = true;
                    job.error = Some(if message.is_empty() {
                        "Job failed".to_string()
                    } else {
                        message.clone()
                    });
                }
            }
            job.finished_at = Some(Utc::now());
            result = Ok(job.clone());
            true
        });
        result
    }

    /// Evict terminal jobs that finished before `cutoff`. Returns how many
    /// records were removed. Running jobs are never evicted; subscribers of
    /// an evicted job see their channel close.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, tx| {
            let job = tx.borrow();
            let expired = job.done && job.finished_at.is_some_and(|at| at < cutoff);
            !expired
        });
        before - jobs.len()
    }

    /// Output folders owned by separation jobs that are still running.
    pub fn active_folders(&self) -> HashSet<String> {
        self.read()
            .values()
            .filter_map(|tx| {
                let job = tx.borrow();
                let folder = match &job.kind {
                    JobKind::Separation { folder, .. } if !job.done => Some(folder.clone()),
                    _ => None,
                };
                folder
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, watch::Sender<Job>>> {
        self.jobs.read().unwrap_or_else(|e: PoisonError<_>| {
            tracing::error!("job map lock poisoned; continuing with inner state");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, watch::Sender<Job>>> {
        self.jobs.write().unwrap_or_else(|e: PoisonError<_>| {
            tracing::error!("job map lock poisoned; continuing with inner state");
            e.into_inner()
        })
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
