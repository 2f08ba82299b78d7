// crates/server/src/jobs/runner.rs
//! Bounded worker pool that drives jobs to their terminal state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stemsplit_core::JobsConfig;
use thiserror::Error;
use tokio::sync::Semaphore;

use super::registry::JobRegistry;
use super::types::{Job, JobId, JobKind, JobOutcome};
use crate::metrics;

/// Work performed for one job.
///
/// `run` does the job's work and reports progress through the context; its
/// `Err` becomes the job's failure message. `finalize` runs after the
/// terminal transition has been written and is where transient inputs are
/// removed.
#[async_trait]
pub trait JobTask: Send + Sync + 'static {
    async fn run(&self, ctx: JobContext) -> Result<(), String>;

    async fn finalize(&self, _job: &Job) {}
}

/// Handle a running task uses to publish progress for its own job.
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    registry: Arc<JobRegistry>,
}

impl JobContext {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Publish a progress percentage. Errors are logged, never raised: a
    /// missing or finished record must not abort the tool run.
    pub fn report(&self, progress: u8) {
        if let Err(e) = self.registry.set_progress(&self.id, progress) {
            tracing::warn!(job_id = %self.id, error = %e, "dropping progress update");
        }
    }

    /// Edit non-terminal metadata on the job record.
    pub fn update<F>(&self, mutator: F)
    where
        F: FnOnce(&mut Job),
    {
        if let Err(e) = self.registry.update(&self.id, mutator) {
            tracing::warn!(job_id = %self.id, error = %e, "dropping job update");
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Server is busy ({in_flight} jobs in progress). Please try again later.")]
    Saturated { in_flight: usize },
}

/// Admits jobs into a fixed number of worker slots.
///
/// Up to `max_concurrent` tasks run at once; up to `max_queued` more wait as
/// pending. Beyond that, [`JobRunner::submit`] refuses work and no job record
/// is created.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    slots: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, config: &JobsConfig) -> Self {
        let workers = config.max_concurrent.max(1);
        Self {
            registry,
            slots: Arc::new(Semaphore::new(workers)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            capacity: workers + config.max_queued,
            timeout: config.timeout,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Jobs admitted and not yet finalized.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cheap pre-check so handlers can refuse before accepting an upload.
    pub fn check_capacity(&self) -> Result<(), SubmitError> {
        let in_flight = self.in_flight();
        if in_flight >= self.capacity {
            return Err(SubmitError::Saturated { in_flight });
        }
        Ok(())
    }

    /// Create a job record for `kind` and schedule `task` on the pool.
    ///
    /// Returns as soon as the record exists; the caller never waits on the
    /// task itself.
    pub fn submit<T: JobTask>(&self, kind: JobKind, task: T) -> Result<JobId, SubmitError> {
        let slot = InFlight::acquire(&self.in_flight, self.capacity)?;
        let label = kind.label();
        let id = self.registry.create(kind);
        metrics::record_job_submitted(label);
        tracing::info!(job_id = %id, kind = label, "job submitted");

        let registry = Arc::clone(&self.registry);
        let slots = Arc::clone(&self.slots);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let _slot = slot;
            let task = Arc::new(task);
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => None,
            };
            drive(registry, id, label, task, timeout).await;
        });

        Ok(id)
    }
}

/// Run `task` and write the terminal state no matter how it ends.
async fn drive<T: JobTask>(
    registry: Arc<JobRegistry>,
    id: JobId,
    label: &'static str,
    task: Arc<T>,
    timeout: Option<Duration>,
) {
    if let Err(e) = registry.start(&id) {
        tracing::error!(job_id = %id, error = %e, "job vanished before it started");
        return;
    }
    metrics::record_job_started();
    let started = Instant::now();
    tracing::info!(job_id = %id, kind = label, "job started");

    let ctx = JobContext {
        id,
        registry: Arc::clone(&registry),
    };
    // The body runs in its own task so a panic is observed as a JoinError
    // instead of unwinding through the terminal transition.
    let mut body = {
        let task = Arc::clone(&task);
        tokio::spawn(async move { task.run(ctx).await })
    };
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut body).await {
            Ok(joined) => outcome_of(joined),
            Err(_) => {
                // Wait for the body to be dropped so its child process is
                // killed before finalize touches the job's files.
                body.abort();
                let _ = body.await;
                JobOutcome::Failed(format!("Job timed out after {}s", limit.as_secs()))
            }
        },
        None => outcome_of(body.await),
    };

    let elapsed = started.elapsed();
    metrics::record_job_finished(label, outcome.label(), elapsed);
    match &outcome {
        JobOutcome::Succeeded => {
            tracing::info!(job_id = %id, kind = label, duration_secs = elapsed.as_secs_f64(), "job succeeded")
        }
        JobOutcome::Failed(error) => {
            tracing::warn!(job_id = %id, kind = label, duration_secs = elapsed.as_secs_f64(), error = %error, "job failed")
        }
    }

    match registry.finish(&id, outcome) {
        Ok(job) => task.finalize(&job).await,
        Err(e) => tracing::error!(job_id = %id, error = %e, "terminal transition rejected"),
    }
}

fn outcome_of(joined: Result<Result<(), String>, tokio::task::JoinError>) -> JobOutcome {
    match joined {
        Ok(result) => result.into(),
        Err(e) if e.is_panic() => JobOutcome::Failed("Job crashed unexpectedly".to_string()),
        Err(e) => JobOutcome::Failed(format!("Job aborted: {e}")),
    }
}

/// Counts a job against the pool capacity until dropped.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn acquire(counter: &Arc<AtomicUsize>, capacity: usize) -> Result<Self, SubmitError> {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < capacity).then_some(n + 1))
            .map_err(|in_flight| SubmitError::Saturated { in_flight })?;
        Ok(Self {
            counter: Arc::clone(counter),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobStatus;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn kind() -> JobKind {
        JobKind::Download { file_path: None }
    }

    fn config(max_concurrent: usize, max_queued: usize) -> JobsConfig {
        JobsConfig {
            max_concurrent,
            max_queued,
            ..JobsConfig::default()
        }
    }

    async fn wait_done(registry: &JobRegistry, id: JobId) -> Job {
        let mut rx = registry.subscribe(&id).unwrap();
        let job = rx.wait_for(|job| job.done).await.unwrap().clone();
        job
    }

    struct Steps(Vec<u8>);

    #[async_trait]
    impl JobTask for Steps {
        async fn run(&self, ctx: JobContext) -> Result<(), String> {
            for p in &self.0 {
                ctx.report(*p);
            }
            Ok(())
        }
    }

    struct Fails;

    #[async_trait]
    impl JobTask for Fails {
        async fn run(&self, ctx: JobContext) -> Result<(), String> {
            ctx.report(30);
            Err("Demucs exited with code 1".into())
        }
    }

    struct Panics;

    #[async_trait]
    impl JobTask for Panics {
        async fn run(&self, _ctx: JobContext) -> Result<(), String> {
            panic!("tool wrapper bug");
        }
    }

    struct Blocks(Arc<Notify>);

    #[async_trait]
    impl JobTask for Blocks {
        async fn run(&self, _ctx: JobContext) -> Result<(), String> {
            self.0.notified().await;
            Ok(())
        }
    }

    struct RecordsFinalize(Arc<AtomicBool>);

    #[async_trait]
    impl JobTask for RecordsFinalize {
        async fn run(&self, _ctx: JobContext) -> Result<(), String> {
            Ok(())
        }

        async fn finalize(&self, job: &Job) {
            assert!(job.done);
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn success_ends_at_hundred() {
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &config(2, 2));
        let id = runner.submit(kind(), Steps(vec![10, 60, 100])).unwrap();
        let job = wait_done(runner.registry(), id).await;
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn failure_is_recorded_and_terminal() {
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &config(2, 2));
        let id = runner.submit(kind(), Fails).unwrap();
        let job = wait_done(runner.registry(), id).await;
        assert!(job.failed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.error.as_deref(), Some("Demucs exited with code 1"));
    }

    #[tokio::test]
    async fn panic_still_reaches_terminal_state() {
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &config(1, 0));
        let id = runner.submit(kind(), Panics).unwrap();
        let job = wait_done(runner.registry(), id).await;
        assert!(job.failed);
        assert!(job.error.unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn finalize_runs_after_terminal_transition() {
        let flag = Arc::new(AtomicBool::new(false));
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &config(1, 0));
        let id = runner.submit(kind(), RecordsFinalize(Arc::clone(&flag))).unwrap();
        wait_done(runner.registry(), id).await;
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn saturated_pool_refuses_without_creating_job() {
        let gate = Arc::new(Notify::new());
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &config(1, 1));

        let running = runner.submit(kind(), Blocks(Arc::clone(&gate))).unwrap();
        let queued = runner.submit(kind(), Blocks(Arc::clone(&gate))).unwrap();
        let refused = runner.submit(kind(), Blocks(Arc::clone(&gate)));

        assert_eq!(refused, Err(SubmitError::Saturated { in_flight: 2 }));
        assert!(runner.check_capacity().is_err());
        assert_eq!(runner.registry().len(), 2);

        // Only one slot: the second job waits as pending.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runner.registry().get(&running).unwrap().status(), JobStatus::Running);
        assert_eq!(runner.registry().get(&queued).unwrap().status(), JobStatus::Pending);

        gate.notify_one();
        wait_done(runner.registry(), running).await;
        gate.notify_one();
        wait_done(runner.registry(), queued).await;
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct HangsUntilAborted {
        dropped: Arc<AtomicBool>,
        body_gone_at_finalize: Arc<Mutex<Option<bool>>>,
    }

    #[async_trait]
    impl JobTask for HangsUntilAborted {
        async fn run(&self, _ctx: JobContext) -> Result<(), String> {
            let _flag = DropFlag(Arc::clone(&self.dropped));
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn finalize(&self, _job: &Job) {
            let gone = self.dropped.load(Ordering::SeqCst);
            *self.body_gone_at_finalize.lock().unwrap() = Some(gone);
        }
    }

    #[tokio::test]
    async fn timed_out_body_is_dropped_before_finalize() {
        let seen = Arc::new(Mutex::new(None));
        let runner = JobRunner::new(
            Arc::new(JobRegistry::new()),
            &JobsConfig {
                timeout: Some(Duration::from_millis(20)),
                ..config(1, 0)
            },
        );
        let task = HangsUntilAborted {
            dropped: Arc::new(AtomicBool::new(false)),
            body_gone_at_finalize: Arc::clone(&seen),
        };
        let id = runner.submit(kind(), task).unwrap();
        assert!(wait_done(runner.registry(), id).await.failed);
        for _ in 0..100 {
            if seen.lock().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn timeout_fails_the_job() {
        let gate = Arc::new(Notify::new());
        let runner = JobRunner::new(
            Arc::new(JobRegistry::new()),
            &JobsConfig {
                timeout: Some(Duration::from_millis(20)),
                ..config(1, 0)
            },
        );
        let id = runner.submit(kind(), Blocks(gate)).unwrap();
        let job = wait_done(runner.registry(), id).await;
        assert!(job.failed);
        assert!(job.error.unwrap().contains("timed out"));
    }
}
