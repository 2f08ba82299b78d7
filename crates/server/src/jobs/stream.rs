// crates/server/src/jobs/stream.rs
//! Progress values for the event-stream endpoint.

use std::sync::Arc;

use futures_util::Stream;
use stemsplit_core::ProgressConfig;
use tokio::time::Instant;

use super::registry::JobRegistry;
use super::types::JobId;

/// Stream of progress percentages for one job.
///
/// A value is yielded whenever it differs from the previous one. The job is
/// re-read when its record changes and at least every `poll_interval`. The
/// stream ends after the terminal value (always 100), once `max_wait` has
/// elapsed, or when the job is evicted. An unknown id yields a single `0`.
pub fn progress_stream(
    registry: Arc<JobRegistry>,
    id: JobId,
    config: ProgressConfig,
) -> impl Stream<Item = u8> {
    async_stream::stream! {
        let subscription = registry.subscribe(&id);
        drop(registry);
        let mut rx = match subscription {
            Some(rx) => rx,
            None => {
                yield 0;
                return;
            }
        };

        let deadline = Instant::now() + config.max_wait;
        let mut last: Option<u8> = None;

        loop {
            let (progress, done) = {
                let job = rx.borrow_and_update();
                (job.progress, job.done)
            };
            if last != Some(progress) {
                last = Some(progress);
                yield progress;
            }
            if done {
                if last != Some(100) {
                    yield 100;
                }
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(job_id = %id, "progress stream reached max wait");
                break;
            }
            let tick = (now + config.poll_interval).min(deadline);
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(tick) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::{JobKind, JobOutcome};
    use futures_util::StreamExt;
    use std::time::Duration;
    use uuid::Uuid;

    fn kind() -> JobKind {
        JobKind::Download { file_path: None }
    }

    fn config() -> ProgressConfig {
        ProgressConfig {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_job_yields_single_zero() {
        let registry = Arc::new(JobRegistry::new());
        let values: Vec<u8> = progress_stream(registry, Uuid::new_v4(), config()).collect().await;
        assert_eq!(values, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_job_yields_hundred_once() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create(kind());
        registry.finish(&id, JobOutcome::Succeeded).unwrap();
        let values: Vec<u8> = progress_stream(registry, id, config()).collect().await;
        assert_eq!(values, vec![100]);
    }

    #[tokio::test(start_paused = true)]
    async fn yields_distinct_increasing_values_ending_at_hundred() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create(kind());
        registry.start(&id).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for p in [10, 10, 25, 25, 25, 60, 99] {
                    tokio::time::sleep(Duration::from_millis(700)).await;
                    registry.set_progress(&id, p).unwrap();
                }
                tokio::time::sleep(Duration::from_millis(700)).await;
                registry.finish(&id, JobOutcome::Succeeded).unwrap();
            })
        };

        let values: Vec<u8> = progress_stream(Arc::clone(&registry), id, config()).collect().await;
        writer.await.unwrap();
        assert_eq!(values, vec![0, 10, 25, 60, 99, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_still_ends_at_hundred() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create(kind());
        registry.start(&id).unwrap();
        registry.set_progress(&id, 40).unwrap();

        let mut stream = Box::pin(progress_stream(Arc::clone(&registry), id, config()));
        assert_eq!(stream.next().await, Some(40));
        registry.finish(&id, JobOutcome::Failed("boom".into())).unwrap();
        assert_eq!(stream.next().await, Some(100));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_wait() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create(kind());
        let cfg = ProgressConfig {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(2),
        };
        let values: Vec<u8> = progress_stream(Arc::clone(&registry), id, cfg).collect().await;
        assert_eq!(values, vec![0]);
        assert!(!registry.get(&id).unwrap().done);
    }
}
