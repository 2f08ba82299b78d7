//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Job lifecycle counters, the running-jobs gauge and duration histogram
//! - Helpers for upload rejections and cleanup sweeps

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded. Returns `true` if
/// this call installed the recorder, `false` if it was already initialized.
/// Concurrent callers wait until the handle is available.
pub fn init_metrics() -> bool {
    let mut installed = false;
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Failed to set global metrics recorder (already set)");
        } else {
            describe_metrics();
            tracing::info!("Prometheus metrics initialized");
            installed = true;
        }
        handle
    });
    installed
}

fn describe_metrics() {
    describe_counter!("jobs_submitted_total", "Jobs accepted, by kind");
    describe_counter!("jobs_finished_total", "Jobs that reached a terminal state, by kind and outcome");
    describe_gauge!("jobs_running", "Jobs currently holding a worker slot");
    describe_histogram!("job_duration_seconds", "Wall time from job start to terminal state");

    describe_counter!("uploads_rejected_total", "Submissions refused before a job was created, by reason");
    describe_counter!("cleanup_removed_total", "Artifacts removed by the cleanup sweep, by type");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_submitted(kind: &'static str) {
    counter!("jobs_submitted_total", "kind" => kind).increment(1);
}

pub fn record_job_started() {
    gauge!("jobs_running").increment(1.0);
}

/// Record a terminal transition.
///
/// # Arguments
/// * `kind` - Job kind label ("separation" or "download")
/// * `outcome` - "succeeded" or "failed"
/// * `duration` - Time since the job started running
pub fn record_job_finished(kind: &'static str, outcome: &'static str, duration: Duration) {
    gauge!("jobs_running").decrement(1.0);
    counter!("jobs_finished_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("job_duration_seconds", "kind" => kind).record(duration.as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("uploads_rejected_total", "reason" => reason).increment(1);
}

/// Record what one cleanup sweep removed.
pub fn record_cleanup(outputs: u64, temp_files: u64, jobs: u64) {
    counter!("cleanup_removed_total", "type" => "output_dir").increment(outputs);
    counter!("cleanup_removed_total", "type" => "temp_file").increment(temp_files);
    counter!("cleanup_removed_total", "type" => "job").increment(jobs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job_submitted("separation");
        record_job_started();
        record_job_finished("separation", "succeeded", Duration::from_millis(5));
        record_rejection("too_large");
        record_cleanup(1, 2, 3);
    }

    #[test]
    fn test_render_after_init() {
        init_metrics();
        record_job_submitted("download");
        let text = render_metrics().expect("initialized");
        assert!(text.contains("jobs_submitted_total"));
    }
}
