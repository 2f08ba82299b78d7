// crates/server/src/tasks/download.rs
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use stemsplit_core::tools::Downloader;

use super::remove_file_quietly;
use crate::jobs::{Job, JobContext, JobKind, JobTask};

/// Extracts the audio track of a video URL to `<output_stem>.mp3`.
pub struct DownloadTask {
    pub downloader: Arc<Downloader>,
    pub url: String,
    pub output_stem: PathBuf,
}

#[async_trait]
impl JobTask for DownloadTask {
    async fn run(&self, ctx: JobContext) -> Result<(), String> {
        let mp3 = self
            .downloader
            .download_mp3(&self.url, &self.output_stem, |pct| ctx.report(pct))
            .await
            .map_err(|e| e.to_string())?;

        ctx.update(|job| {
            if let JobKind::Download { file_path } = &mut job.kind {
                *file_path = Some(mp3);
            }
        });
        Ok(())
    }

    async fn finalize(&self, job: &Job) {
        if !job.failed {
            return;
        }
        // Partial downloads share the output stem as a prefix.
        let (Some(dir), Some(prefix)) = (
            self.output_stem.parent(),
            self.output_stem.file_name().and_then(|n| n.to_str()),
        ) else {
            return;
        };
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list download dir");
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                remove_file_quietly(&entry.path()).await;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::jobs::{JobRegistry, JobRunner};
    use stemsplit_core::{JobsConfig, ToolCommand};
    use tempfile::TempDir;

    /// `sh -c <script> sh <downloader args...>`; the output template is the
    /// argument after `-o`.
    fn fake_downloader(script: &str) -> Arc<Downloader> {
        let script = format!(
            r#"while [ "$1" != "-o" ]; do shift; done
stem=$(printf '%s' "$2" | sed 's/[.]%(ext)s$//')
{script}"#
        );
        Arc::new(Downloader::new(
            ToolCommand::new("sh").with_args(["-c".to_string(), script, "sh".to_string()]),
        ))
    }

    async fn run(script: &str) -> (TempDir, Job) {
        let tmp = TempDir::new().unwrap();
        let task = DownloadTask {
            downloader: fake_downloader(script),
            url: "https://youtu.be/abc".into(),
            output_stem: tmp.path().join("yt_123"),
        };
        let runner = JobRunner::new(Arc::new(JobRegistry::new()), &JobsConfig::default());
        let id = runner
            .submit(JobKind::Download { file_path: None }, task)
            .unwrap();
        let mut rx = runner.registry().subscribe(&id).unwrap();
        let job = rx.wait_for(|job| job.done).await.unwrap().clone();
        (tmp, job)
    }

    #[tokio::test]
    async fn success_records_file_path() {
        let script = r#"
echo '[download]  12.5% of 3.00MiB'
echo '[download] 100% of 3.00MiB'
echo '[ExtractAudio] Destination: x.mp3'
echo mp3 > "$stem.mp3"
"#;
        let (tmp, job) = run(script).await;
        assert!(!job.failed, "{:?}", job.error);
        assert_eq!(
            job.kind,
            JobKind::Download {
                file_path: Some(tmp.path().join("yt_123.mp3"))
            }
        );
    }

    #[tokio::test]
    async fn missing_mp3_fails_and_clears_partials() {
        let script = r#"echo part > "$stem.webm.part""#;
        let (tmp, job) = run(script).await;
        assert!(job.failed);
        assert!(job.error.unwrap().contains("yt_123.mp3"));
        for _ in 0..200 {
            if !tmp.path().join("yt_123.webm.part").exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!tmp.path().join("yt_123.webm.part").exists());
    }
}
