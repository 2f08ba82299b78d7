// crates/server/src/tasks/separation.rs
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use stemsplit_core::tools::Separator;
use stemsplit_core::Stem;

use super::{remove_dir_quietly, remove_file_quietly};
use crate::jobs::{Job, JobContext, JobTask};

/// Splits one uploaded file into the four stems.
///
/// The upload is deleted once the job is terminal. On failure the song's
/// output directory goes with it so no partial stems are served.
#[derive(Clone)]
pub struct SeparationTask {
    pub separator: Arc<Separator>,
    /// Saved upload.
    pub input: PathBuf,
    /// Root the separator writes `<model>/<song>/` under.
    pub out_root: PathBuf,
    /// `<out_root>/<model>/<song>`.
    pub song_dir: PathBuf,
}

#[async_trait]
impl JobTask for SeparationTask {
    async fn run(&self, ctx: JobContext) -> Result<(), String> {
        self.separator
            .run(&self.input, &self.out_root, |pct| ctx.report(pct))
            .await
            .map_err(|e| e.to_string())?;

        if !tokio::fs::try_exists(&self.song_dir).await.unwrap_or(false) {
            return Err(format!(
                "Output folder not found: {}",
                self.song_dir.display()
            ));
        }
        for stem in Stem::ALL {
            let path = self.song_dir.join(stem.file_name());
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(format!("Missing stem file: {}", stem.file_name()));
            }
        }
        Ok(())
    }

    async fn finalize(&self, job: &Job) {
        remove_file_quietly(&self.input).await;
        if job.failed {
            remove_dir_quietly(&self.song_dir).await;
        }
    }
}
