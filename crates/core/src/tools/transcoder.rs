// crates/core/src/tools/transcoder.rs
use std::path::{Path, PathBuf};

use crate::config::ToolCommand;
use crate::error::ToolError;
use crate::process::run_captured;

/// Suffix marking a transcoded file as disposable.
pub const TEMP_MP3_SUFFIX: &str = "_temp.mp3";

/// On-demand WAV → MP3 conversion through ffmpeg.
#[derive(Debug, Clone)]
pub struct Transcoder {
    command: ToolCommand,
}

impl Transcoder {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    /// Where a temporary MP3 of `wav` goes: next to the source, as
    /// `<stem>_<token>_temp.mp3`. Callers pass a per-request token so
    /// concurrent downloads of one stem never share a file.
    pub fn temp_mp3_path(wav: &Path, token: &str) -> PathBuf {
        let stem = wav
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        wav.with_file_name(format!("{stem}_{token}{TEMP_MP3_SUFFIX}"))
    }

    /// Convert `input` to VBR quality 2 MP3 at `output`, overwriting it.
    pub async fn to_mp3(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut cmd = self.command.to_command();
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-q:a", "2"])
            .arg(output);
        run_captured(self.command.display_name(), cmd).await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        tracing::debug!(input = %input.display(), output = %output.display(), "transcoded to mp3");
        Ok(())
    }
}
