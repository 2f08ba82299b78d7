// crates/core/src/tools/probe.rs
use std::path::Path;
use std::time::Duration;

use crate::config::ToolCommand;
use crate::error::ToolError;
use crate::process::run_captured;

/// Reads media duration with ffprobe.
#[derive(Debug, Clone)]
pub struct DurationProbe {
    command: ToolCommand,
}

impl DurationProbe {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    pub async fn duration(&self, path: &Path) -> Result<Duration, ToolError> {
        let tool = self.command.display_name();
        let mut cmd = self.command.to_command();
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path);
        let output = run_captured(tool, cmd).await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| ToolError::invalid_output(tool, "no duration in probe output"))
    }
}

fn parse_duration(stdout: &str) -> Option<Duration> {
    let secs: f64 = stdout.lines().find_map(|l| l.trim().parse().ok())?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}
