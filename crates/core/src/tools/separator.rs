// crates/core/src/tools/separator.rs
//! Source-separation model invoked as a subprocess.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::SeparatorConfig;
use crate::error::ToolError;
use crate::process::{check_status, run_streaming};
use crate::progress::parse_percent;

/// Runs the separator CLI (`demucs.separate` by default).
///
/// The command line is `<program> <args> -n <model> -d <device> --out <root>
/// <input>`, and the separator writes its stems to
/// `<root>/<model>/<input file stem>/`.
#[derive(Debug, Clone)]
pub struct Separator {
    config: SeparatorConfig,
}

impl Separator {
    pub fn new(config: SeparatorConfig) -> Self {
        Self { config }
    }

    pub fn command(&self, input: &Path, out_root: &Path) -> Command {
        let mut cmd = self.config.command.to_command();
        cmd.arg("-n")
            .arg(&self.config.model)
            .arg("-d")
            .arg(&self.config.device)
            .arg("--out")
            .arg(out_root)
            .arg(input);
        cmd
    }

    /// Directory the separator will create for `input`.
    pub fn output_dir(&self, input: &Path, out_root: &Path) -> PathBuf {
        let song = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        out_root.join(&self.config.model).join(song)
    }

    /// Run the separator, reporting each parsed percentage to `on_progress`.
    ///
    /// Lines without a percentage are logged at debug level. A non-zero exit
    /// is an error; checking that the stems exist is left to the caller.
    pub async fn run<F>(&self, input: &Path, out_root: &Path, mut on_progress: F) -> Result<(), ToolError>
    where
        F: FnMut(u8),
    {
        let tool = self.config.command.display_name().to_string();
        let status = run_streaming(&tool, self.command(input, out_root), |line| {
            match parse_percent(line) {
                Some(pct) => on_progress(pct),
                None => tracing::debug!(tool = %tool, line, "separator output"),
            }
        })
        .await?;
        check_status(&tool, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolCommand;

    fn separator() -> Separator {
        Separator::new(SeparatorConfig {
            command: ToolCommand::new("python3").with_args(["-m", "demucs.separate"]),
            model: "htdemucs".into(),
            device: "cpu".into(),
        })
    }

    #[test]
    fn command_line_layout() {
        let cmd = separator().command(Path::new("/up/song_1.wav"), Path::new("/sep"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-m", "demucs.separate", "-n", "htdemucs", "-d", "cpu", "--out", "/sep", "/up/song_1.wav"]
        );
    }

    #[test]
    fn output_dir_follows_model_and_input_stem() {
        let dir = separator().output_dir(Path::new("/up/song_1.wav"), Path::new("/sep"));
        assert_eq!(dir, PathBuf::from("/sep/htdemucs/song_1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_progress_from_output() {
        let sep = Separator::new(SeparatorConfig {
            command: ToolCommand::new("sh").with_args([
                "-c",
                "printf ' 10%%|#\\r 55%%|##\\rLoading model\\n'; exit 0",
                "sh",
            ]),
            model: "m".into(),
            device: "cpu".into(),
        });
        let mut seen = Vec::new();
        sep.run(Path::new("in.wav"), Path::new("out"), |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(seen, vec![10, 55]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_error() {
        let sep = Separator::new(SeparatorConfig {
            command: ToolCommand::new("sh").with_args(["-c", "exit 1", "sh"]),
            model: "m".into(),
            device: "cpu".into(),
        });
        let err = sep.run(Path::new("in.wav"), Path::new("out"), |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "sh exited with code 1");
    }
}
