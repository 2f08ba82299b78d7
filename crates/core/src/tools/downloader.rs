// crates/core/src/tools/downloader.rs
//! YouTube audio extraction through yt-dlp.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ToolCommand;
use crate::error::ToolError;
use crate::process::{check_status, run_captured, run_streaming};
use crate::progress::parse_percent;

/// Progress reported once the download finished and ffmpeg post-processing
/// (audio extraction) has started.
pub const POSTPROCESS_PERCENT: u8 = 95;

/// Download progress is capped below [`POSTPROCESS_PERCENT`] so the reported
/// value never goes backwards when extraction starts.
const DOWNLOAD_CAP: u8 = POSTPROCESS_PERCENT - 1;

/// Metadata shown before the user commits to a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub channel: String,
    pub thumbnail: String,
    /// `m:ss`
    pub duration: String,
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct RawVideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    id: Option<String>,
}

impl From<RawVideoInfo> for VideoInfo {
    fn from(raw: RawVideoInfo) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| "Unknown".into()),
            channel: raw.uploader.unwrap_or_else(|| "Unknown".into()),
            thumbnail: raw.thumbnail.unwrap_or_default(),
            duration: format_duration(raw.duration.unwrap_or(0.0)),
            video_id: raw.id.unwrap_or_default(),
        }
    }
}

fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Accept only youtube.com / youtu.be links.
pub fn is_youtube_url(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Interpret one line of `yt-dlp --newline` output as a progress value.
pub fn download_progress(line: &str) -> Option<u8> {
    if line.starts_with("[ExtractAudio]") {
        return Some(POSTPROCESS_PERCENT);
    }
    if line.starts_with("[download]") {
        return parse_percent(line).map(|p| p.min(DOWNLOAD_CAP));
    }
    None
}

#[derive(Debug, Clone)]
pub struct Downloader {
    command: ToolCommand,
}

impl Downloader {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    pub async fn info(&self, url: &str) -> Result<VideoInfo, ToolError> {
        let tool = self.command.display_name();
        let mut cmd = self.command.to_command();
        cmd.args(["-J", "--skip-download", "--no-warnings", "--no-playlist", "--"])
            .arg(url);
        let output = run_captured(tool, cmd).await?;
        let raw: RawVideoInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolError::invalid_output(tool, e.to_string()))?;
        Ok(raw.into())
    }

    /// Download the best audio stream of `url` and extract it to
    /// `<output_stem>.mp3` at 192 kbps. Returns the mp3 path.
    pub async fn download_mp3<F>(&self, url: &str, output_stem: &Path, mut on_progress: F) -> Result<PathBuf, ToolError>
    where
        F: FnMut(u8),
    {
        let tool = self.command.display_name().to_string();
        let template = format!("{}.%(ext)s", output_stem.display());
        let mut cmd = self.command.to_command();
        cmd.args([
            "--newline",
            "--no-warnings",
            "--no-playlist",
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
            "-o",
        ])
        .arg(&template)
        .arg("--")
        .arg(url);

        let status = run_streaming(&tool, cmd, |line| match download_progress(line) {
            Some(pct) => on_progress(pct),
            None => tracing::debug!(tool = %tool, line, "downloader output"),
        })
        .await?;
        check_status(&tool, status)?;

        let mp3 = output_stem.with_extension("mp3");
        if !tokio::fs::try_exists(&mp3).await.unwrap_or(false) {
            return Err(ToolError::MissingOutput { path: mp3 });
        }
        Ok(mp3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_filter() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://vimeo.com/1"));
    }

    #[test]
    fn progress_lines() {
        assert_eq!(download_progress("[download]  12.3% of 3.50MiB"), Some(12));
        assert_eq!(download_progress("[download] 100% of 3.50MiB"), Some(94));
        assert_eq!(download_progress("[ExtractAudio] Destination: x.mp3"), Some(95));
        assert_eq!(download_progress("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn info_from_ytdlp_json() {
        let raw: RawVideoInfo = serde_json::from_str(
            r#"{"title":"Song","uploader":"Band","thumbnail":"https://i.ytimg.com/x.jpg","duration":212,"id":"abc123","formats":[]}"#,
        )
        .unwrap();
        let info = VideoInfo::from(raw);
        assert_eq!(
            info,
            VideoInfo {
                title: "Song".into(),
                channel: "Band".into(),
                thumbnail: "https://i.ytimg.com/x.jpg".into(),
                duration: "3:32".into(),
                video_id: "abc123".into(),
            }
        );
    }

    #[test]
    fn missing_fields_fall_back() {
        let raw: RawVideoInfo = serde_json::from_str("{}").unwrap();
        let info = VideoInfo::from(raw);
        assert_eq!(info.title, "Unknown");
        assert_eq!(info.duration, "0:00");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_download_reports_progress_and_output() {
        let tmp = tempfile::tempdir().unwrap();
        let stem = tmp.path().join("youtube_job");
        let script = format!(
            "echo '[download]  50.0% of 1MiB'; echo '[ExtractAudio] Destination: x'; printf ID3 > '{}.mp3'",
            stem.display()
        );
        let dl = Downloader::new(ToolCommand::new("sh").with_args(["-c".to_string(), script, "sh".to_string()]));
        let mut seen = Vec::new();
        let mp3 = dl
            .download_mp3("https://youtu.be/x", &stem, |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(seen, vec![50, 95]);
        assert_eq!(mp3, stem.with_extension("mp3"));
    }
}
