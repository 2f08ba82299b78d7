// crates/core/src/config.rs
//! Runtime configuration types.
//!
//! The server binary fills [`Config`] from command-line flags and
//! `STEMSPLIT_*` environment variables; tests build it directly from
//! [`Config::default`] and override what they need.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::media::UploadLimits;

/// An external program plus the leading arguments it is always called with.
///
/// `python3 -m demucs.separate` is program `python3` with args
/// `["-m", "demucs.separate"]`; call-specific arguments are appended after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a whitespace-separated command line. Returns `None` when empty.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }

    /// Build a tokio command with the leading arguments already applied.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Short name used in logs and error messages.
    pub fn display_name(&self) -> &str {
        self.program
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.program)
    }
}

/// Configuration for the source-separation step.
#[derive(Debug, Clone)]
pub struct SeparatorConfig {
    pub command: ToolCommand,
    /// Model name; also the directory level the separator writes under.
    pub model: String,
    pub device: String,
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            command: ToolCommand::new("python3").with_args(["-m", "demucs.separate"]),
            model: "htdemucs".into(),
            device: "cpu".into(),
        }
    }
}

/// External programs other than the separator.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub transcoder: ToolCommand,
    pub probe: ToolCommand,
    pub downloader: ToolCommand,
    pub analyzer: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            transcoder: ToolCommand::new("ffmpeg"),
            probe: ToolCommand::new("ffprobe"),
            downloader: ToolCommand::new("yt-dlp"),
            analyzer: ToolCommand::new("essentia_streaming_extractor_music"),
        }
    }
}

/// Worker pool sizing and per-job limits.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Jobs allowed to run their external tool at the same time.
    pub max_concurrent: usize,
    /// Jobs allowed to wait for a free slot before submissions are refused.
    pub max_queued: usize,
    /// Wall-clock cap on a single job. `None` lets a hung tool run forever.
    pub timeout: Option<Duration>,
    /// How long terminal job records are kept. `None` keeps them forever.
    pub ttl: Option<Duration>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_queued: 16,
            timeout: None,
            ttl: None,
        }
    }
}

/// Event-stream pacing.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub interval: Duration,
    /// Separated songs and leftover uploads older than this are removed.
    pub max_output_age: Duration,
    /// Transcoded `_temp.mp3` files older than this are removed.
    pub max_temp_age: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            max_output_age: Duration::from_secs(24 * 60 * 60),
            max_temp_age: Duration::from_secs(60 * 60),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Root for uploads and separated output.
    pub data_dir: PathBuf,
    /// Optional directory with a static frontend, served at `/`.
    pub static_dir: Option<PathBuf>,
    pub separator: SeparatorConfig,
    pub tools: ToolsConfig,
    pub limits: UploadLimits,
    pub jobs: JobsConfig,
    pub progress: ProgressConfig,
    pub cleanup: CleanupConfig,
}

pub const DEFAULT_PORT: u16 = 7860;

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            data_dir: crate::paths::default_data_dir(),
            static_dir: None,
            separator: SeparatorConfig::default(),
            tools: ToolsConfig::default(),
            limits: UploadLimits::default(),
            jobs: JobsConfig::default(),
            progress: ProgressConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn paths(&self) -> crate::paths::StoragePaths {
        crate::paths::StoragePaths::new(&self.data_dir, &self.separator.model)
    }
}
