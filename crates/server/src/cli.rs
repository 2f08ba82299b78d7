// crates/server/src/cli.rs
//! Command-line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use stemsplit_core::{Config, ToolCommand, DEFAULT_PORT};

/// Audio stem separation server
#[derive(Parser, Debug)]
#[command(name = "stemsplit", version)]
pub struct Cli {
    /// Bind address
    #[arg(long, env = "STEMSPLIT_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Root for uploads and separated output [default: platform data dir]
    #[arg(long, env = "STEMSPLIT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Static frontend served at `/`
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Separator command line; `-n MODEL -d DEVICE --out DIR INPUT` is appended
    #[arg(long, env = "STEMSPLIT_SEPARATOR", default_value = "python3 -m demucs.separate")]
    pub separator: String,

    /// Separation model name
    #[arg(long, env = "STEMSPLIT_MODEL", default_value = "htdemucs")]
    pub model: String,

    /// Device passed to the separator
    #[arg(long, env = "STEMSPLIT_DEVICE", default_value = "cpu")]
    pub device: String,

    #[arg(long, env = "STEMSPLIT_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    #[arg(long, env = "STEMSPLIT_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    #[arg(long, env = "STEMSPLIT_YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: String,

    /// Key/tempo extractor, invoked as `<cmd> INPUT OUTPUT_JSON`
    #[arg(long, env = "STEMSPLIT_ANALYZER", default_value = "essentia_streaming_extractor_music")]
    pub analyzer: String,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "STEMSPLIT_MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: u64,

    /// Longest accepted audio, in seconds
    #[arg(long, env = "STEMSPLIT_MAX_DURATION_SECS", default_value_t = 300)]
    pub max_duration_secs: u64,

    /// Jobs running an external tool at once
    #[arg(long, env = "STEMSPLIT_MAX_CONCURRENT_JOBS", default_value_t = 2)]
    pub max_concurrent_jobs: usize,

    /// Jobs allowed to wait for a slot before new ones are refused
    #[arg(long, env = "STEMSPLIT_MAX_QUEUED_JOBS", default_value_t = 16)]
    pub max_queued_jobs: usize,

    /// Fail a job after this many seconds (unset: no limit)
    #[arg(long, env = "STEMSPLIT_JOB_TIMEOUT_SECS")]
    pub job_timeout_secs: Option<u64>,

    /// Forget finished jobs after this many seconds (unset: keep)
    #[arg(long, env = "STEMSPLIT_JOB_TTL_SECS")]
    pub job_ttl_secs: Option<u64>,

    #[arg(long, env = "STEMSPLIT_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,

    /// Separated output older than this is removed
    #[arg(long, env = "STEMSPLIT_MAX_OUTPUT_AGE_SECS", default_value_t = 86_400)]
    pub max_output_age_secs: u64,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<Config> {
        if self.max_concurrent_jobs == 0 {
            bail!("--max-concurrent-jobs must be at least 1");
        }
        if self.cleanup_interval_secs == 0 {
            bail!("--cleanup-interval-secs must be at least 1");
        }

        let mut config = Config::default();
        config.host = self.host;
        config.port = self.port;
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        config.static_dir = self.static_dir;

        config.separator.command = tool("separator", &self.separator)?;
        config.separator.model = self.model;
        config.separator.device = self.device;
        config.tools.transcoder = tool("ffmpeg", &self.ffmpeg)?;
        config.tools.probe = tool("ffprobe", &self.ffprobe)?;
        config.tools.downloader = tool("yt-dlp", &self.yt_dlp)?;
        config.tools.analyzer = tool("analyzer", &self.analyzer)?;

        config.limits.max_bytes = self
            .max_upload_mb
            .checked_mul(1024 * 1024)
            .context("--max-upload-mb is too large")?;
        config.limits.max_duration = Duration::from_secs(self.max_duration_secs);

        config.jobs.max_concurrent = self.max_concurrent_jobs;
        config.jobs.max_queued = self.max_queued_jobs;
        config.jobs.timeout = self.job_timeout_secs.map(Duration::from_secs);
        config.jobs.ttl = self.job_ttl_secs.map(Duration::from_secs);

        config.cleanup.interval = Duration::from_secs(self.cleanup_interval_secs);
        config.cleanup.max_output_age = Duration::from_secs(self.max_output_age_secs);

        Ok(config)
    }
}

fn tool(name: &str, line: &str) -> anyhow::Result<ToolCommand> {
    ToolCommand::parse(line).with_context(|| format!("{name} command is empty"))
}
