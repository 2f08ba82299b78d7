// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while driving an external program.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}", describe_exit(.code))]
    NonZeroExit { tool: String, code: Option<i32> },

    #[error("Output not found: {path}")]
    MissingOutput { path: PathBuf },

    #[error("Unexpected output from {tool}: {message}")]
    InvalidOutput { tool: String, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_output(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Reasons an upload is rejected before any job is created.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("File too large ({size_mb}MB). Maximum allowed size is {max_mb}MB.")]
    TooLarge { size_mb: u64, max_mb: u64 },

    #[error("Only {allowed} files are allowed")]
    UnsupportedExtension { allowed: String },

    #[error("Audio too long ({minutes}m {seconds}s). Maximum allowed duration is {max_minutes} minutes.")]
    TooLong {
        minutes: u64,
        seconds: u64,
        max_minutes: u64,
    },

    #[error("No audio file")]
    MissingFile,
}
