// crates/core/src/process.rs
//! Subprocess plumbing shared by every tool wrapper.

use std::process::{ExitStatus, Output, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::ToolError;
use crate::progress::LineSplitter;

const READ_CHUNK: usize = 8 * 1024;

/// Run `cmd`, handing every stdout/stderr line to `on_line` as it arrives.
///
/// Both pipes are merged into one line stream, the way a terminal would show
/// them. The child is killed if the returned future is dropped before it
/// exits, so wrapping this in `tokio::time::timeout` is enough to enforce a
/// deadline.
pub async fn run_streaming<F>(tool: &str, mut cmd: Command, mut on_line: F) -> Result<ExitStatus, ToolError>
where
    F: FnMut(&str),
{
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(tool, command = ?cmd.as_std(), "spawning");
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    let (tx, mut rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        on_line(&line);
    }

    child.wait().await.map_err(|source| ToolError::Wait {
        tool: tool.to_string(),
        source,
    })
}

async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "error reading tool output");
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        let _ = tx.send(line).await;
    }
}

/// Run `cmd` to completion and return its captured output.
///
/// A non-zero exit becomes [`ToolError::NonZeroExit`]; the tail of stderr is
/// logged for diagnosis but not surfaced to clients.
pub async fn run_captured(tool: &str, mut cmd: Command) -> Result<Output, ToolError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(tool, command = ?cmd.as_std(), "spawning");
    let output = cmd.output().await.map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let start = stderr.len().saturating_sub(500);
        let start = (start..=stderr.len())
            .find(|&i| stderr.is_char_boundary(i))
            .unwrap_or(0);
        let tail = &stderr[start..];
        tracing::warn!(tool, exit_code = ?output.status.code(), stderr = %tail, "non-zero exit");
        return Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            code: output.status.code(),
        });
    }
    Ok(output)
}

/// Map an exit status to `Ok` or [`ToolError::NonZeroExit`].
pub fn check_status(tool: &str, status: ExitStatus) -> Result<(), ToolError> {
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            code: status.code(),
        })
    }
}
