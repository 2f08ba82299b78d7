// crates/core/src/tools/analyzer.rs
//! Key and tempo detection through an external music extractor.
//!
//! The extractor is called as `<program> <args> <input> <output.json>` and
//! must write an Essentia-style descriptor file: `rhythm.bpm` plus a key
//! profile under `tonal` (`key_edma`, `key_krumhansl`, or `key_temperley`,
//! each with `key` and `scale`).

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::ToolCommand;
use crate::error::ToolError;
use crate::process::run_captured;

const KEY_PROFILES: [&str; 3] = ["key_edma", "key_krumhansl", "key_temperley"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Major,
    Minor,
}

/// Normalized analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyTempo {
    pub bpm: u32,
    pub key: String,
    pub mode: Mode,
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    command: ToolCommand,
}

impl Analyzer {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    /// Analyze `input`, using `scratch` as the extractor's output file.
    ///
    /// `scratch` is removed afterwards whether or not analysis succeeded.
    pub async fn analyze(&self, input: &Path, scratch: &Path) -> Result<KeyTempo, ToolError> {
        let result = self.run(input, scratch).await;
        if let Err(e) = tokio::fs::remove_file(scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %scratch.display(), error = %e, "failed to remove analyzer output");
            }
        }
        result
    }

    async fn run(&self, input: &Path, scratch: &Path) -> Result<KeyTempo, ToolError> {
        let tool = self.command.display_name();
        let mut cmd = self.command.to_command();
        cmd.arg(input).arg(scratch);
        run_captured(tool, cmd).await?;

        let bytes = tokio::fs::read(scratch)
            .await
            .map_err(|e| ToolError::io(scratch, e))?;
        let descriptors: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ToolError::invalid_output(tool, e.to_string()))?;
        from_descriptors(&descriptors).ok_or_else(|| {
            ToolError::invalid_output(tool, "descriptor file lacks rhythm.bpm or a tonal key")
        })
    }
}

/// Build a [`KeyTempo`] from an extractor descriptor document.
pub fn from_descriptors(doc: &Value) -> Option<KeyTempo> {
    let bpm = doc.pointer("/rhythm/bpm")?.as_f64()?;
    let tonal = doc.get("tonal")?;
    let profile = KEY_PROFILES.iter().find_map(|name| tonal.get(*name))?;
    let key = profile.get("key")?.as_str()?;
    let scale = profile.get("scale")?.as_str()?;

    Some(KeyTempo {
        bpm: fold_bpm(bpm).round() as u32,
        key: pretty_key(key),
        mode: if scale.eq_ignore_ascii_case("major") {
            Mode::Major
        } else {
            Mode::Minor
        },
    })
}

/// Fold a tempo into the 60–200 BPM range by doubling or halving.
pub fn fold_bpm(bpm: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    let mut bpm = bpm;
    while bpm < 60.0 {
        bpm *= 2.0;
    }
    while bpm > 200.0 {
        bpm /= 2.0;
    }
    bpm
}

/// Render sharps with the musical sharp sign: `C#` → `C♯`.
pub fn pretty_key(key: &str) -> String {
    key.replace('#', "♯")
}
