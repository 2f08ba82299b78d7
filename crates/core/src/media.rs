// crates/core/src/media.rs
//! Upload validation, naming rules, and the stem catalogue.

use std::path::Path;
use std::time::Duration;

use crate::error::ValidationError;

const MB: u64 = 1024 * 1024;

/// Limits applied to uploaded audio before a job is created.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub max_duration: Duration,
    /// Lowercase extensions including the dot, e.g. `".mp3"`.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 50 * MB,
            max_duration: Duration::from_secs(300),
            allowed_extensions: vec![".mp3".into(), ".wav".into()],
        }
    }
}

impl UploadLimits {
    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size_mb: size / MB,
                max_mb: self.max_bytes / MB,
            });
        }
        Ok(())
    }

    /// Validate the extension of a client-supplied filename and return it
    /// lowercased.
    pub fn check_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let ext = extension_of(filename);
        if self.allowed_extensions.iter().any(|a| *a == ext) {
            Ok(ext)
        } else {
            Err(ValidationError::UnsupportedExtension {
                allowed: self.allowed_label(),
            })
        }
    }

    pub fn check_duration(&self, duration: Duration) -> Result<(), ValidationError> {
        if duration > self.max_duration {
            let secs = duration.as_secs();
            return Err(ValidationError::TooLong {
                minutes: secs / 60,
                seconds: secs % 60,
                max_minutes: self.max_duration.as_secs() / 60,
            });
        }
        Ok(())
    }

    fn allowed_label(&self) -> String {
        let names: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_uppercase())
            .collect();
        match names.as_slice() {
            [] => "audio".to_string(),
            [one] => one.clone(),
            [init @ .., last] => format!("{} and {}", init.join(", "), last),
        }
    }
}

/// Lowercased extension including the dot, or `""` when there is none.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Filename without its extension, used as the human-facing song title.
pub fn display_stem(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base,
    }
}

/// Keep only ASCII alphanumerics, `.` and `_`.
///
/// The result is safe as a single path component: no separators, and a
/// name made only of dots collapses to `"upload"`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// True when `name` can be joined onto a directory without escaping it.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

/// One isolated component written by the separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl Stem {
    pub const ALL: [Stem; 4] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    /// File the separator writes for this stem.
    pub fn file_name(self) -> &'static str {
        match self {
            Stem::Vocals => "vocals.wav",
            Stem::Drums => "drums.wav",
            Stem::Bass => "bass.wav",
            Stem::Other => "other.wav",
        }
    }

    /// Name shown to users; `other` is presented as the instrumental.
    pub fn label(self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "instrumental",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.file_name() == name)
    }
}

/// Formats the download endpoint can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Attachment name for a served stem: `"<title> [<label>].<ext>"`.
pub fn attachment_name(title: &str, label: &str, format: AudioFormat) -> String {
    format!("{title} [{label}].{}", format.extension())
}
