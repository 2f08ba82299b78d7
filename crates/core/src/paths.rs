// crates/core/src/paths.rs
//! Centralized path functions for all app storage locations.

use std::path::{Path, PathBuf};

/// Data root: `~/.local/share/stemsplit/` (Linux) or
/// `~/Library/Application Support/stemsplit/` (macOS). Falls back to `./data`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("stemsplit"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Resolved storage layout under a data root.
///
/// ```text
/// <data_dir>/uploads/                 raw uploads and downloaded mp3s
/// <data_dir>/separated/               separator --out root
/// <data_dir>/separated/<model>/<song> stems for one job
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub uploads: PathBuf,
    pub separated: PathBuf,
    pub outputs: PathBuf,
}

impl StoragePaths {
    pub fn new(data_dir: &Path, model: &str) -> Self {
        let separated = data_dir.join("separated");
        Self {
            uploads: data_dir.join("uploads"),
            outputs: separated.join(model),
            separated,
        }
    }

    /// Create every directory in the layout.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.uploads).await?;
        tokio::fs::create_dir_all(&self.outputs).await?;
        Ok(())
    }

    /// Stem directory for a separated song.
    pub fn song_dir(&self, folder: &str) -> PathBuf {
        self.outputs.join(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_nests_model_under_separated() {
        let paths = StoragePaths::new(Path::new("/srv/stemsplit"), "htdemucs");
        assert_eq!(paths.uploads, PathBuf::from("/srv/stemsplit/uploads"));
        assert_eq!(paths.separated, PathBuf::from("/srv/stemsplit/separated"));
        assert_eq!(
            paths.song_dir("song_1"),
            PathBuf::from("/srv/stemsplit/separated/htdemucs/song_1")
        );
    }

    #[tokio::test]
    async fn ensure_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(tmp.path(), "htdemucs");
        paths.ensure().await.unwrap();
        assert!(paths.uploads.is_dir());
        assert!(paths.outputs.is_dir());
    }

    #[test]
    fn default_data_dir_is_named_for_the_app() {
        assert!(default_data_dir().to_string_lossy().contains("stemsplit")
            || default_data_dir() == PathBuf::from("data"));
    }
}
