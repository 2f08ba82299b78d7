// crates/server/src/routes/upload.rs
//! Streaming multipart uploads to disk.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use stemsplit_core::{display_stem, UploadLimits, ValidationError};
use tokio::io::AsyncWriteExt;

use crate::artifact::RemoveOnDrop;
use crate::error::{ApiError, ApiResult};

/// Multipart field that carries the audio file.
pub const AUDIO_FIELD: &str = "audio";

/// An uploaded file on disk. Removed when dropped unless [`SavedUpload::keep`]
/// is called.
#[derive(Debug)]
pub struct SavedUpload {
    path: PathBuf,
    /// Client filename without extension, for display.
    pub original_name: String,
    guard: RemoveOnDrop,
}

impl SavedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand ownership of the file to someone else (a job).
    pub fn keep(self) -> PathBuf {
        self.guard.disarm();
        self.path
    }
}

/// Save the `audio` field of `multipart` to the path chosen by `dest`.
///
/// `dest` receives the client filename and may reject it. The body is
/// streamed to disk; anything past `limits.max_bytes` is counted but not
/// written, and the upload is then refused with its real size.
pub async fn receive_audio<F>(
    multipart: &mut Multipart,
    limits: &UploadLimits,
    dest: F,
) -> ApiResult<SavedUpload>
where
    F: FnOnce(&str) -> ApiResult<PathBuf>,
{
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ValidationError::MissingFile.into());
        }

        let path = dest(&filename)?;
        let guard = RemoveOnDrop::new(&path);
        let size = write_field(field, &path, limits.max_bytes).await?;
        limits.check_size(size)?;

        tracing::debug!(path = %path.display(), size, "upload saved");
        return Ok(SavedUpload {
            path,
            original_name: display_stem(&filename),
            guard,
        });
    }
    Err(ValidationError::MissingFile.into())
}

async fn write_field(mut field: Field<'_>, path: &Path, max_bytes: u64) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            // The body limit cut the stream short: report what arrived.
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Ok(size.max(max_bytes.saturating_add(1)));
            }
            Err(e) => return Err(multipart_error(e)),
        };
        size += chunk.len() as u64;
        if size <= max_bytes {
            file.write_all(&chunk).await?;
        }
    }
    file.flush().await?;
    Ok(size)
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}
