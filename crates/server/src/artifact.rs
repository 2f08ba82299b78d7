// crates/server/src/artifact.rs
//! File responses for finished artifacts.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};

/// Deletes a file when dropped, unless disarmed.
///
/// Attached to a response body so temporaries go away once the body is
/// finished or abandoned by the client.
#[derive(Debug)]
pub struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Keep the file and hand back its path.
    pub fn disarm(mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed served file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove served file"),
        }
    }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987
/// UTF-8 name, so non-ASCII titles survive in browsers that support it.
pub fn content_disposition(download_name: &str) -> String {
    let fallback: String = download_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(download_name)
    )
}

/// Stream `path` as an attachment named `download_name`.
///
/// With a `cleanup` guard, the guard lives exactly as long as the body
/// stream.
pub async fn attachment(
    path: &Path,
    download_name: &str,
    mime_type: &str,
    cleanup: Option<RemoveOnDrop>,
) -> ApiResult<Response> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::FileNotFound(download_name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _keep = &cleanup;
        chunk
    });

    let disposition = HeaderValue::from_str(&content_disposition(download_name))
        .map_err(|e| ApiError::Internal(format!("invalid Content-Disposition: {e}")))?;
    let content_type = HeaderValue::from_str(mime_type)
        .map_err(|e| ApiError::Internal(format!("invalid Content-Type: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;

    #[test]
    fn disposition_has_ascii_fallback_and_utf8_name() {
        let value = content_disposition("Café \"live\" [vocals].wav");
        assert!(value.starts_with("attachment; filename=\"Caf_ _live_ [vocals].wav\""));
        assert!(value.ends_with("filename*=UTF-8''Caf%C3%A9%20%22live%22%20%5Bvocals%5D.wav"));
    }

    #[test]
    fn guard_removes_file_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x_temp.mp3");
        std::fs::write(&path, b"mp3").unwrap();
        drop(RemoveOnDrop::new(&path));
        assert!(!path.exists());
    }

    #[test]
    fn disarmed_guard_keeps_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("keep.mp3");
        std::fs::write(&path, b"mp3").unwrap();
        assert_eq!(RemoveOnDrop::new(&path).disarm(), Some(path.clone()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn attachment_streams_then_removes_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("song_temp.mp3");
        std::fs::write(&path, b"ID3 data").unwrap();

        let response = attachment(&path, "song [drums].mp3", "audio/mpeg", Some(RemoveOnDrop::new(&path)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "8");
        assert!(path.exists());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ID3 data");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropped_response_removes_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("abandoned_temp.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let response = attachment(&path, "a.mp3", "audio/mpeg", Some(RemoveOnDrop::new(&path)))
            .await
            .unwrap();
        drop(response);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = attachment(&tmp.path().join("nope.wav"), "nope.wav", "audio/wav", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::FileNotFound(_)));
    }
}
