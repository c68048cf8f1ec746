/// Local file selection.
use std::path::{Path, PathBuf};

use reel_shared::errors::{UploadError, UploadResult};
use reel_shared::models::UploadRequest;

/// A video picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime: String,
}

impl SelectedFile {
    /// Stat `path` and guess its MIME type. Only `video/*` files are accepted.
    pub async fn open(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::NotAVideo(path.display().to_string()));
        }

        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        if !mime.starts_with("video/") {
            return Err(UploadError::NotAVideo(format!("{} ({})", path.display(), mime)));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            mime,
        })
    }

    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            file_name: self.name.clone(),
            file_size: self.size,
            file_type: self.mime.clone(),
        }
    }

    /// Size in MiB, as shown next to the file name.
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}
