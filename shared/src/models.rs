/// Wire models shared between the session broker and the uploader.
use serde::{Deserialize, Serialize};

/// Accept header Vimeo expects on both the API and the tus endpoint.
pub const VIMEO_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";

/// Public page of an uploaded video.
pub const VIMEO_WATCH_BASE: &str = "https://vimeo.com";

/// Body of `POST /api/vimeo/create-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
}

/// Upload session issued by the broker for a single tus transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
    pub video_uri: String,
    pub video_id: String,
}

impl UploadSession {
    /// Build a session from the provider's upload link and resource URI.
    pub fn from_provider(upload_url: impl Into<String>, video_uri: impl Into<String>) -> Self {
        let video_uri = video_uri.into();
        let video_id = video_id_from_uri(&video_uri).to_string();
        Self {
            upload_url: upload_url.into(),
            video_uri,
            video_id,
        }
    }
}

/// Error envelope returned by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Trailing path segment of a provider resource URI (`/videos/123` -> `123`).
pub fn video_id_from_uri(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// Link to the hosted video page.
pub fn video_page_url(video_id: &str) -> String {
    format!("{}/{}", VIMEO_WATCH_BASE, video_id)
}
