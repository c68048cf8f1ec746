/// Session broker: trades file metadata for a Vimeo tus upload link.
///
/// The access token stays on this side; callers only ever see the upload
/// URL and the id of the created video.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use reel_shared::models::{ErrorBody, UploadRequest, UploadSession, VIMEO_ACCEPT};

use crate::config::BrokerConfig;

/// Description attached to every created video.
pub const VIDEO_DESCRIPTION: &str = "Uploaded with Reel";

/// Failures while creating an upload session.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Vimeo access token is not configured")]
    Config,

    #[error("Vimeo API error: {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BrokerError::Config | BrokerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BrokerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BrokerError::Provider { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// `POST /me/videos` success body (only the fields we need).
#[derive(Debug, Deserialize)]
struct ProviderVideo {
    uri: String,
    upload: ProviderUpload,
}

#[derive(Debug, Deserialize)]
struct ProviderUpload {
    upload_link: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
}

/// Creates Vimeo videos with a tus upload approach.
#[derive(Clone)]
pub struct SessionBroker {
    config: BrokerConfig,
    http: reqwest::Client,
}

impl SessionBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Create a video on the provider and return its upload session.
    ///
    /// One outbound call, no retries: a failed session request is reported
    /// to the caller straight away.
    pub async fn create_upload(&self, req: &UploadRequest) -> Result<UploadSession, BrokerError> {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or(BrokerError::Config)?;

        let body = serde_json::json!({
            "upload": {
                "approach": "tus",
                "size": req.file_size,
            },
            "privacy": {
                "view": "anybody",
            },
            "name": req.file_name,
            "description": VIDEO_DESCRIPTION,
        });

        let url = format!("{}/me/videos", self.config.api_base.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("bearer {}", token))
            .header(ACCEPT, VIMEO_ACCEPT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Vimeo API request failed: {}", e);
                BrokerError::Internal(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "unknown error".to_string());
            error!("Vimeo API error {}: {}", status, message);
            return Err(BrokerError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let video: ProviderVideo = resp.json().await.map_err(|e| {
            error!("Unexpected Vimeo API response: {}", e);
            BrokerError::Internal(format!("unexpected Vimeo API response: {}", e))
        })?;

        let session = UploadSession::from_provider(video.upload.upload_link, video.uri);
        info!(
            "Created Vimeo video {} for {} ({} bytes)",
            session.video_id, req.file_name, req.file_size
        );
        Ok(session)
    }
}
