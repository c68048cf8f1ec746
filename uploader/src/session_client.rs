/// Client side of the broker's create-upload endpoint.
use async_trait::async_trait;
use tracing::{error, info};

use reel_shared::errors::UploadError;
use reel_shared::models::{ErrorBody, UploadRequest, UploadSession};

pub const CREATE_UPLOAD_PATH: &str = "/api/vimeo/create-upload";

/// Shown when the broker fails without an error body.
const SESSION_FALLBACK: &str = "Failed to get an upload URL";

/// Anything that can issue an upload session.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn create_session(&self, req: &UploadRequest) -> Result<UploadSession, UploadError>;
}

/// HTTP client for the Reel broker.
#[derive(Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: String,
}

impl BrokerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionSource for BrokerClient {
    async fn create_session(&self, req: &UploadRequest) -> Result<UploadSession, UploadError> {
        let url = format!("{}{}", self.base_url, CREATE_UPLOAD_PATH);
        let resp = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| UploadError::Session(format!("Error: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| SESSION_FALLBACK.to_string());
            error!("Broker refused upload session ({}): {}", status, message);
            return Err(UploadError::Session(format!("Error: {}", message)));
        }

        let session: UploadSession = resp
            .json()
            .await
            .map_err(|e| UploadError::Session(format!("Error: {}", e)))?;
        info!("Got upload session for video {}", session.video_id);
        Ok(session)
    }
}
