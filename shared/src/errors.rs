/// Unified error types for the Reel uploader.
use thiserror::Error;

/// Errors surfaced by the upload workflow.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select a file")]
    NoFileSelected,

    #[error("An upload is already in progress")]
    Busy,

    #[error("This file has already been uploaded; select a file to upload again")]
    AlreadyUploaded,

    #[error("Not a video file: {0}")]
    NotAVideo(String),

    #[error("{0}")]
    Session(String),

    /// Transfer failed after the retry schedule ran out.
    #[error("{0}")]
    Transfer(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Cancellation is informational, not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

/// Errors raised while talking to a tus endpoint.
#[derive(Debug, Error)]
pub enum TusError {
    #[error("server responded with status {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server response is missing the Upload-Offset header")]
    MissingOffset,

    #[error("server offset {actual} does not match expected offset {expected}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl TusError {
    /// Whether the failure is worth another attempt after a delay.
    pub fn is_retriable(&self) -> bool {
        match self {
            TusError::Transport(_) | TusError::OffsetMismatch { .. } => true,
            // 409 offset conflict and 423 locked are recoverable after a HEAD resync
            TusError::Http { status } => *status >= 500 || *status == 409 || *status == 423,
            TusError::MissingOffset | TusError::Io(_) => false,
        }
    }
}

/// Result type alias for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;
