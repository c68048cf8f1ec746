/// Upload progress state machine.
///
/// `idle -> uploading -> {success | error | cancelled}`. All transitions are
/// pure: they consume the current state and return the next one, so the
/// uploader UI and its tests drive the same logic.
use serde::{Deserialize, Serialize};

/// Fallback shown when a transfer fails without a message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Lifecycle of a single upload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
    Cancelled,
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Idle => write!(f, "idle"),
            TransferStatus::Uploading => write!(f, "uploading"),
            TransferStatus::Success => write!(f, "success"),
            TransferStatus::Error => write!(f, "error"),
            TransferStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Callback surface of a transfer client.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Progress { bytes_uploaded: u64, bytes_total: u64 },
    Error { message: String },
    Success,
}

/// Everything the UI needs to render one upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferState {
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
    /// 0..=100, two decimal places.
    pub percentage: f64,
    pub status: TransferStatus,
    pub error_message: Option<String>,
    pub video_id: Option<String>,
}

impl TransferState {
    /// Fresh state for a newly selected file.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_uploading(&self) -> bool {
        self.status == TransferStatus::Uploading
    }

    /// Enter `uploading` with progress and error cleared.
    pub fn started(self, bytes_total: u64) -> Self {
        Self {
            bytes_uploaded: 0,
            bytes_total,
            percentage: 0.0,
            status: TransferStatus::Uploading,
            error_message: None,
            video_id: None,
        }
    }

    /// Record the video id once the session has been issued.
    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    /// Session acquisition or another pre-transfer step failed.
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = TransferStatus::Error;
        self.error_message = Some(message.into());
        self
    }

    /// User-initiated abort.
    pub fn cancelled(mut self) -> Self {
        self.status = TransferStatus::Cancelled;
        self.bytes_uploaded = 0;
        self.percentage = 0.0;
        self.error_message = Some("Upload cancelled".to_string());
        self
    }

    /// Fold one transfer-client event into the state.
    ///
    /// Events are only meaningful while uploading; anything that arrives
    /// after the upload settled (for example a late success after a cancel)
    /// is ignored.
    pub fn apply(mut self, event: &TransferEvent) -> Self {
        if !self.is_uploading() {
            return self;
        }

        match event {
            TransferEvent::Progress {
                bytes_uploaded,
                bytes_total,
            } => {
                let percentage = compute_percentage(*bytes_uploaded, *bytes_total);
                if percentage >= self.percentage {
                    self.bytes_uploaded = *bytes_uploaded;
                    self.bytes_total = *bytes_total;
                    self.percentage = percentage;
                }
            }
            TransferEvent::Error { message } => {
                let message = if message.trim().is_empty() {
                    UNKNOWN_ERROR
                } else {
                    message.as_str()
                };
                self.status = TransferStatus::Error;
                self.error_message = Some(format!("Upload error: {}", message));
            }
            TransferEvent::Success => {
                self.status = TransferStatus::Success;
                self.bytes_uploaded = self.bytes_total;
                self.percentage = 100.0;
            }
        }
        self
    }

    /// Percentage as the progress label shows it (one decimal).
    pub fn percentage_label(&self) -> String {
        format!("{:.1}", self.percentage)
    }

    /// Whether the completion banner should be shown.
    pub fn is_complete(&self) -> bool {
        self.status == TransferStatus::Success && self.video_id.is_some()
    }
}

/// `uploaded / total * 100`, rounded to two decimal places.
pub fn compute_percentage(bytes_uploaded: u64, bytes_total: u64) -> f64 {
    if bytes_total == 0 {
        return 0.0;
    }
    let raw = bytes_uploaded as f64 / bytes_total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
