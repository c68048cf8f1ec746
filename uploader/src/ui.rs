/// Terminal rendering of the upload state.
use indicatif::{ProgressBar, ProgressStyle};

use reel_shared::models::video_page_url;
use reel_shared::transfer_state::{TransferState, TransferStatus};

use crate::file::SelectedFile;

/// Final message shown under the progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success { video_id: String, url: String },
    Error(String),
    /// User abort; informational rather than a failure.
    Cancelled(String),
}

impl std::fmt::Display for Banner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Banner::Success { video_id, url } => write!(
                f,
                "Upload complete!\nVimeo video ID: {}\nWatch on Vimeo: {}",
                video_id, url
            ),
            Banner::Error(message) => write!(f, "[error] {}", message),
            Banner::Cancelled(message) => write!(f, "[info] {}", message),
        }
    }
}

/// Pick the banner for a settled state.
pub fn banner(state: &TransferState) -> Option<Banner> {
    match state.status {
        TransferStatus::Success => {
            let id = state.video_id.as_ref().filter(|_| state.is_complete())?;
            Some(Banner::Success {
                video_id: id.clone(),
                url: video_page_url(id),
            })
        }
        TransferStatus::Error => Some(Banner::Error(
            state
                .error_message
                .clone()
                .unwrap_or_else(|| "Upload failed".to_string()),
        )),
        TransferStatus::Cancelled => Some(Banner::Cancelled(
            state
                .error_message
                .clone()
                .unwrap_or_else(|| "Upload cancelled".to_string()),
        )),
        TransferStatus::Idle | TransferStatus::Uploading => None,
    }
}

/// Name and size lines shown after a file is picked.
pub fn file_info(file: &SelectedFile) -> String {
    format!("File: {}\nSize: {:.2} MB", file.name, file.size_mb())
}

/// Progress bar driven by [`TransferState`] snapshots.
pub struct ProgressView {
    bar: ProgressBar,
}

impl ProgressView {
    pub fn new(bytes_total: u64) -> Self {
        let bar = ProgressBar::new(bytes_total.max(1));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message("0.0% uploaded");
        Self { bar }
    }

    pub fn update(&self, state: &TransferState) {
        if state.bytes_total > 0 {
            self.bar.set_length(state.bytes_total);
        }
        self.bar.set_position(state.bytes_uploaded);
        self.bar
            .set_message(format!("{}% uploaded", state.percentage_label()));
    }

    pub fn finish(&self, state: &TransferState) {
        self.update(state);
        match state.status {
            TransferStatus::Success => self.bar.finish(),
            _ => self.bar.abandon(),
        }
    }
}
