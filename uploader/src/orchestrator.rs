/// Upload orchestration.
///
/// Owns the selected file and the [`TransferState`], asks the broker for a
/// session, hands the file to a [`TransferClient`] and folds the client's
/// events back into the state. At most one transfer is active at a time.
use tokio::sync::mpsc;
use tracing::{info, warn};

use reel_shared::errors::{UploadError, UploadResult};
use reel_shared::models::VIMEO_ACCEPT;
use reel_shared::transfer_state::{TransferEvent, TransferState, TransferStatus};
use reel_shared::tus::{TransferClient, TransferHandle, TransferJob};

use crate::file::SelectedFile;
use crate::session_client::SessionSource;

/// The transfer currently in flight and the channel it reports on.
struct ActiveTransfer {
    handle: TransferHandle,
    events: mpsc::UnboundedReceiver<TransferEvent>,
}

pub struct UploadOrchestrator<S, T> {
    sessions: S,
    transfers: T,
    file: Option<SelectedFile>,
    state: TransferState,
    active: Option<ActiveTransfer>,
}

impl<S: SessionSource, T: TransferClient> UploadOrchestrator<S, T> {
    pub fn new(sessions: S, transfers: T) -> Self {
        Self {
            sessions,
            transfers,
            file: None,
            state: TransferState::new(),
            active: None,
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn is_uploading(&self) -> bool {
        self.active.is_some()
    }

    /// Replace the selected file and reset progress.
    pub fn select_file(&mut self, file: SelectedFile) -> UploadResult<()> {
        if self.is_uploading() {
            return Err(UploadError::Busy);
        }
        info!("Selected {} ({} bytes, {})", file.name, file.size, file.mime);
        self.file = Some(file);
        self.state = TransferState::new();
        Ok(())
    }

    /// Request a session and start transferring the selected file.
    ///
    /// Returns once the transfer is running; progress arrives through
    /// [`next_event`](Self::next_event).
    pub async fn start_upload(&mut self) -> UploadResult<()> {
        if self.is_uploading() {
            return Err(UploadError::Busy);
        }

        let file = match &self.file {
            Some(file) => file.clone(),
            None => {
                let err = UploadError::NoFileSelected;
                self.transition(|s| s.failed(err.to_string()));
                return Err(err);
            }
        };

        if self.state.status == TransferStatus::Success {
            return Err(UploadError::AlreadyUploaded);
        }

        self.transition(|s| s.started(file.size));

        let session = match self.sessions.create_session(&file.upload_request()).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not get an upload session: {}", e);
                let message = e.to_string();
                self.transition(|s| s.failed(message));
                return Err(e);
            }
        };

        let video_id = session.video_id.clone();
        self.transition(|s| s.with_video_id(video_id));

        let job = TransferJob::new(file.path.clone(), session.upload_url, file.size)
            .with_header("Accept", VIMEO_ACCEPT)
            .with_metadata("filename", file.name.as_str())
            .with_metadata("filetype", file.mime.as_str());

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.transfers.start(job, tx);
        self.active = Some(ActiveTransfer { handle, events: rx });

        info!("Uploading {} as video {}", file.name, session.video_id);
        Ok(())
    }

    /// Abort the active transfer. Returns `false` when nothing was running.
    pub fn cancel_upload(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.handle.abort();
        // Dropping the receiver discards anything the aborted transfer still sends
        drop(active.events);
        self.transition(TransferState::cancelled);
        info!("Upload cancelled");
        true
    }

    /// Fold one transfer event into the state.
    pub fn handle_event(&mut self, event: TransferEvent) {
        self.transition(|s| s.apply(&event));
        if !self.state.is_uploading() {
            self.active = None;
        }
    }

    /// Wait for the next event of the active transfer.
    ///
    /// Returns `None` when no transfer is active. A transfer that stops
    /// reporting without finishing is surfaced as an error event.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        let active = self.active.as_mut()?;
        match active.events.recv().await {
            Some(event) => Some(event),
            None => Some(TransferEvent::Error {
                message: "transfer ended unexpectedly".to_string(),
            }),
        }
    }

    /// Drive the active transfer until it succeeds or fails.
    pub async fn run_until_settled(&mut self) -> UploadResult<()> {
        while let Some(event) = self.next_event().await {
            self.handle_event(event);
        }
        self.outcome()
    }

    /// How the last upload ended, as a result.
    ///
    /// `Ok` for success or while nothing has settled yet; a failed transfer
    /// maps to [`UploadError::Transfer`] and a user abort to
    /// [`UploadError::Cancelled`].
    pub fn outcome(&self) -> UploadResult<()> {
        match self.state.status {
            TransferStatus::Error => Err(UploadError::Transfer(
                self.state
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Upload failed".to_string()),
            )),
            TransferStatus::Cancelled => Err(UploadError::Cancelled),
            TransferStatus::Idle | TransferStatus::Uploading | TransferStatus::Success => Ok(()),
        }
    }

    fn transition(&mut self, f: impl FnOnce(TransferState) -> TransferState) {
        self.state = f(std::mem::take(&mut self.state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    use reel_shared::models::{video_page_url, UploadRequest, UploadSession};

    const TEN_MIB: u64 = 10_485_760;

    #[derive(Clone, Default)]
    struct FakeSessions {
        calls: Arc<AtomicUsize>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl SessionSource for FakeSessions {
        async fn create_session(&self, _req: &UploadRequest) -> Result<UploadSession, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(UploadError::Session(message.clone())),
                None => Ok(UploadSession::from_provider(
                    "https://files.vimeo.com/x",
                    "/videos/123456789",
                )),
            }
        }
    }

    /// Records started jobs and keeps their event senders for the test to drive.
    #[derive(Clone, Default)]
    struct FakeTransfers {
        started: Arc<Mutex<Vec<(TransferJob, mpsc::UnboundedSender<TransferEvent>, TransferHandle)>>>,
    }

    impl FakeTransfers {
        fn emit(&self, event: TransferEvent) -> bool {
            let started = self.started.lock().unwrap();
            let (_, tx, handle) = started.last().unwrap();
            // Honour the abort contract of a real client
            if handle.is_aborted() {
                return false;
            }
            tx.send(event).is_ok()
        }

        fn count(&self) -> usize {
            self.started.lock().unwrap().len()
        }

        fn last_job(&self) -> TransferJob {
            self.started.lock().unwrap().last().unwrap().0.clone()
        }
    }

    impl TransferClient for FakeTransfers {
        fn start(&self, job: TransferJob, events: mpsc::UnboundedSender<TransferEvent>) -> TransferHandle {
            let handle = TransferHandle::new(CancellationToken::new());
            self.started
                .lock()
                .unwrap()
                .push((job, events, handle.clone()));
            handle
        }
    }

    fn video() -> SelectedFile {
        SelectedFile {
            path: PathBuf::from("/videos/holiday.mp4"),
            name: "holiday.mp4".to_string(),
            size: TEN_MIB,
            mime: "video/mp4".to_string(),
        }
    }

    fn orchestrator() -> (
        UploadOrchestrator<FakeSessions, FakeTransfers>,
        FakeSessions,
        FakeTransfers,
    ) {
        let sessions = FakeSessions::default();
        let transfers = FakeTransfers::default();
        (
            UploadOrchestrator::new(sessions.clone(), transfers.clone()),
            sessions,
            transfers,
        )
    }

    async fn pump(orch: &mut UploadOrchestrator<FakeSessions, FakeTransfers>) {
        let event = orch.next_event().await.unwrap();
        orch.handle_event(event);
    }

    #[tokio::test]
    async fn test_start_without_file() {
        let (mut orch, sessions, transfers) = orchestrator();

        let err = orch.start_upload().await.unwrap_err();
        assert!(matches!(err, UploadError::NoFileSelected));
        assert_eq!(orch.state().status, TransferStatus::Error);
        assert_eq!(orch.state().error_message.as_deref(), Some("Please select a file"));
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transfers.count(), 0);
    }

    #[tokio::test]
    async fn test_full_upload() {
        let (mut orch, _, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();

        assert!(orch.is_uploading());
        assert_eq!(orch.state().status, TransferStatus::Uploading);
        assert_eq!(orch.state().video_id.as_deref(), Some("123456789"));

        let job = transfers.last_job();
        assert_eq!(job.upload_url, "https://files.vimeo.com/x");
        assert_eq!(job.size, TEN_MIB);
        assert_eq!(job.retry_delays, reel_shared::tus::DEFAULT_RETRY_DELAYS.to_vec());
        assert!(job
            .headers
            .contains(&("Accept".to_string(), VIMEO_ACCEPT.to_string())));
        assert_eq!(
            job.metadata,
            vec![
                ("filename".to_string(), "holiday.mp4".to_string()),
                ("filetype".to_string(), "video/mp4".to_string()),
            ]
        );

        transfers.emit(TransferEvent::Progress {
            bytes_uploaded: 5_242_880,
            bytes_total: TEN_MIB,
        });
        pump(&mut orch).await;
        assert_eq!(format!("{:.2}", orch.state().percentage), "50.00");

        transfers.emit(TransferEvent::Success);
        orch.run_until_settled().await.unwrap();
        let state = orch.state();
        assert_eq!(state.status, TransferStatus::Success);
        assert_eq!(state.percentage_label(), "100.0");
        assert_eq!(
            video_page_url(state.video_id.as_deref().unwrap()),
            "https://vimeo.com/123456789"
        );
        assert!(!orch.is_uploading());
    }

    #[tokio::test]
    async fn test_session_failure() {
        let sessions = FakeSessions {
            fail_with: Some("Error: Vimeo API error: quota exceeded".to_string()),
            ..Default::default()
        };
        let transfers = FakeTransfers::default();
        let mut orch = UploadOrchestrator::new(sessions, transfers.clone());
        orch.select_file(video()).unwrap();

        assert!(orch.start_upload().await.is_err());
        assert_eq!(orch.state().status, TransferStatus::Error);
        assert_eq!(
            orch.state().error_message.as_deref(),
            Some("Error: Vimeo API error: quota exceeded")
        );
        assert!(!orch.is_uploading());
        assert_eq!(transfers.count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_upload() {
        let (mut orch, _, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();

        transfers.emit(TransferEvent::Progress {
            bytes_uploaded: 1_048_576,
            bytes_total: TEN_MIB,
        });
        pump(&mut orch).await;
        assert_eq!(orch.state().percentage, 10.0);

        assert!(orch.cancel_upload());
        assert_eq!(orch.state().status, TransferStatus::Cancelled);
        assert_eq!(orch.state().percentage, 0.0);
        assert_eq!(orch.state().error_message.as_deref(), Some("Upload cancelled"));

        // The aborted transfer can no longer report success
        assert!(!transfers.emit(TransferEvent::Success));
        orch.handle_event(TransferEvent::Success);
        assert_eq!(orch.state().status, TransferStatus::Cancelled);
        assert_eq!(orch.state().percentage, 0.0);
        assert!(orch.next_event().await.is_none());
        let err = orch.run_until_settled().await.unwrap_err();
        assert!(err.is_cancellation());

        // Nothing left to cancel
        assert!(!orch.cancel_upload());
    }

    #[tokio::test]
    async fn test_single_active_transfer() {
        let (mut orch, sessions, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();

        assert!(matches!(orch.start_upload().await, Err(UploadError::Busy)));
        assert!(matches!(orch.select_file(video()), Err(UploadError::Busy)));
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transfers.count(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_error_uses_new_session() {
        let (mut orch, sessions, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();

        transfers.emit(TransferEvent::Error {
            message: "server responded with status 500".to_string(),
        });
        let err = orch.run_until_settled().await.unwrap_err();
        assert!(matches!(err, UploadError::Transfer(_)));
        assert_eq!(err.to_string(), "Upload error: server responded with status 500");
        assert_eq!(orch.state().status, TransferStatus::Error);
        assert_eq!(
            orch.state().error_message.as_deref(),
            Some("Upload error: server responded with status 500")
        );

        orch.start_upload().await.unwrap();
        assert_eq!(orch.state().status, TransferStatus::Uploading);
        assert!(orch.state().error_message.is_none());
        assert_eq!(sessions.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transfers.count(), 2);
    }

    #[tokio::test]
    async fn test_success_requires_new_selection() {
        let (mut orch, _, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();
        transfers.emit(TransferEvent::Success);
        orch.run_until_settled().await.unwrap();

        assert!(matches!(
            orch.start_upload().await,
            Err(UploadError::AlreadyUploaded)
        ));

        orch.select_file(video()).unwrap();
        assert_eq!(orch.state().status, TransferStatus::Idle);
        assert_eq!(orch.state().percentage, 0.0);
        orch.start_upload().await.unwrap();
        assert_eq!(transfers.count(), 2);
    }

    #[tokio::test]
    async fn test_dropped_transfer_is_an_error() {
        let (mut orch, _, transfers) = orchestrator();
        orch.select_file(video()).unwrap();
        orch.start_upload().await.unwrap();

        // Simulate the transfer task going away without a final event
        transfers.started.lock().unwrap().clear();

        let err = orch.run_until_settled().await.unwrap_err();
        assert!(matches!(err, UploadError::Transfer(_)));
        assert_eq!(orch.state().status, TransferStatus::Error);
        assert_eq!(
            orch.state().error_message.as_deref(),
            Some("Upload error: transfer ended unexpectedly")
        );
    }

    #[tokio::test]
    async fn test_outcome_before_any_upload() {
        let (orch, _, _) = orchestrator();
        assert!(orch.outcome().is_ok());
    }
}
