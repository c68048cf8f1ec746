/// tus 1.0 resumable upload client.
///
/// Uploads a local file to an upload URL that was created out of band (Vimeo
/// creates it for us), so only the core protocol is needed: `HEAD` to learn
/// the server offset, then sequential `PATCH` chunks from that offset.
/// Progress, failure and completion are reported as [`TransferEvent`]s over
/// an mpsc channel.
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::TusError;
use crate::transfer_state::TransferEvent;

pub const TUS_VERSION: &str = "1.0.0";
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Default chunk size for PATCH requests (8 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Delays between attempts after a transient failure.
pub const DEFAULT_RETRY_DELAYS: [Duration; 5] = [
    Duration::from_secs(0),
    Duration::from_secs(3),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(20),
];

/// Everything needed to push one file to one upload URL.
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub path: PathBuf,
    pub upload_url: String,
    pub size: u64,
    pub metadata: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub retry_delays: Vec<Duration>,
}

impl TransferJob {
    pub fn new(path: impl Into<PathBuf>, upload_url: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            upload_url: upload_url.into(),
            size,
            metadata: Vec::new(),
            headers: Vec::new(),
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// `Upload-Metadata` value: comma separated `key base64(value)` pairs.
    pub fn encoded_metadata(&self) -> Option<String> {
        if self.metadata.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .metadata
            .iter()
            .map(|(k, v)| format!("{} {}", k, STANDARD.encode(v.as_bytes())))
            .collect();
        Some(pairs.join(","))
    }
}

/// Control surface of a running transfer.
#[derive(Debug, Clone)]
pub struct TransferHandle {
    cancel: CancellationToken,
}

impl TransferHandle {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Stop sending chunks. No success or error event follows an abort.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Something that can run a [`TransferJob`] in the background.
pub trait TransferClient: Send + Sync {
    fn start(&self, job: TransferJob, events: mpsc::UnboundedSender<TransferEvent>) -> TransferHandle;
}

/// reqwest-backed tus client.
#[derive(Clone)]
pub struct TusClient {
    http: reqwest::Client,
    chunk_size: u64,
}

impl TusClient {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for TusClient {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl TransferClient for TusClient {
    fn start(&self, job: TransferJob, events: mpsc::UnboundedSender<TransferEvent>) -> TransferHandle {
        let cancel = CancellationToken::new();
        let upload = TusUpload {
            http: self.http.clone(),
            chunk_size: self.chunk_size,
            job,
            events,
            cancel: cancel.clone(),
        };
        tokio::spawn(upload.run());
        TransferHandle::new(cancel)
    }
}

/// One running upload, owned by its tokio task.
struct TusUpload {
    http: reqwest::Client,
    chunk_size: u64,
    job: TransferJob,
    events: mpsc::UnboundedSender<TransferEvent>,
    cancel: CancellationToken,
}

impl TusUpload {
    async fn run(self) {
        info!(
            "Starting tus upload of {:?} ({} bytes)",
            self.job.path, self.job.size
        );

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Upload of {:?} aborted", self.job.path);
                return;
            }
            result = self.transfer() => result,
        };

        if self.cancel.is_cancelled() {
            return;
        }

        let event = match result {
            Ok(()) => {
                info!("Upload of {:?} complete", self.job.path);
                TransferEvent::Success
            }
            Err(e) => {
                warn!("Upload of {:?} failed: {}", self.job.path, e);
                TransferEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        let _ = self.events.send(event);
    }

    /// Drive the upload to completion, retrying transient failures.
    async fn transfer(&self) -> Result<(), TusError> {
        let mut file = File::open(&self.job.path).await?;
        let mut offset: Option<u64> = None;
        let mut attempt = 0usize;

        loop {
            match self.step(&mut file, &mut offset).await {
                Ok(true) => return Ok(()),
                Ok(false) => attempt = 0,
                Err(e) => {
                    let delay = match self.job.retry_delays.get(attempt) {
                        Some(delay) if e.is_retriable() => *delay,
                        _ => return Err(e),
                    };
                    attempt += 1;
                    warn!(
                        "Transient upload failure ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.job.retry_delays.len(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    // Resync with the server before sending more bytes
                    offset = None;
                }
            }
        }
    }

    /// Send one chunk. Returns `true` once the server holds the whole file.
    async fn step(&self, file: &mut File, offset: &mut Option<u64>) -> Result<bool, TusError> {
        let current = match *offset {
            Some(current) => current,
            None => {
                let current = self.head().await?;
                *offset = Some(current);
                self.progress(current);
                current
            }
        };

        if current >= self.job.size {
            return Ok(true);
        }

        let len = self.chunk_size.min(self.job.size - current);
        file.seek(SeekFrom::Start(current)).await?;
        let mut chunk = vec![0u8; len as usize];
        file.read_exact(&mut chunk).await?;

        let next = self.patch(current, chunk).await?;
        if next <= current {
            return Err(TusError::OffsetMismatch {
                expected: current + len,
                actual: next,
            });
        }

        *offset = Some(next);
        self.progress(next);
        Ok(next >= self.job.size)
    }

    /// Ask the server how many bytes it already has.
    async fn head(&self) -> Result<u64, TusError> {
        let resp = self
            .http
            .head(&self.job.upload_url)
            .headers(self.base_headers())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TusError::Http {
                status: resp.status().as_u16(),
            });
        }

        let offset = parse_offset(resp.headers())?;
        debug!("Server offset for {:?}: {}", self.job.path, offset);
        Ok(offset)
    }

    async fn patch(&self, offset: u64, chunk: Vec<u8>) -> Result<u64, TusError> {
        let len = chunk.len();
        let mut headers = self.base_headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(OFFSET_OCTET_STREAM));
        headers.insert("upload-offset", HeaderValue::from(offset));
        if let Some(metadata) = self.job.encoded_metadata() {
            if let Ok(value) = HeaderValue::from_str(&metadata) {
                headers.insert("upload-metadata", value);
            }
        }

        let resp = self
            .http
            .patch(&self.job.upload_url)
            .headers(headers)
            .body(chunk)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TusError::Http {
                status: resp.status().as_u16(),
            });
        }

        let next = parse_offset(resp.headers())?;
        debug!("PATCH {} bytes at offset {} -> {}", len, offset, next);
        Ok(next)
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("tus-resumable", HeaderValue::from_static(TUS_VERSION));
        for (name, value) in &self.job.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid upload header {:?}", name),
            }
        }
        headers
    }

    fn progress(&self, bytes_uploaded: u64) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.events.send(TransferEvent::Progress {
            bytes_uploaded,
            bytes_total: self.job.size,
        });
    }
}

fn parse_offset(headers: &HeaderMap) -> Result<u64, TusError> {
    headers
        .get("upload-offset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(TusError::MissingOffset)
}
