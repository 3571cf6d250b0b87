use crate::client::backoff::BackoffPolicy;
use crate::client::error::UploadError;
use crate::client::sleeper::{Sleeper, TokioSleeper};
use crate::client::transport::{HttpTransport, TransportError, UploadTransport};
use crate::client::{FilePayload, UploadEvent, UploadReceipt, UploadStatus};
use crate::config::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PROGRESS_STEP: u8 = 10;
const PROGRESS_CEILING: u8 = 90;

/// Per-upload bookkeeping, dropped when the upload terminates.
#[derive(Debug, Default)]
struct RetryState {
    /// Retries performed so far (0 while on the first attempt).
    retries: u32,
    last_error: Option<TransportError>,
    backoff_elapsed: Duration,
}

struct Emitter<'a>(Option<&'a mpsc::UnboundedSender<UploadEvent>>);

impl Emitter<'_> {
    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = self.0 {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn status(&self, status: UploadStatus) {
        self.emit(UploadEvent::Status(status));
    }
}

/// Retrying upload client.
///
/// Each call to [`UploadClient::upload`] owns its retry state, so one client
/// can drive any number of uploads concurrently.
#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn UploadTransport>,
    sleeper: Arc<dyn Sleeper>,
    config: RetryConfig,
}

impl UploadClient {
    pub fn new(transport: Arc<dyn UploadTransport>, config: RetryConfig) -> Self {
        Self::with_sleeper(transport, Arc::new(TokioSleeper), config)
    }

    pub fn with_sleeper(
        transport: Arc<dyn UploadTransport>,
        sleeper: Arc<dyn Sleeper>,
        config: RetryConfig,
    ) -> Self {
        Self {
            transport,
            sleeper,
            config,
        }
    }

    /// HTTP client for the endpoint at `base_url`.
    pub fn http(base_url: &str, config: RetryConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(base_url)), config)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Uploads without observers or cancellation.
    pub async fn upload(&self, file: &FilePayload) -> Result<UploadReceipt, UploadError> {
        self.upload_with(file, None, &CancellationToken::new()).await
    }

    /// Uploads `files` one after another, each with its own retry budget.
    pub async fn upload_all(
        &self,
        files: &[FilePayload],
    ) -> Vec<Result<UploadReceipt, UploadError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.upload(file).await);
        }
        results
    }

    /// Runs the upload on a background task and hands back its event stream.
    pub fn spawn(&self, file: FilePayload) -> UploadTask {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let client = self.clone();
        let token = cancel.clone();
        let handle =
            tokio::spawn(async move { client.upload_with(&file, Some(&tx), &token).await });

        UploadTask {
            events,
            cancel,
            handle,
        }
    }

    /// Drives `file` to a terminal outcome.
    ///
    /// Events go to `events` in order: `Pending`, then per attempt `Uploading`
    /// and progress 0..=90, then either `Retrying` plus a `Retry` event, or
    /// progress 100 and `Success`, or `Error`.
    pub async fn upload_with(
        &self,
        file: &FilePayload,
        events: Option<&mpsc::UnboundedSender<UploadEvent>>,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        let emitter = Emitter(events);
        let backoff = BackoffPolicy::from(&self.config);
        let max_retries = self.config.max_retries;
        let request_id = file.request_id();
        let mut state = RetryState::default();

        emitter.status(UploadStatus::Pending);

        let result = loop {
            let attempt = state.retries + 1;
            emitter.status(UploadStatus::Uploading);

            if let Err(err) = self.simulate_progress(attempt, &emitter, cancel).await {
                break Err(err);
            }

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(UploadError::Cancelled),
                sent = tokio::time::timeout(
                    self.config.request_timeout,
                    self.transport.send(&request_id, file),
                ) => sent,
            };
            let sent = sent.unwrap_or(Err(TransportError::Timeout(self.config.request_timeout)));

            let err = match sent {
                Ok(response) => {
                    emitter.emit(UploadEvent::Progress {
                        attempt,
                        percent: 100,
                    });
                    break Ok(UploadReceipt {
                        duplicate: response.message.is_some(),
                        file_id: response.file_id,
                        file: response.file,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::warn!(%request_id, "Upload rejected: {}", err);
                break Err(UploadError::rejected(&err));
            }

            state.retries += 1;
            state.last_error = Some(err.clone());
            if state.retries > max_retries {
                break Err(UploadError::RetriesExhausted {
                    retries: max_retries,
                    last_error: err,
                });
            }

            let delay = backoff.delay(state.retries);
            tracing::info!(
                %request_id,
                "Retry {}/{} after {}ms: {}",
                state.retries,
                max_retries,
                delay.as_millis(),
                err
            );
            emitter.status(UploadStatus::Retrying);
            emitter.emit(UploadEvent::Retry {
                retry: state.retries,
                delay,
                error: err,
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(UploadError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
            state.backoff_elapsed += delay;
        };

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    %request_id,
                    file_id = %receipt.file_id,
                    attempts = receipt.attempts,
                    duplicate = receipt.duplicate,
                    "Upload finished"
                );
                emitter.status(UploadStatus::Success);
            }
            Err(err) => {
                tracing::warn!(
                    %request_id,
                    retries = state.retries,
                    backoff_ms = state.backoff_elapsed.as_millis() as u64,
                    last_error = ?state.last_error,
                    "{}",
                    err
                );
                emitter.status(UploadStatus::Error);
            }
        }

        result
    }

    /// Emits 0, 10, .., 90 for `attempt`, pausing one tick between steps.
    async fn simulate_progress(
        &self,
        attempt: u32,
        emitter: &Emitter<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let tick = self.config.progress_tick;
        for percent in (0..=PROGRESS_CEILING).step_by(PROGRESS_STEP as usize) {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            emitter.emit(UploadEvent::Progress { attempt, percent });
            if !tick.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                    _ = self.sleeper.sleep(tick) => {}
                }
            }
        }
        Ok(())
    }
}

/// A spawned upload: its ordered event stream, a cancel switch and the
/// eventual outcome.
pub struct UploadTask {
    pub events: mpsc::UnboundedReceiver<UploadEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<UploadReceipt, UploadError>>,
}

impl UploadTask {
    /// Stops retrying at the next wait point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the outcome. A panic inside the upload is re-raised here.
    pub async fn join(self) -> Result<UploadReceipt, UploadError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                tracing::error!("Upload task panicked");
                std::panic::resume_unwind(e.into_panic())
            }
            Err(e) => {
                tracing::warn!("Upload task aborted: {}", e);
                Err(UploadError::Cancelled)
            }
        }
    }
}
