//! Single-transfer orchestrator.
//!
//! Drives one transfer through `Idle -> Initiating -> Transferring` and
//! into exactly one terminal state. The pipeline is strictly sequential:
//! each chunk is fetched, hashed, uploaded and reported before the next
//! one is pulled.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use cloudmirror_drive::{ChunkAck, DriveFile, SessionRequest, UploadTarget};
use cloudmirror_protocol::{
    ErrorKind, HashOutcome, ProgressEvent, TransferRequest, TransferResult, TransferState,
};
use cloudmirror_source::ChunkSource;
use cloudmirror_transfer::{
    HashReport, HashVerifier, ProgressThrottle, TransferProgress, format_bytes, validate_request,
};
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::MirrorError;
use crate::registry::RegistryGuard;
use crate::state::StateMachine;
use crate::types::TransferSettings;

struct Completion {
    file: DriveFile,
    report: HashReport,
}

/// Runs one transfer from source to upload target.
pub struct TransferOrchestrator {
    source: Arc<dyn ChunkSource>,
    target: Arc<dyn UploadTarget>,
    settings: TransferSettings,
    cancel: CancellationToken,
    state: StateMachine,
    progress: TransferProgress,
    started_at: Instant,
    registration: Option<RegistryGuard>,
}

impl TransferOrchestrator {
    pub fn new(
        source: Arc<dyn ChunkSource>,
        target: Arc<dyn UploadTarget>,
        settings: TransferSettings,
        cancel: CancellationToken,
    ) -> Self {
        let progress = TransferProgress::new(None, settings.speed_samples);
        Self {
            source,
            target,
            settings,
            cancel,
            state: StateMachine::new(),
            progress,
            started_at: Instant::now(),
            registration: None,
        }
    }

    /// Attaches the registry entry released right before the terminal event.
    pub(crate) fn with_registration(mut self, guard: RegistryGuard) -> Self {
        self.registration = Some(guard);
        self
    }

    /// Runs the transfer to completion.
    ///
    /// Progress events go to `events_tx`; the last one is terminal. A slot
    /// for the terminal event is reserved up front, so a receiver that is
    /// not being drained never blocks the transfer. A dropped receiver does
    /// not stop the transfer either. Never fails: every outcome is described
    /// by the returned result.
    pub async fn run(
        mut self,
        request: TransferRequest,
        events_tx: mpsc::Sender<ProgressEvent>,
    ) -> TransferResult {
        self.started_at = Instant::now();
        let filename = request.filename.clone();
        let terminal_slot = events_tx.clone().try_reserve_owned().ok();

        match self.execute(&request, &events_tx).await {
            Ok(completion) => self.complete(&request, completion, terminal_slot),
            Err(MirrorError::Cancelled) => {
                self.enter(TransferState::Cancelled);
                info!(
                    file = %filename,
                    bytes = self.progress.bytes_transferred(),
                    "transfer cancelled"
                );
                let mut event = self.snapshot(&filename);
                event.cancelled = true;
                self.finish(terminal_slot, event);
                TransferResult::cancelled(self.progress.bytes_transferred())
            }
            Err(e) => {
                self.enter(TransferState::Failed);
                let message = e.to_string();
                error!(file = %filename, kind = %e.kind(), error = %message, "transfer failed");
                let mut event = self.snapshot(&filename);
                event.error = Some(message.clone());
                self.finish(terminal_slot, event);
                TransferResult::failed(e.kind(), self.progress.bytes_transferred(), message)
            }
        }
    }

    async fn execute(
        &mut self,
        request: &TransferRequest,
        events_tx: &mpsc::Sender<ProgressEvent>,
    ) -> Result<Completion, MirrorError> {
        validate_request(request)?;
        self.check_cancelled()?;

        // 1. Open the source
        self.enter(TransferState::Initiating);
        info!(file = %request.filename, url = %request.source_url, "transfer starting");
        let mut stream = self
            .until_cancelled(self.source.open(&request.source_url))
            .await??;
        self.check_cancelled()?;

        let total = request.expected_size.or(stream.content_length());
        if let (Some(expected), Some(advertised)) = (request.expected_size, stream.content_length())
        {
            if expected != advertised {
                warn!(expected, advertised, "source size differs from expected size");
            }
        }
        self.progress.set_total_bytes(total);

        // 2. Create the upload session
        let session_request = SessionRequest {
            name: request.filename.clone(),
            mime_type: request.mime_type.clone(),
            parent: self.settings.parent_folder.clone(),
            total_size: total,
        };
        let mut session = self
            .target
            .initiate(&session_request)
            .await
            .map_err(MirrorError::UploadInit)?;

        // 3. Stream chunks
        self.enter(TransferState::Transferring);
        let mut verifier = HashVerifier::new(&request.expected_hashes);
        let mut throttle =
            ProgressThrottle::new(self.settings.progress_threshold, self.settings.progress_interval);
        let mut created = None;

        loop {
            self.check_cancelled()?;

            let chunk_started = Instant::now();
            let Some(chunk) = stream.next_chunk().await? else {
                break;
            };
            verifier.update(&chunk);

            let len = chunk.len() as u64;
            let ack = self
                .target
                .push_chunk(&mut session, chunk)
                .await
                .map_err(MirrorError::Upload)?;
            if let ChunkAck::Completed(file) = ack {
                created = Some(file);
            }

            self.progress.record_chunk(len, chunk_started.elapsed());
            debug!(
                bytes = self.progress.bytes_transferred(),
                total = ?total,
                speed_bps = self.progress.average_speed(),
                "chunk uploaded"
            );

            if throttle.should_emit(self.progress.percent()) {
                self.emit(events_tx, self.progress.event(&request.filename));
            }
        }

        // 4. Finalize if no chunk response carried the object
        let file = match created {
            Some(file) => file,
            None => self
                .target
                .finalize(&mut session)
                .await
                .map_err(MirrorError::Upload)?,
        };

        Ok(Completion {
            file,
            report: verifier.finalize(),
        })
    }

    fn complete(
        &mut self,
        request: &TransferRequest,
        completion: Completion,
        terminal_slot: Option<OwnedPermit<ProgressEvent>>,
    ) -> TransferResult {
        self.enter(TransferState::Completed);
        let bytes = self.progress.bytes_transferred();

        let mut event = self.snapshot(&request.filename);
        event.percent = 100;
        event.done = true;
        event.eta_seconds = Some(0.0);
        self.finish(terminal_slot, event);

        let mut message = format!(
            "uploaded {} ({})",
            request.filename,
            format_bytes(Some(bytes))
        );
        if let Some(link) = &completion.file.web_view_link {
            message.push_str(&format!(", view at {link}"));
        }
        info!(
            file = %request.filename,
            id = %completion.file.id,
            bytes,
            elapsed_secs = self.started_at.elapsed().as_secs_f64(),
            "transfer completed"
        );

        let mut result = TransferResult::completed(completion.file.id, bytes, message);
        let report = completion.report;
        for algorithm in report.mismatches() {
            let expected = request
                .expected_hashes
                .get(&algorithm)
                .map(String::as_str)
                .unwrap_or_default();
            let actual = report
                .actual
                .get(&algorithm)
                .map(String::as_str)
                .unwrap_or_default();
            warn!(%algorithm, expected, actual, "digest mismatch");
            result.warnings.push(format!(
                "{}: {algorithm} expected {expected}, got {actual}",
                ErrorKind::HashMismatch
            ));
        }
        if !report.outcomes.is_empty() {
            debug!(
                valid = report
                    .outcomes
                    .values()
                    .filter(|o| **o == HashOutcome::Valid)
                    .count(),
                "hash verification finished"
            );
            result.hash_verification = Some(report.outcomes);
        }
        result
    }

    /// Event describing the current progress, with no terminal flag set.
    fn snapshot(&self, filename: &str) -> ProgressEvent {
        let mut event = self.progress.event(filename);
        event.elapsed_seconds = self.started_at.elapsed().as_secs_f64();
        event
    }

    /// Unregisters the transfer, then delivers the terminal event through
    /// the reserved slot.
    fn finish(&mut self, terminal_slot: Option<OwnedPermit<ProgressEvent>>, event: ProgressEvent) {
        drop(self.registration.take());
        match terminal_slot {
            Some(permit) => {
                permit.send(event);
            }
            None => debug!("progress receiver gone, terminal event dropped"),
        }
    }

    /// Sends a non-terminal event without waiting on a full channel.
    fn emit(&self, events_tx: &mpsc::Sender<ProgressEvent>, mut event: ProgressEvent) {
        event.elapsed_seconds = self.started_at.elapsed().as_secs_f64();
        if let Err(mpsc::error::TrySendError::Full(_)) = events_tx.try_send(event) {
            debug!("progress channel full, event dropped");
        }
    }

    fn enter(&mut self, next: TransferState) {
        if let Err(e) = self.state.transition(next) {
            warn!(error = %e, "ignored state transition");
        }
    }

    fn check_cancelled(&self) -> Result<(), MirrorError> {
        if self.cancel.is_cancelled() {
            Err(MirrorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Races `fut` against cancellation.
    async fn until_cancelled<T>(&self, fut: impl Future<Output = T>) -> Result<T, MirrorError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MirrorError::Cancelled),
            value = fut => Ok(value),
        }
    }
}
