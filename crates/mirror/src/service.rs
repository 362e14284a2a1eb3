//! Concurrent transfer service.
//!
//! Each transfer runs on its own task with its own cancellation token.
//! Transfers share only the source, the upload target (and through it the
//! credential provider) and the registry.

use std::sync::Arc;

use cloudmirror_drive::UploadTarget;
use cloudmirror_protocol::{ProgressEvent, TransferRequest, TransferResult};
use cloudmirror_source::ChunkSource;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::registry::{RegistryGuard, TransferRegistry};
use crate::transfer::TransferOrchestrator;
use crate::types::{ActiveTransfer, TransferSettings};

/// Capacity of each transfer's progress channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A started transfer.
pub struct TransferHandle {
    pub id: Uuid,
    pub events: mpsc::Receiver<ProgressEvent>,
    pub join: JoinHandle<TransferResult>,
}

/// Starts and tracks transfers.
pub struct MirrorService {
    source: Arc<dyn ChunkSource>,
    target: Arc<dyn UploadTarget>,
    settings: TransferSettings,
    registry: Arc<TransferRegistry>,
}

impl MirrorService {
    pub fn new(
        source: Arc<dyn ChunkSource>,
        target: Arc<dyn UploadTarget>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            registry: Arc::new(TransferRegistry::new()),
        }
    }

    /// Spawns a transfer. Must be called within a tokio runtime.
    ///
    /// The transfer leaves [`active`](Self::active) before its terminal
    /// event is delivered. Events need not be drained before awaiting
    /// `join`: progress events that do not fit the channel are dropped,
    /// and the terminal event always has room.
    pub fn start(&self, request: TransferRequest) -> TransferHandle {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.registry
            .insert(id, request.filename.clone(), cancel.clone());
        let guard = RegistryGuard::new(self.registry.clone(), id);

        let (events_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = TransferOrchestrator::new(
            self.source.clone(),
            self.target.clone(),
            self.settings.clone(),
            cancel,
        )
        .with_registration(guard);

        info!(%id, file = %request.filename, "transfer registered");
        let join = tokio::spawn(async move {
            let result = orchestrator.run(request, events_tx).await;
            info!(%id, state = ?result.state, "transfer finished");
            result
        });

        TransferHandle { id, events, join }
    }

    /// Cancels a running transfer. Returns `false` for unknown ids.
    pub fn cancel(&self, id: &Uuid) -> bool {
        self.registry.cancel(id)
    }

    /// Cancels every running transfer.
    pub fn cancel_all(&self) -> usize {
        let count = self.registry.cancel_all();
        if count > 0 {
            info!(count, "cancelling all transfers");
        }
        count
    }

    /// Running transfers, oldest first.
    pub fn active(&self) -> Vec<ActiveTransfer> {
        self.registry.list()
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }
}
