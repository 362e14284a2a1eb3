//! Data types for the mirror flow.

use std::time::{Duration, Instant};

use cloudmirror_transfer::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_PROGRESS_THRESHOLD, DEFAULT_SPEED_SAMPLES};
use uuid::Uuid;

/// Per-transfer tuning shared by every transfer a service starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    /// Speed samples kept for the moving average.
    pub speed_samples: usize,
    /// Percent step between two progress events.
    pub progress_threshold: u8,
    /// Minimum gap between progress events when the size is unknown.
    pub progress_interval: Duration,
    /// Folder new objects are created in.
    pub parent_folder: Option<String>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            speed_samples: DEFAULT_SPEED_SAMPLES,
            progress_threshold: DEFAULT_PROGRESS_THRESHOLD,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            parent_folder: None,
        }
    }
}

/// Snapshot of a running transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTransfer {
    pub id: Uuid,
    pub filename: String,
    pub started_at: Instant,
}
