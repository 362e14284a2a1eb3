//! Building blocks for chunked streaming transfers.
//!
//! Nothing in this crate performs network I/O: it accounts for progress,
//! verifies digests, validates requests, formats numbers for humans, and
//! drives retries of operations supplied by the caller.

mod format;
mod hash;
mod progress;
mod retry;
mod validation;

pub use format::{format_bytes, format_duration, format_speed, progress_bar};
pub use hash::{HashReport, HashVerifier, digest_hex};
pub use progress::{ProgressThrottle, SpeedWindow, TransferProgress};
pub use retry::{RetryError, RetryPolicy, retry};
pub use validation::{validate_digest, validate_filename, validate_request, validate_source_url};

use std::time::Duration;

use cloudmirror_protocol::HashAlgorithm;

/// Default chunk size: 10 MiB.
///
/// Resumable upload backends require every chunk but the last to be a
/// multiple of 256 KiB; 10 MiB satisfies that.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Default number of per-chunk speed samples kept for the average.
pub const DEFAULT_SPEED_SAMPLES: usize = 10;

/// Default percent step between two progress events.
pub const DEFAULT_PROGRESS_THRESHOLD: u8 = 1;

/// Minimum interval between progress events when the total size is unknown.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("invalid {algorithm} digest: {reason}")]
    InvalidDigest {
        algorithm: HashAlgorithm,
        reason: String,
    },
}
