//! Caller-facing types for cloudmirror transfers.
//!
//! Front ends (chat bots, webhook handlers, the CLI) build a
//! [`TransferRequest`], consume [`ProgressEvent`]s while the transfer runs,
//! and receive exactly one [`TransferResult`] at the end.

pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{ProgressEvent, TransferRequest, TransferResult};
pub use types::{
    DEFAULT_MIME_TYPE, ErrorKind, HashAlgorithm, HashOutcome, HashVerification,
    ParseAlgorithmError, TransferState,
};
