use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// MIME type used when the caller does not supply one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Digest algorithms supported by the hash verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Lowercase name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Debug, thiserror::Error)]
#[error("unsupported hash algorithm: {0}")]
pub struct ParseAlgorithmError(pub String);

impl FromStr for HashAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(ParseAlgorithmError(s.to_string())),
        }
    }
}

/// Verification outcome for one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashOutcome {
    Valid,
    Invalid,
    /// No expected digest was supplied for this algorithm.
    Absent,
}

/// Per-algorithm verification outcomes of a finished transfer.
pub type HashVerification = BTreeMap<HashAlgorithm, HashOutcome>;

/// Machine-matchable classification of a terminal outcome or warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, reset or throttling status on the initial source connection.
    TransientNetwork,
    /// Source could not be read: bad status, retries exhausted, or stream dropped.
    PermanentFetch,
    /// The upload session could not be created.
    UploadInit,
    /// A chunk push was rejected; the remote object is left incomplete.
    UploadChunk,
    /// The transfer was cancelled by the caller.
    Cancelled,
    /// Upload succeeded but a digest did not match.
    HashMismatch,
    /// The request was rejected before anything was contacted.
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TransientNetwork => "transient_network",
            Self::PermanentFetch => "permanent_fetch",
            Self::UploadInit => "upload_init",
            Self::UploadChunk => "upload_chunk",
            Self::Cancelled => "cancelled",
            Self::HashMismatch => "hash_mismatch",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    Initiating,
    Transferring,
    Completed,
    Failed,
    Cancelled,
}

impl TransferState {
    /// Returns `true` once the transfer can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Idle, Initiating) => true,
            // Validation failures and early cancellation end before initiation.
            (Idle, Failed | Cancelled) => true,
            (Initiating, Transferring | Failed | Cancelled) => true,
            (Transferring, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}
