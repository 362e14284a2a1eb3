use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    DEFAULT_MIME_TYPE, ErrorKind, HashAlgorithm, HashVerification, TransferState,
};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A request to mirror one remote object into storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_url: String,
    pub filename: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_size: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expected_hashes: BTreeMap<HashAlgorithm, String>,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_string()
}

impl TransferRequest {
    /// Creates a request with the default MIME type and no expectations.
    pub fn new(source_url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            filename: filename.into(),
            mime_type: default_mime_type(),
            expected_size: None,
            expected_hashes: BTreeMap::new(),
        }
    }

    /// Sets the MIME type. Empty strings keep the default.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        if !mime_type.trim().is_empty() {
            self.mime_type = mime_type;
        }
        self
    }

    /// Sets the expected total size in bytes.
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Adds an expected hex digest for `algorithm`.
    pub fn with_expected_hash(mut self, algorithm: HashAlgorithm, hex: impl Into<String>) -> Self {
        self.expected_hashes.insert(algorithm, hex.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress notification emitted while a transfer runs.
///
/// Exactly one event per transfer is terminal: `done`, `cancelled` or
/// `error` is set on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub filename: String,
    /// Whole percent complete; stays 0 while the total size is unknown.
    pub percent: u8,
    pub bytes_transferred: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    pub speed_bps: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub done: bool,
}

impl ProgressEvent {
    /// Returns `true` if this is the last event of its transfer.
    pub fn is_terminal(&self) -> bool {
        self.done || self.cancelled || self.error.is_some()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Final outcome of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    pub state: TransferState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_verification: Option<HashVerification>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub bytes_transferred: u64,
}

impl TransferResult {
    /// Builds a successful result.
    pub fn completed(object_id: String, bytes_transferred: u64, message: String) -> Self {
        Self {
            success: true,
            state: TransferState::Completed,
            object_id: Some(object_id),
            hash_verification: None,
            message,
            error_kind: None,
            warnings: Vec::new(),
            bytes_transferred,
        }
    }

    /// Builds a failed result.
    pub fn failed(kind: ErrorKind, bytes_transferred: u64, message: String) -> Self {
        Self {
            success: false,
            state: TransferState::Failed,
            object_id: None,
            hash_verification: None,
            message,
            error_kind: Some(kind),
            warnings: Vec::new(),
            bytes_transferred,
        }
    }

    /// Builds a cancelled result.
    pub fn cancelled(bytes_transferred: u64) -> Self {
        Self {
            success: false,
            state: TransferState::Cancelled,
            object_id: None,
            hash_verification: None,
            message: "transfer cancelled".into(),
            error_kind: Some(ErrorKind::Cancelled),
            warnings: Vec::new(),
            bytes_transferred,
        }
    }

    /// Returns `true` if any requested digest did not match.
    pub fn has_hash_mismatch(&self) -> bool {
        self.hash_verification
            .as_ref()
            .is_some_and(|v| v.values().any(|o| *o == crate::HashOutcome::Invalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashOutcome;

    #[test]
    fn request_defaults_mime_type() {
        let req = TransferRequest::new("https://example.com/a.iso", "a.iso");
        assert_eq!(req.mime_type, DEFAULT_MIME_TYPE);
        assert!(req.expected_size.is_none());
        assert!(req.expected_hashes.is_empty());
    }

    #[test]
    fn request_blank_mime_keeps_default() {
        let req = TransferRequest::new("https://example.com/a", "a").with_mime_type("  ");
        assert_eq!(req.mime_type, DEFAULT_MIME_TYPE);
    }

    #[test]
    fn request_json_uses_camel_case() {
        let req = TransferRequest::new("https://example.com/a.zip", "a.zip")
            .with_expected_size(42)
            .with_expected_hash(HashAlgorithm::Md5, "abc");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""sourceUrl":"https://example.com/a.zip""#));
        assert!(json.contains(r#""expectedSize":42"#));
        assert!(json.contains(r#""expectedHashes":{"md5":"abc"}"#));
    }

    #[test]
    fn request_minimal_json() {
        let json = r#"{"sourceUrl":"https://example.com/x","filename":"x"}"#;
        let req: TransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.mime_type, DEFAULT_MIME_TYPE);
        assert!(req.expected_hashes.is_empty());
    }

    #[test]
    fn request_rejects_unknown_algorithm() {
        let json = r#"{"sourceUrl":"u","filename":"x","expectedHashes":{"crc":"00"}}"#;
        assert!(serde_json::from_str::<TransferRequest>(json).is_err());
    }

    #[test]
    fn progress_event_terminal_flags() {
        let mut ev = ProgressEvent {
            filename: "f".into(),
            percent: 40,
            bytes_transferred: 40,
            total_bytes: Some(100),
            speed_bps: 10.0,
            eta_seconds: Some(6.0),
            elapsed_seconds: 4.0,
            cancelled: false,
            error: None,
            done: false,
        };
        assert!(!ev.is_terminal());
        ev.cancelled = true;
        assert!(ev.is_terminal());
    }

    #[test]
    fn result_constructors() {
        let ok = TransferResult::completed("id1".into(), 10, "ok".into());
        assert!(ok.success);
        assert_eq!(ok.state, TransferState::Completed);
        assert_eq!(ok.object_id.as_deref(), Some("id1"));

        let failed = TransferResult::failed(ErrorKind::UploadChunk, 5, "boom".into());
        assert!(!failed.success);
        assert_eq!(failed.error_kind, Some(ErrorKind::UploadChunk));

        let cancelled = TransferResult::cancelled(3);
        assert_eq!(cancelled.state, TransferState::Cancelled);
        assert_eq!(cancelled.error_kind, Some(ErrorKind::Cancelled));
    }

    #[test]
    fn result_detects_mismatch() {
        let mut result = TransferResult::completed("id".into(), 1, "ok".into());
        assert!(!result.has_hash_mismatch());

        let mut verification = HashVerification::new();
        verification.insert(HashAlgorithm::Md5, HashOutcome::Valid);
        verification.insert(HashAlgorithm::Sha1, HashOutcome::Invalid);
        result.hash_verification = Some(verification);
        assert!(result.has_hash_mismatch());
    }
}
