//! Upload session state and wire types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UploadError;

/// Parameters for creating a resumable upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub name: String,
    pub mime_type: String,
    /// Folder the object is created in.
    pub parent: Option<String>,
    pub total_size: Option<u64>,
}

/// Object created by a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<u64>,
    /// Browser link to the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

/// Storage APIs encode int64 fields as JSON strings; accept both forms.
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Outcome of a successful chunk push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAck {
    /// Chunk stored; more bytes are expected.
    Accepted,
    /// Upload finished; the object now exists.
    Completed(DriveFile),
}

/// A resumable upload in progress.
///
/// Owned by exactly one transfer. Byte ranges are derived from
/// `bytes_acknowledged`, so chunks can only be pushed in order.
#[derive(Debug, Clone)]
pub struct UploadSession {
    endpoint: String,
    mime_type: String,
    total_size: Option<u64>,
    bytes_acknowledged: u64,
    completed: bool,
}

impl UploadSession {
    pub fn new(endpoint: impl Into<String>, mime_type: impl Into<String>, total_size: Option<u64>) -> Self {
        Self {
            endpoint: endpoint.into(),
            mime_type: mime_type.into(),
            total_size,
            bytes_acknowledged: 0,
            completed: false,
        }
    }

    /// Opaque session URI returned by the storage backend.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn bytes_acknowledged(&self) -> u64 {
        self.bytes_acknowledged
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Inclusive byte range the next chunk of `len` bytes would occupy.
    ///
    /// Fails if the session is complete, the chunk is empty, or the range
    /// runs past the declared total.
    pub fn next_range(&self, len: u64) -> Result<(u64, u64), UploadError> {
        if self.completed {
            return Err(UploadError::SessionComplete);
        }
        if len == 0 {
            return Err(UploadError::EmptyChunk);
        }

        let start = self.bytes_acknowledged;
        let end = start + len - 1;
        if let Some(total) = self.total_size {
            if end >= total {
                return Err(UploadError::RangeOverflow { start, end, total });
            }
        }
        Ok((start, end))
    }

    /// `Content-Range` header value for a chunk spanning `start..=end`.
    pub fn content_range(&self, start: u64, end: u64) -> String {
        match self.total_size {
            Some(total) => format!("bytes {start}-{end}/{total}"),
            None => format!("bytes {start}-{end}/*"),
        }
    }

    /// `Content-Range` header value for an empty finalizing request.
    pub fn finalize_range(&self) -> String {
        format!("bytes */{}", self.bytes_acknowledged)
    }

    /// Records `len` bytes accepted by the backend.
    ///
    /// Called by [`UploadTarget`](crate::UploadTarget) implementations only.
    pub fn acknowledge(&mut self, len: u64) {
        self.bytes_acknowledged += len;
    }

    pub fn mark_complete(&mut self) {
        self.completed = true;
    }
}
