//! Upload and credential error types.

/// Errors obtaining an access token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("no credentials configured")]
    Missing,
}

/// Errors produced by the resumable upload client.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload session rejected with HTTP {status}: {body}")]
    Init { status: u16, body: String },

    #[error("upload session response had no usable Location header")]
    MissingLocation,

    #[error("chunk rejected with HTTP {status}: {body}")]
    Chunk { status: u16, body: String },

    #[error("credential error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("range {start}-{end} exceeds declared size {total}")]
    RangeOverflow { start: u64, end: u64, total: u64 },

    #[error("upload session already completed")]
    SessionComplete,

    #[error("refusing to push an empty chunk")]
    EmptyChunk,
}
