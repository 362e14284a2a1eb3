//! Source error types.

/// Errors produced while probing or reading a source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("source returned HTTP {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("source unavailable after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("source stream failed: {0}")]
    Stream(String),

    #[error("source is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
}

impl FetchError {
    /// Returns `true` for failures worth retrying on the initial connection:
    /// timeouts, connection failures and HTTP 429/503/504.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Status { status } => matches!(status, 429 | 503 | 504),
            _ => false,
        }
    }

    /// Classifies a `reqwest` error raised before the body started streaming.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Connection(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
