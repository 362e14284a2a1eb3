//! Mirror error types.

use cloudmirror_drive::UploadError;
use cloudmirror_protocol::ErrorKind;
use cloudmirror_source::FetchError;
use cloudmirror_transfer::TransferError;

/// Errors that end a transfer.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("invalid request: {0}")]
    Invalid(#[from] TransferError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("could not start upload: {0}")]
    UploadInit(#[source] UploadError),

    #[error("upload failed: {0}")]
    Upload(#[source] UploadError),

    #[error("cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Classification reported on the transfer result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::InvalidRequest,
            Self::Fetch(_) => ErrorKind::PermanentFetch,
            Self::UploadInit(_) => ErrorKind::UploadInit,
            Self::Upload(_) => ErrorKind::UploadChunk,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let exhausted = MirrorError::Fetch(FetchError::RetriesExhausted {
            attempts: 4,
            last: Box::new(FetchError::Timeout("read".into())),
        });
        assert_eq!(exhausted.kind(), ErrorKind::PermanentFetch);

        let init = MirrorError::UploadInit(UploadError::MissingLocation);
        assert_eq!(init.kind(), ErrorKind::UploadInit);

        let chunk = MirrorError::Upload(UploadError::Chunk {
            status: 500,
            body: String::new(),
        });
        assert_eq!(chunk.kind(), ErrorKind::UploadChunk);

        let invalid = MirrorError::Invalid(TransferError::InvalidFilename("".into()));
        assert_eq!(invalid.kind(), ErrorKind::InvalidRequest);

        assert_eq!(MirrorError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn messages_include_cause() {
        let err = MirrorError::Upload(UploadError::Chunk {
            status: 503,
            body: "try later".into(),
        });
        assert_eq!(
            err.to_string(),
            "upload failed: chunk rejected with HTTP 503: try later"
        );
    }
}
