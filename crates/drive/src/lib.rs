//! Upload side of a mirror transfer.
//!
//! [`UploadTarget`] is the seam the orchestrator drives; the production
//! implementation is [`ResumableUploadClient`], authenticated by any
//! [`CredentialProvider`].

pub mod auth;
pub mod client;
pub mod error;
pub mod session;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

pub use auth::{CredentialProvider, DEFAULT_TOKEN_URI, RefreshTokenConfig, RefreshTokenProvider, StaticToken};
pub use client::{DEFAULT_API_BASE, ResumableUploadClient, UploadClientConfig};
pub use error::{AuthError, UploadError};
pub use session::{ChunkAck, DriveFile, SessionRequest, UploadSession};

/// Destination of a chunked upload.
///
/// `push_chunk` borrows the session mutably, so one session can only ever
/// have one chunk in flight.
pub trait UploadTarget: Send + Sync {
    /// Creates a session for `request`. Sends no object bytes.
    fn initiate<'a>(
        &'a self,
        request: &'a SessionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, UploadError>> + Send + 'a>>;

    /// Sends the next chunk; its range starts at `session.bytes_acknowledged()`.
    fn push_chunk<'a>(
        &'a self,
        session: &'a mut UploadSession,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, UploadError>> + Send + 'a>>;

    /// Completes a session whose chunks did not return the created object.
    fn finalize<'a>(
        &'a self,
        session: &'a mut UploadSession,
    ) -> Pin<Box<dyn Future<Output = Result<DriveFile, UploadError>> + Send + 'a>>;
}
