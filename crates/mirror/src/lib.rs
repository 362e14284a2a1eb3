//! Mirror transfers: stream a remote object into a resumable upload.
//!
//! This crate holds the transfer logic only. Sources and upload targets
//! are supplied as trait objects ([`ChunkSource`](cloudmirror_source::ChunkSource)
//! and [`UploadTarget`](cloudmirror_drive::UploadTarget)), so the same
//! pipeline runs against HTTP in production and in-memory mocks in tests.
//!
//! # Pipeline
//!
//! 1. **Validate** the request
//! 2. **Open** the source, retrying the initial connection
//! 3. **Initiate** the upload session
//! 4. **Stream** chunks: fetch, hash, push, report
//! 5. **Finalize** the session if no chunk completed it, then verify hashes

pub mod error;
pub mod registry;
pub mod service;
pub mod state;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::MirrorError;
pub use registry::TransferRegistry;
pub use service::{EVENT_CHANNEL_CAPACITY, MirrorService, TransferHandle};
pub use state::{IllegalTransition, StateMachine};
pub use transfer::TransferOrchestrator;
pub use types::{ActiveTransfer, TransferSettings};
