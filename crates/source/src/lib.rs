//! Source side of a mirror transfer.
//!
//! A [`ChunkSource`] opens a remote object and hands back a lazy, finite
//! [`ChunkStream`] of fixed-size chunks. The HTTP implementation retries
//! the initial connection on transient failures; a stream that breaks
//! after it started is never resumed.

pub mod error;
pub mod http;
pub mod rechunk;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

pub use error::FetchError;
pub use http::{HttpChunkStream, HttpSource, HttpSourceConfig};
pub use rechunk::Rechunker;

/// What a HEAD request revealed about a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub filename: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// Sequential, non-restartable stream of chunks.
pub trait ChunkStream: Send {
    /// Returns the next chunk, or `None` once the source is exhausted.
    fn next_chunk(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, FetchError>> + Send + '_>>;

    /// Total size advertised by the source, if any.
    fn content_length(&self) -> Option<u64>;
}

/// Opens remote objects for reading.
///
/// Implemented over HTTP by [`HttpSource`]; tests substitute in-memory
/// sources.
pub trait ChunkSource: Send + Sync {
    fn open<'a>(
        &'a self,
        source_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChunkStream>, FetchError>> + Send + 'a>>;
}
