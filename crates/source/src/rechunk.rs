//! Fixed-size rechunking of an arbitrary byte stream.

use std::future::Future;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::ChunkStream;
use crate::error::FetchError;

/// Regroups a byte stream into chunks of exactly `chunk_size` bytes.
///
/// Every chunk but the last is full; the last may be shorter. Empty chunks
/// are never yielded. After an error or the end of input the stream stays
/// exhausted.
pub struct Rechunker<S> {
    inner: S,
    chunk_size: usize,
    buf: BytesMut,
    content_length: Option<u64>,
    finished: bool,
}

impl<S> Rechunker<S>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
{
    pub fn new(inner: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            chunk_size,
            buf: BytesMut::with_capacity(chunk_size),
            content_length: None,
            finished: false,
        }
    }

    /// Attaches the size advertised by the source.
    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Pulls input until a full chunk is buffered or the input ends.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        loop {
            if self.buf.len() >= self.chunk_size {
                return Ok(Some(self.buf.split_to(self.chunk_size).freeze()));
            }

            if self.finished {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buf.split().freeze()));
            }

            match self.inner.next().await {
                Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    self.finished = true;
                    self.buf.clear();
                    return Err(e);
                }
                None => self.finished = true,
            }
        }
    }
}

impl<S> ChunkStream for Rechunker<S>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin + Send,
{
    fn next_chunk(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, FetchError>> + Send + '_>> {
        Box::pin(Rechunker::next_chunk(self))
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn pieces(sizes: &[usize]) -> Vec<Result<Bytes, FetchError>> {
        let mut next = 0u8;
        sizes
            .iter()
            .map(|&n| {
                let data: Vec<u8> = (0..n)
                    .map(|_| {
                        next = next.wrapping_add(1);
                        next
                    })
                    .collect();
                Ok(Bytes::from(data))
            })
            .collect()
    }

    async fn drain<S>(mut rechunker: Rechunker<S>) -> Vec<Bytes>
    where
        S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
    {
        let mut out = Vec::new();
        while let Some(chunk) = rechunker.next_chunk().await.unwrap() {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn regroups_to_fixed_size() {
        let input = stream::iter(pieces(&[3, 5, 1, 7, 4]));
        let chunks = drain(Rechunker::new(input, 4)).await;

        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![4, 4, 4, 4, 4]);
    }

    #[tokio::test]
    async fn last_chunk_may_be_short() {
        let input = stream::iter(pieces(&[10]));
        let chunks = drain(Rechunker::new(input, 4)).await;

        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn preserves_byte_order() {
        let input = stream::iter(pieces(&[2, 9, 1, 5]));
        let chunks = drain(Rechunker::new(input, 3)).await;

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let expected: Vec<u8> = (1..=17).collect();
        assert_eq!(joined, expected);
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        let input = stream::iter(pieces(&[0, 0]));
        let chunks = drain(Rechunker::new(input, 4)).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn error_ends_stream() {
        let mut items = pieces(&[5]);
        items.push(Err(FetchError::Stream("connection reset".into())));
        items.extend(pieces(&[5]));
        let mut rechunker = Rechunker::new(stream::iter(items), 4);

        assert_eq!(rechunker.next_chunk().await.unwrap().unwrap().len(), 4);
        assert!(matches!(
            rechunker.next_chunk().await,
            Err(FetchError::Stream(_))
        ));
        assert!(rechunker.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exact_multiple_has_no_trailing_chunk() {
        let input = stream::iter(pieces(&[8]));
        let mut rechunker = Rechunker::new(input, 4).with_content_length(Some(8));
        assert_eq!(ChunkStream::content_length(&rechunker), Some(8));

        assert_eq!(rechunker.next_chunk().await.unwrap().unwrap().len(), 4);
        assert_eq!(rechunker.next_chunk().await.unwrap().unwrap().len(), 4);
        assert!(rechunker.next_chunk().await.unwrap().is_none());
    }
}
