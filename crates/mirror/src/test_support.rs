//! In-memory sources and targets for orchestrator tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cloudmirror_drive::{ChunkAck, DriveFile, SessionRequest, UploadError, UploadSession, UploadTarget};
use cloudmirror_source::{ChunkSource, ChunkStream, FetchError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub(crate) const MIB: usize = 1024 * 1024;

/// Source serving a scripted sequence of chunks.
pub(crate) struct MockSource {
    items: Mutex<Option<VecDeque<Result<Bytes, FetchError>>>>,
    content_length: Option<u64>,
    open_error: Mutex<Option<FetchError>>,
    gate: Option<Arc<Notify>>,
    pub opens: AtomicUsize,
    pub fetched: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(chunks: Vec<Bytes>, content_length: Option<u64>) -> Self {
        Self::scripted(chunks.into_iter().map(Ok).collect(), content_length)
    }

    pub fn scripted(items: Vec<Result<Bytes, FetchError>>, content_length: Option<u64>) -> Self {
        Self {
            items: Mutex::new(Some(items.into())),
            content_length,
            open_error: Mutex::new(None),
            gate: None,
            opens: AtomicUsize::new(0),
            fetched: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(err: FetchError) -> Self {
        let source = Self::new(Vec::new(), None);
        *source.open_error.lock().unwrap() = Some(err);
        source
    }

    /// Every chunk waits for one permit on `gate`.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct MockStream {
    items: VecDeque<Result<Bytes, FetchError>>,
    content_length: Option<u64>,
    gate: Option<Arc<Notify>>,
    fetched: Arc<AtomicUsize>,
}

impl ChunkStream for MockStream {
    fn next_chunk(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, FetchError>> + Send + '_>> {
        Box::pin(async move {
            let Some(item) = self.items.pop_front() else {
                return Ok(None);
            };
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.fetched.fetch_add(1, Ordering::SeqCst);
            item.map(Some)
        })
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl ChunkSource for MockSource {
    fn open<'a>(
        &'a self,
        _source_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChunkStream>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.open_error.lock().unwrap().take() {
                return Err(err);
            }
            let items = self.items.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(MockStream {
                items,
                content_length: self.content_length,
                gate: self.gate.clone(),
                fetched: self.fetched.clone(),
            }) as Box<dyn ChunkStream>)
        })
    }
}

/// Scripted response to one push.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Accept,
    Complete(&'static str),
    Fail(u16),
}

/// Upload target recording every push.
pub(crate) struct MockTarget {
    replies: Mutex<VecDeque<Reply>>,
    init_error: Mutex<Option<UploadError>>,
    cancel_after: Option<(usize, CancellationToken)>,
    pub sessions: Mutex<Vec<SessionRequest>>,
    /// `(start, len)` of every push.
    pub pushes: Mutex<Vec<(u64, u64)>>,
    pub finalizes: AtomicUsize,
}

impl MockTarget {
    /// Accepts every chunk and completes when the declared total is reached.
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            init_error: Mutex::new(None),
            cancel_after: None,
            sessions: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            finalizes: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(err: UploadError) -> Self {
        let target = Self::new();
        *target.init_error.lock().unwrap() = Some(err);
        target
    }

    /// Cancels `token` once `pushes` chunks have been accepted.
    pub fn cancel_after(mut self, pushes: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((pushes, token));
        self
    }

    pub fn pushes(&self) -> Vec<(u64, u64)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> Vec<SessionRequest> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn finalizes(&self) -> usize {
        self.finalizes.load(Ordering::SeqCst)
    }

    fn file(id: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: String::new(),
            mime_type: None,
            size: None,
            web_view_link: Some(format!("https://drive.example.com/file/d/{id}/view")),
        }
    }
}

impl UploadTarget for MockTarget {
    fn initiate<'a>(
        &'a self,
        request: &'a SessionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            self.sessions.lock().unwrap().push(request.clone());
            if let Some(err) = self.init_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(UploadSession::new(
                "mock://session",
                request.mime_type.clone(),
                request.total_size,
            ))
        })
    }

    fn push_chunk<'a>(
        &'a self,
        session: &'a mut UploadSession,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let len = chunk.len() as u64;
            let (start, _) = session.next_range(len)?;
            let count = {
                let mut pushes = self.pushes.lock().unwrap();
                pushes.push((start, len));
                pushes.len()
            };

            let scripted = self.replies.lock().unwrap().pop_front();
            let reply = scripted.unwrap_or_else(|| match session.total_size() {
                Some(total) if start + len == total => Reply::Complete("auto"),
                _ => Reply::Accept,
            });

            let ack = match reply {
                Reply::Accept => {
                    session.acknowledge(len);
                    ChunkAck::Accepted
                }
                Reply::Complete(id) => {
                    session.acknowledge(len);
                    session.mark_complete();
                    ChunkAck::Completed(Self::file(id))
                }
                Reply::Fail(status) => {
                    return Err(UploadError::Chunk {
                        status,
                        body: "rejected".into(),
                    });
                }
            };

            if let Some((after, token)) = &self.cancel_after {
                if count == *after {
                    token.cancel();
                }
            }
            Ok(ack)
        })
    }

    fn finalize<'a>(
        &'a self,
        session: &'a mut UploadSession,
    ) -> Pin<Box<dyn Future<Output = Result<DriveFile, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            self.finalizes.fetch_add(1, Ordering::SeqCst);
            session.mark_complete();
            Ok(Self::file("finalized"))
        })
    }
}
