//! HTTP source backed by `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use cloudmirror_transfer::{DEFAULT_CHUNK_SIZE, RetryError, RetryPolicy, retry, validate_filename};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use percent_encoding::percent_decode_str;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};
use reqwest::{Method, redirect};
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::rechunk::Rechunker;
use crate::{ChunkSource, ChunkStream, SourceInfo};

/// Filename used when neither headers nor the URL yield one.
pub const FALLBACK_FILENAME: &str = "download.bin";

const MAX_REDIRECTS: usize = 10;

/// Settings for [`HttpSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
    /// Sources advertising more bytes than this are rejected.
    pub max_size: Option<u64>,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_size: None,
        }
    }
}

/// Stream of fixed-size chunks read from an HTTP response body.
pub type HttpChunkStream = Rechunker<BoxStream<'static, Result<Bytes, FetchError>>>;

/// Reads remote objects over HTTP(S).
///
/// Only the initial connection is retried. Once the body is streaming,
/// any failure ends the stream with [`FetchError::Stream`].
pub struct HttpSource {
    http: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Issues a HEAD request and describes the source.
    pub async fn inspect(&self, source_url: &str) -> Result<SourceInfo, FetchError> {
        let url = parse_url(source_url)?;
        let resp = self.send_with_retry(Method::HEAD, &url).await?;
        let headers = resp.headers();

        let size = header_content_length(headers);
        self.check_size(size)?;

        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(resp.url()))
            .or_else(|| filename_from_url(&url))
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(%url, ?size, %filename, "inspected source");
        Ok(SourceInfo {
            filename,
            size,
            content_type,
        })
    }

    /// Opens the source for streaming.
    pub async fn open_stream(&self, source_url: &str) -> Result<HttpChunkStream, FetchError> {
        let url = parse_url(source_url)?;
        let resp = self.send_with_retry(Method::GET, &url).await?;

        let content_length = header_content_length(resp.headers());
        self.check_size(content_length)?;
        info!(%url, ?content_length, "source stream opened");

        let body = resp
            .bytes_stream()
            .map(|item| item.map_err(|e| FetchError::Stream(e.to_string())))
            .boxed();

        Ok(Rechunker::new(body, self.config.chunk_size).with_content_length(content_length))
    }

    /// Sends `method` to `url`, retrying transient failures.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &Url,
    ) -> Result<reqwest::Response, FetchError> {
        let result = retry(&self.config.retry, FetchError::is_transient, |attempt| {
            let request = self.http.request(method.clone(), url.clone());
            async move {
                debug!(attempt, "connecting to source");
                let resp = request.send().await.map_err(FetchError::from_request)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }
                Ok(resp)
            }
        })
        .await;

        result.map_err(|e| match e {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => FetchError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        })
    }

    fn check_size(&self, size: Option<u64>) -> Result<(), FetchError> {
        match (size, self.config.max_size) {
            (Some(size), Some(limit)) if size > limit => Err(FetchError::TooLarge { size, limit }),
            _ => Ok(()),
        }
    }
}

impl ChunkSource for HttpSource {
    fn open<'a>(
        &'a self,
        source_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChunkStream>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let stream = self.open_stream(source_url).await?;
            Ok(Box::new(stream) as Box<dyn ChunkStream>)
        })
    }
}

fn parse_url(source_url: &str) -> Result<Url, FetchError> {
    Url::parse(source_url).map_err(|e| FetchError::InvalidUrl(format!("{source_url}: {e}")))
}

/// Reads `Content-Length` from the headers.
///
/// The response body size hint is unreliable for HEAD responses, so the
/// header is parsed directly.
fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Extracts a filename from a `Content-Disposition` header value.
///
/// `filename*=` (RFC 5987) takes precedence over `filename=`.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = val.trim().rsplit('\'').next().unwrap_or_default();
                extended = Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            }
            "filename" => {
                plain = Some(val.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .into_iter()
        .chain(plain)
        .find(|name| validate_filename(name).is_ok())
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let name = percent_decode_str(segment).decode_utf8_lossy().into_owned();
    validate_filename(&name).is_ok().then_some(name)
}
