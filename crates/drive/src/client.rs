//! Resumable upload client.
//!
//! A session is created with one POST whose `Location` header names the
//! session URI. Chunks are then PUT to that URI in order, each carrying a
//! `Content-Range`. The backend answers 308 while it expects more bytes
//! and 200/201 with the object metadata once the upload is complete.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{StatusCode, Url, redirect};
use tracing::{debug, info};

use crate::UploadTarget;
use crate::auth::CredentialProvider;
use crate::error::UploadError;
use crate::session::{ChunkAck, DriveFile, SessionRequest, UploadSession};

/// Default storage API base URL.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

/// Object fields returned when an upload completes.
pub const FILE_FIELDS: &str = "id,name,mimeType,size,webViewLink";

const X_UPLOAD_CONTENT_TYPE: &str = "X-Upload-Content-Type";
const X_UPLOAD_CONTENT_LENGTH: &str = "X-Upload-Content-Length";

/// Settings for [`ResumableUploadClient`].
#[derive(Debug, Clone)]
pub struct UploadClientConfig {
    pub api_base: String,
    pub connect_timeout: Duration,
    /// Deadline for each upload request, chunk bodies included.
    pub upload_timeout: Duration,
}

impl Default for UploadClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
        }
    }
}

/// Talks the resumable upload protocol over HTTPS.
pub struct ResumableUploadClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    config: UploadClientConfig,
}

impl ResumableUploadClient {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        config: UploadClientConfig,
    ) -> Result<Self, UploadError> {
        // 308 is part of the protocol and must reach us unfollowed.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.upload_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            credentials,
            config,
        })
    }

    fn session_url(&self) -> String {
        format!(
            "{}/upload/drive/v3/files?uploadType=resumable&fields={FILE_FIELDS}",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// Creates an upload session. No object bytes are sent.
    pub async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<UploadSession, UploadError> {
        let token = self.credentials.access_token().await?;

        let mut metadata = serde_json::json!({ "name": request.name });
        if let Some(parent) = &request.parent {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let mut builder = self
            .http
            .post(self.session_url())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(X_UPLOAD_CONTENT_TYPE, &request.mime_type);
        if let Some(total) = request.total_size {
            builder = builder.header(X_UPLOAD_CONTENT_LENGTH, total.to_string());
        }

        let resp = builder.body(serde_json::to_vec(&metadata)?).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::Init {
                status: status.as_u16(),
                body,
            });
        }

        let endpoint = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| Url::parse(v).is_ok())
            .ok_or(UploadError::MissingLocation)?
            .to_string();

        info!(name = %request.name, total_size = ?request.total_size, "upload session created");
        Ok(UploadSession::new(
            endpoint,
            request.mime_type.clone(),
            request.total_size,
        ))
    }

    /// Sends the next chunk of the session.
    pub async fn send_chunk(
        &self,
        session: &mut UploadSession,
        chunk: Bytes,
    ) -> Result<ChunkAck, UploadError> {
        let len = chunk.len() as u64;
        let (start, end) = session.next_range(len)?;
        let content_range = session.content_range(start, end);
        let token = self.credentials.access_token().await?;

        debug!(%content_range, "pushing chunk");
        let resp = self
            .http
            .put(session.endpoint())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, session.mime_type())
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, &content_range)
            .body(chunk)
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let file: DriveFile = serde_json::from_slice(&resp.bytes().await?)?;
                session.acknowledge(len);
                session.mark_complete();
                info!(id = %file.id, bytes = session.bytes_acknowledged(), "upload completed");
                Ok(ChunkAck::Completed(file))
            }
            StatusCode::PERMANENT_REDIRECT => {
                session.acknowledge(len);
                debug!(
                    acknowledged = session.bytes_acknowledged(),
                    range = ?resp.headers().get(RANGE),
                    "chunk accepted"
                );
                Ok(ChunkAck::Accepted)
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(UploadError::Chunk {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Completes a session whose chunks never carried the final object.
    ///
    /// Sends an empty request declaring the total as the bytes acknowledged
    /// so far. Covers sources of unknown size and empty sources.
    pub async fn complete_session(
        &self,
        session: &mut UploadSession,
    ) -> Result<DriveFile, UploadError> {
        if session.is_complete() {
            return Err(UploadError::SessionComplete);
        }
        let content_range = session.finalize_range();
        let token = self.credentials.access_token().await?;

        debug!(%content_range, "finalizing upload");
        let resp = self
            .http
            .put(session.endpoint())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_LENGTH, 0)
            .header(CONTENT_RANGE, &content_range)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            let file: DriveFile = serde_json::from_slice(&resp.bytes().await?)?;
            session.mark_complete();
            info!(id = %file.id, bytes = session.bytes_acknowledged(), "upload completed");
            return Ok(file);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(UploadError::Chunk {
            status: status.as_u16(),
            body,
        })
    }
}

impl UploadTarget for ResumableUploadClient {
    fn initiate<'a>(
        &'a self,
        request: &'a SessionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, UploadError>> + Send + 'a>> {
        Box::pin(self.create_session(request))
    }

    fn push_chunk<'a>(
        &'a self,
        session: &'a mut UploadSession,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, UploadError>> + Send + 'a>> {
        Box::pin(self.send_chunk(session, chunk))
    }

    fn finalize<'a>(
        &'a self,
        session: &'a mut UploadSession,
    ) -> Pin<Box<dyn Future<Output = Result<DriveFile, UploadError>> + Send + 'a>> {
        Box::pin(self.complete_session(session))
    }
}
