//! Access-token providers for the storage API.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::AuthError;

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are treated as expired this long before their reported expiry.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// Supplies bearer tokens for storage requests.
///
/// Shared by every transfer; implementations must tolerate concurrent calls.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + '_>>;
}

/// A fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + '_>> {
        let token = self.0.clone();
        Box::pin(async move {
            if token.is_empty() {
                return Err(AuthError::Missing);
            }
            Ok(token)
        })
    }
}

/// OAuth2 client credentials plus a long-lived refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_SKEW < self.expires_at
    }
}

/// Exchanges a refresh token for access tokens, caching the result.
///
/// Readers share the cached token. A refresh runs under the write lock
/// and re-checks the cache first, so concurrent callers trigger a single
/// token request.
pub struct RefreshTokenProvider {
    http: reqwest::Client,
    config: RefreshTokenConfig,
    cached: RwLock<Option<CachedToken>>,
    refreshes: AtomicU32,
}

impl RefreshTokenProvider {
    pub fn new(config: RefreshTokenConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            config,
            cached: RwLock::new(None),
            refreshes: AtomicU32::new(0),
        })
    }

    /// Number of token requests issued so far.
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::Relaxed)
    }

    async fn token(&self) -> Result<String, AuthError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh() {
                debug!("token refreshed by a concurrent caller");
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.refresh().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn refresh(&self) -> Result<CachedToken, AuthError> {
        if self.config.refresh_token.is_empty() {
            return Err(AuthError::Missing);
        }

        self.refreshes.fetch_add(1, Ordering::Relaxed);
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let resp = self
            .http
            .post(&self.config.token_uri)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::InvalidResponse("empty access_token".into()));
        }

        let lifetime = parsed
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        info!(expires_in_secs = lifetime.as_secs(), "access token refreshed");

        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

impl CredentialProvider for RefreshTokenProvider {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + '_>> {
        Box::pin(self.token())
    }
}
