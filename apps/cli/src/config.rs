//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/cloudmirror/mirror.toml`
//! - Windows: `%APPDATA%/cloudmirror/mirror.toml`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use cloudmirror_drive::{
    CredentialProvider, DEFAULT_API_BASE, DEFAULT_TOKEN_URI, RefreshTokenConfig,
    RefreshTokenProvider, StaticToken, UploadClientConfig,
};
use cloudmirror_mirror::TransferSettings;
use cloudmirror_source::HttpSourceConfig;
use cloudmirror_transfer::RetryPolicy;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

pub const ENV_REFRESH_TOKEN: &str = "CLOUDMIRROR_REFRESH_TOKEN";
pub const ENV_ACCESS_TOKEN: &str = "CLOUDMIRROR_ACCESS_TOKEN";
pub const ENV_FOLDER_ID: &str = "CLOUDMIRROR_FOLDER_ID";

/// Full CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub drive: DriveSection,
    pub transfer: TransferSection,
}

/// Storage account and upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSection {
    /// Folder new files are created in. Empty means the account root.
    pub folder_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Pre-issued bearer token; takes precedence over the refresh flow.
    pub access_token: String,
    pub api_base: String,
    pub token_uri: String,
    pub upload_timeout_secs: u64,
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            access_token: String::new(),
            api_base: DEFAULT_API_BASE.into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
            upload_timeout_secs: 300,
        }
    }
}

/// Chunking, retry and progress tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSection {
    pub chunk_size_mb: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub retry_multiplier: f64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub speed_samples: usize,
    pub progress_threshold: u8,
    /// Upper bound on the advertised source size. 0 disables the check.
    pub max_file_size_mb: u64,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            chunk_size_mb: 10,
            max_retries: 3,
            base_delay_ms: 1000,
            retry_multiplier: 2.0,
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            speed_samples: 10,
            progress_threshold: 1,
            max_file_size_mb: 10 * 1024,
        }
    }
}

impl MirrorConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: MirrorConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = MirrorConfig::default();
            config.save(&path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix (holds credentials).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies `CLOUDMIRROR_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_REFRESH_TOKEN) {
            self.drive.refresh_token = token;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.drive.access_token = token;
        }
        if let Some(folder) = get(ENV_FOLDER_ID) {
            self.drive.folder_id = folder;
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transfer.max_retries,
            base_delay: Duration::from_millis(self.transfer.base_delay_ms),
            multiplier: self.transfer.retry_multiplier,
        }
    }

    pub fn source_config(&self) -> HttpSourceConfig {
        let t = &self.transfer;
        HttpSourceConfig {
            chunk_size: usize::try_from(t.chunk_size_mb.max(1).saturating_mul(MIB))
                .unwrap_or(usize::MAX),
            connect_timeout: Duration::from_secs(t.connect_timeout_secs),
            read_timeout: Duration::from_secs(t.read_timeout_secs),
            retry: self.retry_policy(),
            max_size: (t.max_file_size_mb > 0).then(|| t.max_file_size_mb.saturating_mul(MIB)),
        }
    }

    pub fn upload_config(&self) -> UploadClientConfig {
        UploadClientConfig {
            api_base: self.drive.api_base.clone(),
            connect_timeout: Duration::from_secs(self.transfer.connect_timeout_secs),
            upload_timeout: Duration::from_secs(self.drive.upload_timeout_secs),
        }
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        let folder = self.drive.folder_id.trim();
        TransferSettings {
            speed_samples: self.transfer.speed_samples.max(1),
            progress_threshold: self.transfer.progress_threshold.max(1),
            parent_folder: (!folder.is_empty()).then(|| folder.to_string()),
            ..TransferSettings::default()
        }
    }

    /// Builds the credential provider: a static token if one is set,
    /// otherwise the refresh-token flow.
    pub fn credentials(&self) -> anyhow::Result<Arc<dyn CredentialProvider>> {
        let d = &self.drive;
        if !d.access_token.trim().is_empty() {
            return Ok(Arc::new(StaticToken::new(d.access_token.trim())));
        }
        if d.refresh_token.trim().is_empty() {
            bail!(
                "no credentials configured: set drive.refresh_token (or {ENV_REFRESH_TOKEN}) \
                 or drive.access_token (or {ENV_ACCESS_TOKEN})"
            );
        }

        let provider = RefreshTokenProvider::new(RefreshTokenConfig {
            client_id: d.client_id.clone(),
            client_secret: d.client_secret.clone(),
            refresh_token: d.refresh_token.trim().to_string(),
            token_uri: d.token_uri.clone(),
        })?;
        Ok(Arc::new(provider))
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cloudmirror")
            .join("mirror.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("cloudmirror").join("mirror.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/cloudmirror/mirror.toml"))
    }
}
