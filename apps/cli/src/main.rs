//! cloudmirror entry point.

mod config;
mod render;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use cloudmirror_drive::ResumableUploadClient;
use cloudmirror_mirror::MirrorService;
use cloudmirror_protocol::{DEFAULT_MIME_TYPE, HashAlgorithm, TransferRequest};
use cloudmirror_source::http::{FALLBACK_FILENAME, filename_from_url};
use cloudmirror_source::{HttpSource, SourceInfo};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::config::MirrorConfig;

/// Stream a remote file into cloud storage without touching local disk.
#[derive(Debug, Parser)]
#[command(name = "cloudmirror", version, about)]
struct Cli {
    /// HTTP(S) URL of the file to mirror.
    url: String,

    /// Name of the stored file (defaults to the name the source reports).
    #[arg(long)]
    name: Option<String>,

    /// MIME type of the stored file.
    #[arg(long)]
    mime: Option<String>,

    /// Expected size in bytes.
    #[arg(long)]
    size: Option<u64>,

    /// Expected MD5 digest (hex).
    #[arg(long)]
    md5: Option<String>,

    /// Expected SHA-1 digest (hex).
    #[arg(long)]
    sha1: Option<String>,

    /// Expected SHA-256 digest (hex).
    #[arg(long)]
    sha256: Option<String>,

    /// Configuration file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start without asking for confirmation.
    #[arg(short, long)]
    yes: bool,
}

impl Cli {
    fn request(&self, filename: String, mime_type: String) -> TransferRequest {
        let mut request = TransferRequest::new(self.url.clone(), filename).with_mime_type(mime_type);
        if let Some(size) = self.size {
            request = request.with_expected_size(size);
        }
        for (algorithm, digest) in [
            (HashAlgorithm::Md5, &self.md5),
            (HashAlgorithm::Sha1, &self.sha1),
            (HashAlgorithm::Sha256, &self.sha256),
        ] {
            if let Some(digest) = digest {
                request = request.with_expected_hash(algorithm, digest.clone());
            }
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting cloudmirror");

    let config = MirrorConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_env_overrides();
    let credentials = config.credentials()?;

    let source = Arc::new(HttpSource::new(config.source_config())?);
    let uploader = Arc::new(ResumableUploadClient::new(credentials, config.upload_config())?);

    let info = match source.inspect(&cli.url).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "source inspection failed, continuing without metadata");
            SourceInfo {
                filename: fallback_filename(&cli.url),
                size: None,
                content_type: None,
            }
        }
    };

    let filename = cli
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| info.filename.clone());
    let mime_type = cli
        .mime
        .clone()
        .or_else(|| info.content_type.clone())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

    println!("{}", render::source_summary(&cli.url, &filename, &info, &mime_type));
    if !cli.yes && !confirm("Start transfer? [y/N] ").await? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let service = Arc::new(MirrorService::new(
        source,
        uploader,
        config.transfer_settings(),
    ));

    let interrupt = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            interrupt.cancel_all();
        }
    });

    let started = Instant::now();
    let mut handle = service.start(cli.request(filename, mime_type));
    while let Some(event) = handle.events.recv().await {
        let line = render::progress_line(&event);
        if event.is_terminal() {
            eprintln!("\r{line}");
        } else {
            eprint!("\r{line}");
            let _ = std::io::stderr().flush();
        }
    }

    let result = handle.join.await.context("transfer task panicked")?;
    println!("{}", render::result_summary(&result, started.elapsed()));

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn fallback_filename(url: &str) -> String {
    cloudmirror_transfer::validate_source_url(url)
        .ok()
        .and_then(|u| filename_from_url(&u))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Asks a yes/no question on stdin. Anything but `y`/`yes` is a no.
async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
