use cloudmirror_protocol::{HashAlgorithm, TransferRequest};
use url::Url;

use crate::TransferError;

/// Validates that a source URL is absolute `http`/`https` with a host.
pub fn validate_source_url(source_url: &str) -> Result<Url, TransferError> {
    if source_url.trim().is_empty() {
        return Err(TransferError::InvalidUrl("empty URL".into()));
    }

    let url = Url::parse(source_url)
        .map_err(|e| TransferError::InvalidUrl(format!("{source_url}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TransferError::InvalidUrl(format!(
                "unsupported scheme '{other}': {source_url}"
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(TransferError::InvalidUrl(format!(
            "missing host: {source_url}"
        )));
    }

    Ok(url)
}

/// Validates a destination filename.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Path separators (`/` or `\`)
/// - `.` and `..`
/// - Control characters
pub fn validate_filename(filename: &str) -> Result<(), TransferError> {
    if filename.trim().is_empty() {
        return Err(TransferError::InvalidFilename("empty filename".into()));
    }

    if filename.contains(['/', '\\']) {
        return Err(TransferError::InvalidFilename(format!(
            "path separator not allowed: {filename}"
        )));
    }

    if filename == "." || filename == ".." {
        return Err(TransferError::InvalidFilename(format!(
            "reserved name: {filename}"
        )));
    }

    if filename.chars().any(char::is_control) {
        return Err(TransferError::InvalidFilename(format!(
            "control character in filename: {filename:?}"
        )));
    }

    Ok(())
}

/// Validates an expected hex digest. Empty digests are accepted and
/// later reported as absent.
pub fn validate_digest(algorithm: HashAlgorithm, digest: &str) -> Result<(), TransferError> {
    let digest = digest.trim();
    if digest.is_empty() {
        return Ok(());
    }

    if digest.len() != algorithm.hex_len() {
        return Err(TransferError::InvalidDigest {
            algorithm,
            reason: format!(
                "expected {} hex characters, got {}",
                algorithm.hex_len(),
                digest.len()
            ),
        });
    }

    if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TransferError::InvalidDigest {
            algorithm,
            reason: "not a hex string".into(),
        });
    }

    Ok(())
}

/// Validates every field of a request before anything is contacted.
pub fn validate_request(request: &TransferRequest) -> Result<(), TransferError> {
    validate_source_url(&request.source_url)?;
    validate_filename(&request.filename)?;
    for (algorithm, digest) in &request.expected_hashes {
        validate_digest(*algorithm, digest)?;
    }
    Ok(())
}
