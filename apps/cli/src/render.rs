//! Terminal rendering of progress events and results.

use std::time::Duration;

use cloudmirror_protocol::{HashOutcome, ProgressEvent, TransferResult, TransferState};
use cloudmirror_source::SourceInfo;
use cloudmirror_transfer::{format_bytes, format_duration, format_speed, progress_bar};

const BAR_WIDTH: usize = 10;

/// One status line for a progress event.
pub fn progress_line(event: &ProgressEvent) -> String {
    if event.cancelled {
        return format!("{}: cancelled", event.filename);
    }
    if let Some(err) = &event.error {
        return format!("{}: failed: {err}", event.filename);
    }

    let eta = match event.eta_seconds {
        Some(secs) if !event.done => format_duration(Duration::from_secs_f64(secs.max(0.0))),
        _ => "-".to_string(),
    };
    let size = match event.total_bytes {
        Some(_) => format!(
            "{} / {}",
            format_bytes(Some(event.bytes_transferred)),
            format_bytes(event.total_bytes)
        ),
        None => format_bytes(Some(event.bytes_transferred)),
    };

    format!(
        "{} {:>3}% | {size} | {} | ETA {eta}",
        progress_bar(event.percent, BAR_WIDTH),
        event.percent,
        format_speed(event.speed_bps),
    )
}

/// Source summary shown before asking for confirmation.
pub fn source_summary(url: &str, filename: &str, info: &SourceInfo, mime_type: &str) -> String {
    format!(
        "Source:  {url}\nName:    {filename}\nSize:    {}\nType:    {mime_type}",
        format_bytes(info.size)
    )
}

/// Multi-line report for a finished transfer.
pub fn result_summary(result: &TransferResult, elapsed: Duration) -> String {
    let mut lines = Vec::new();
    if result.success {
        lines.push(format!(
            "Done: {} in {}",
            format_bytes(Some(result.bytes_transferred)),
            format_duration(elapsed)
        ));
        if let Some(id) = &result.object_id {
            lines.push(format!("File id: {id}"));
        }
        if !result.message.is_empty() {
            lines.push(result.message.clone());
        }
    } else {
        lines.push(format!("{}: {}", state_label(result), result.message));
    }

    if let Some(verification) = &result.hash_verification {
        for (algorithm, outcome) in verification {
            let status = match outcome {
                HashOutcome::Valid => "ok",
                HashOutcome::Invalid => "MISMATCH",
                HashOutcome::Absent => "not checked",
            };
            lines.push(format!("{algorithm}: {status}"));
        }
    }
    for warning in &result.warnings {
        lines.push(format!("warning: {warning}"));
    }
    lines.join("\n")
}

fn state_label(result: &TransferResult) -> &'static str {
    match result.state {
        TransferState::Cancelled => "Cancelled",
        TransferState::Completed => "Completed",
        _ => "Failed",
    }
}
