use std::time::Duration;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with 1024-based units and two decimals.
///
/// `None` renders as `"unknown"`.
pub fn format_bytes(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes else {
        return "unknown".to_string();
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Formats a throughput in bytes/second.
pub fn format_speed(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0 B/s".to_string();
    }
    format!("{}/s", format_bytes(Some(bytes_per_second as u64)))
}

/// Formats a duration as `1d2h3m4s`, omitting zero parts.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let n = secs / size;
        secs %= size;
        if n > 0 {
            out.push_str(&format!("{n}{unit}"));
        }
    }
    out
}

/// Renders `percent` as a bar of `width` cells.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = percent * width / 100;
    let mut bar = "■".repeat(filled);
    bar.push_str(&"□".repeat(width - filled));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_units() {
        assert_eq!(format_bytes(Some(0)), "0.00 B");
        assert_eq!(format_bytes(Some(512)), "512.00 B");
        assert_eq!(format_bytes(Some(1024)), "1.00 KB");
        assert_eq!(format_bytes(Some(1536)), "1.50 KB");
        assert_eq!(format_bytes(Some(10 * 1024 * 1024)), "10.00 MB");
        assert_eq!(format_bytes(Some(7 * 1024 * 1024 * 1024)), "7.00 GB");
    }

    #[test]
    fn bytes_caps_at_terabytes() {
        let pb = 1024u64.pow(5);
        assert_eq!(format_bytes(Some(pb)), "1024.00 TB");
    }

    #[test]
    fn bytes_unknown() {
        assert_eq!(format_bytes(None), "unknown");
    }

    #[test]
    fn speed() {
        assert_eq!(format_speed(0.0), "0 B/s");
        assert_eq!(format_speed(-3.0), "0 B/s");
        assert_eq!(format_speed(f64::NAN), "0 B/s");
        assert_eq!(format_speed(2048.0), "2.00 KB/s");
    }

    #[test]
    fn duration_parts() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1h2m5s");
        assert_eq!(format_duration(Duration::from_secs(93_784)), "1d2h3m4s");
    }

    #[test]
    fn bar_cells() {
        assert_eq!(progress_bar(0, 10), "□□□□□□□□□□");
        assert_eq!(progress_bar(45, 10), "■■■■□□□□□□");
        assert_eq!(progress_bar(100, 10), "■■■■■■■■■■");
        assert_eq!(progress_bar(250, 4), "■■■■");
    }
}
