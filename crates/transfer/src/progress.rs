use std::collections::VecDeque;
use std::time::{Duration, Instant};

use cloudmirror_protocol::ProgressEvent;

use crate::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_PROGRESS_THRESHOLD, DEFAULT_SPEED_SAMPLES};

// ---------------------------------------------------------------------------
// SpeedWindow
// ---------------------------------------------------------------------------

/// Sliding window of per-chunk throughput samples (bytes/second).
///
/// Holds at most `max_samples` values; the oldest is evicted first. The
/// reported speed is the arithmetic mean of the samples currently held.
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl Default for SpeedWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_SAMPLES)
    }
}

impl SpeedWindow {
    /// Creates a window holding up to `max_samples` samples (at least one).
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Records a throughput sample in bytes/second.
    pub fn add_sample(&mut self, bytes_per_second: f64) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(bytes_per_second);
    }

    /// Records `bytes` moved in `elapsed`.
    ///
    /// Zero-duration samples carry no rate information and are dropped;
    /// returns whether the sample was kept.
    pub fn add_chunk(&mut self, bytes: u64, elapsed: Duration) -> bool {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return false;
        }
        self.add_sample(bytes as f64 / secs);
        true
    }

    /// Mean of the held samples, 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window capacity.
    pub fn capacity(&self) -> usize {
        self.max_samples
    }
}

// ---------------------------------------------------------------------------
// TransferProgress
// ---------------------------------------------------------------------------

/// Byte counts, speed and ETA of one transfer.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    bytes_transferred: u64,
    total_bytes: Option<u64>,
    window: SpeedWindow,
    started_at: Instant,
}

impl TransferProgress {
    /// Starts tracking a transfer of `total_bytes` (if known).
    pub fn new(total_bytes: Option<u64>, speed_samples: usize) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
            window: SpeedWindow::new(speed_samples),
            started_at: Instant::now(),
        }
    }

    /// Records one acknowledged chunk and the time it took to move it.
    pub fn record_chunk(&mut self, bytes: u64, elapsed: Duration) {
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes);
        self.window.add_chunk(bytes, elapsed);
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    /// Sets the total once it becomes known.
    pub fn set_total_bytes(&mut self, total_bytes: Option<u64>) {
        self.total_bytes = total_bytes;
    }

    /// Mean throughput over the speed window, in bytes/second.
    pub fn average_speed(&self) -> f64 {
        self.window.average()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// `floor(transferred / total * 100)`, clamped to 100.
    ///
    /// `None` while the total is unknown. A zero total counts as complete.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(100);
        }
        let pct = (u128::from(self.bytes_transferred) * 100 / u128::from(total)).min(100);
        Some(pct as u8)
    }

    /// Seconds remaining at the current average speed.
    ///
    /// `None` if the total is unknown or the average speed is zero.
    pub fn eta_seconds(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let speed = self.average_speed();
        if speed <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_transferred);
        Some(remaining as f64 / speed)
    }

    /// Builds a non-terminal progress event for `filename`.
    pub fn event(&self, filename: &str) -> ProgressEvent {
        ProgressEvent {
            filename: filename.to_string(),
            percent: self.percent().unwrap_or(0),
            bytes_transferred: self.bytes_transferred,
            total_bytes: self.total_bytes,
            speed_bps: self.average_speed(),
            eta_seconds: self.eta_seconds(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            cancelled: false,
            error: None,
            done: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressThrottle
// ---------------------------------------------------------------------------

/// Decides which intermediate progress updates reach the caller.
///
/// With a known total, an update passes when its percent advanced by at
/// least `threshold` since the last one that passed. 100% never passes:
/// the terminal event reports it. With an unknown total, updates pass at
/// most once per `min_interval`.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    threshold: u8,
    min_interval: Duration,
    last_percent: u8,
    last_emit: Option<Instant>,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_THRESHOLD, DEFAULT_PROGRESS_INTERVAL)
    }
}

impl ProgressThrottle {
    pub fn new(threshold: u8, min_interval: Duration) -> Self {
        Self {
            threshold,
            min_interval,
            last_percent: 0,
            last_emit: None,
        }
    }

    /// Returns `true` if an update at `percent` should be emitted.
    pub fn should_emit(&mut self, percent: Option<u8>) -> bool {
        match percent {
            Some(p) => {
                if p >= 100 || p < self.last_percent.saturating_add(self.threshold) {
                    return false;
                }
                // A zero threshold would otherwise re-emit the same percent.
                if self.last_emit.is_some() && p == self.last_percent {
                    return false;
                }
                self.last_percent = p;
                self.last_emit = Some(Instant::now());
                true
            }
            None => {
                let now = Instant::now();
                match self.last_emit {
                    Some(last) if now.duration_since(last) < self.min_interval => false,
                    _ => {
                        self.last_emit = Some(now);
                        true
                    }
                }
            }
        }
    }

    /// Percent of the last emitted update (0 before the first).
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_window_empty() {
        let window = SpeedWindow::new(10);
        assert_eq!(window.average(), 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn speed_window_mean_of_samples() {
        let mut window = SpeedWindow::new(10);
        window.add_sample(100.0);
        window.add_sample(200.0);
        window.add_sample(600.0);
        assert_eq!(window.len(), 3);
        assert!((window.average() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_window_evicts_oldest() {
        let mut window = SpeedWindow::new(3);
        for s in [1000.0, 10.0, 20.0, 30.0] {
            window.add_sample(s);
        }
        assert_eq!(window.len(), 3);
        // 1000 was evicted.
        assert!((window.average() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_window_never_exceeds_capacity() {
        let mut window = SpeedWindow::new(5);
        for i in 0..100 {
            window.add_sample(i as f64);
            assert!(window.len() <= 5);
        }
        // Mean of 95..=99.
        assert!((window.average() - 97.0).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_window_zero_capacity_holds_one() {
        let mut window = SpeedWindow::new(0);
        window.add_sample(5.0);
        window.add_sample(7.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.average(), 7.0);
    }

    #[test]
    fn speed_window_drops_zero_duration() {
        let mut window = SpeedWindow::new(4);
        assert!(!window.add_chunk(1024, Duration::ZERO));
        assert!(window.add_chunk(1024, Duration::from_millis(500)));
        assert_eq!(window.len(), 1);
        assert!((window.average() - 2048.0).abs() < 1e-9);
    }

    #[test]
    fn progress_percent_floors() {
        let mut progress = TransferProgress::new(Some(300), 10);
        progress.record_chunk(100, Duration::from_secs(1));
        assert_eq!(progress.percent(), Some(33));
        progress.record_chunk(199, Duration::from_secs(1));
        assert_eq!(progress.percent(), Some(99));
        progress.record_chunk(1, Duration::from_secs(1));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn progress_percent_clamped_when_source_overruns() {
        let mut progress = TransferProgress::new(Some(10), 10);
        progress.record_chunk(25, Duration::from_secs(1));
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn progress_unknown_total() {
        let mut progress = TransferProgress::new(None, 10);
        progress.record_chunk(50, Duration::from_secs(1));
        assert_eq!(progress.percent(), None);
        assert_eq!(progress.eta_seconds(), None);
        assert_eq!(progress.event("f").percent, 0);
    }

    #[test]
    fn progress_eta_uses_average_speed() {
        let mut progress = TransferProgress::new(Some(1000), 10);
        assert_eq!(progress.eta_seconds(), None);
        progress.record_chunk(100, Duration::from_secs(1));
        progress.record_chunk(300, Duration::from_secs(1));
        // Average 200 B/s, 600 bytes left.
        let eta = progress.eta_seconds().unwrap();
        assert!((eta - 3.0).abs() < 1e-9);
    }

    #[test]
    fn progress_event_snapshot() {
        let mut progress = TransferProgress::new(Some(200), 10);
        progress.record_chunk(100, Duration::from_secs(2));
        let ev = progress.event("movie.mkv");
        assert_eq!(ev.filename, "movie.mkv");
        assert_eq!(ev.percent, 50);
        assert_eq!(ev.bytes_transferred, 100);
        assert_eq!(ev.total_bytes, Some(200));
        assert!((ev.speed_bps - 50.0).abs() < 1e-9);
        assert!(!ev.is_terminal());
    }

    #[test]
    fn throttle_respects_threshold() {
        let mut throttle = ProgressThrottle::new(10, Duration::from_secs(1));
        assert!(!throttle.should_emit(Some(5)));
        assert!(throttle.should_emit(Some(10)));
        assert!(!throttle.should_emit(Some(19)));
        assert!(throttle.should_emit(Some(25)));
        assert_eq!(throttle.last_percent(), 25);
    }

    #[test]
    fn throttle_never_emits_hundred() {
        let mut throttle = ProgressThrottle::new(1, Duration::from_secs(1));
        assert!(throttle.should_emit(Some(50)));
        assert!(!throttle.should_emit(Some(100)));
    }

    #[test]
    fn throttle_zero_threshold_skips_repeats() {
        let mut throttle = ProgressThrottle::new(0, Duration::from_secs(1));
        assert!(throttle.should_emit(Some(3)));
        assert!(!throttle.should_emit(Some(3)));
        assert!(throttle.should_emit(Some(4)));
    }

    #[test]
    fn throttle_unknown_total_is_time_based() {
        let mut throttle = ProgressThrottle::new(1, Duration::from_millis(50));
        assert!(throttle.should_emit(None));
        assert!(!throttle.should_emit(None));

        std::thread::sleep(Duration::from_millis(60));
        assert!(throttle.should_emit(None));
    }
}
