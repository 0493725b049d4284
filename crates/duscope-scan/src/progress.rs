//! Scan progress reporting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Items (files and finished directories) processed so far.
    pub items_scanned: u64,
    /// Bytes of file data seen so far.
    pub bytes_scanned: u64,
    /// Path currently being processed.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            items_scanned: 0,
            bytes_scanned: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in items per second.
    pub fn items_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.items_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared counters for one scan, updated from every worker.
///
/// Events go out on a broadcast channel, so a slow subscriber lags (and
/// loses old events) instead of stalling the scan.
#[derive(Debug)]
pub(crate) struct ProgressTracker<'a> {
    tx: &'a broadcast::Sender<ScanProgress>,
    start: Instant,
    interval: u64,
    items: AtomicU64,
    bytes: AtomicU64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(tx: &'a broadcast::Sender<ScanProgress>, interval: u64) -> Self {
        Self {
            tx,
            start: Instant::now(),
            interval: interval.max(1),
            items: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Count a file; reports when the running total crosses the interval.
    pub fn record_file(&self, path: &std::path::Path, size: u64) {
        self.bytes.fetch_add(size, Ordering::Relaxed);
        let items = self.items.fetch_add(1, Ordering::Relaxed) + 1;
        if items % self.interval == 0 {
            self.emit(items, path);
        }
    }

    /// Count a finished directory and always report.
    pub fn record_dir(&self, path: &std::path::Path) {
        let items = self.items.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit(items, path);
    }

    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn emit(&self, items: u64, path: &std::path::Path) {
        // No subscribers is not an error.
        let _ = self.tx.send(ScanProgress {
            items_scanned: items,
            bytes_scanned: self.bytes.load(Ordering::Relaxed),
            current_path: path.to_path_buf(),
            elapsed: self.start.elapsed(),
        });
    }
}

/// Consumer-side rate limiter for progress display.
///
/// The scanner emits freely; whoever draws progress decides how often to
/// actually repaint.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    /// Allow at most one update per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Allow at most `n` updates per second.
    pub fn per_second(n: u32) -> Self {
        Self::new(Duration::from_secs(1) / n.max(1))
    }

    /// Whether an update should be shown now.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// Whether an update should be shown at `now`.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::per_second(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_tracker_emits_on_interval() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(&tx, 3);

        for _ in 0..7 {
            tracker.record_file(Path::new("/f"), 10);
        }
        let mut seen = Vec::new();
        while let Ok(p) = rx.try_recv() {
            seen.push(p.items_scanned);
        }
        assert_eq!(seen, [3, 6]);
        assert_eq!(tracker.items(), 7);
    }

    #[test]
    fn test_tracker_emits_per_directory() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ProgressTracker::new(&tx, 100);

        tracker.record_file(Path::new("/d/f"), 5);
        tracker.record_dir(Path::new("/d"));

        let p = rx.try_recv().unwrap();
        assert_eq!(p.items_scanned, 2);
        assert_eq!(p.bytes_scanned, 5);
        assert_eq!(p.current_path, PathBuf::from("/d"));
    }

    #[test]
    fn test_tracker_without_subscribers() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        let tracker = ProgressTracker::new(&tx, 1);
        tracker.record_dir(Path::new("/d"));
        assert_eq!(tracker.items(), 1);
    }

    #[test]
    fn test_throttle() {
        let mut throttle = ProgressThrottle::per_second(10);
        let t0 = Instant::now();

        assert!(throttle.ready_at(t0));
        assert!(!throttle.ready_at(t0 + Duration::from_millis(50)));
        assert!(throttle.ready_at(t0 + Duration::from_millis(100)));
        assert!(!throttle.ready_at(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_items_per_second() {
        let progress = ScanProgress {
            items_scanned: 100,
            elapsed: Duration::from_secs(2),
            ..ScanProgress::default()
        };
        assert_eq!(progress.items_per_second(), 50.0);
    }
}
