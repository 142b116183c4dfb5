//! Notifications from the engine to whatever front-end is attached.
//!
//! All callbacks are advisory: they never affect whether a download succeeds,
//! and every method defaults to a no-op so implementors pick what they need.
//! Callbacks run on segment worker threads and must not block for long.

/// Receives progress, status, time-remaining and speed notifications.
pub trait DownloadObserver: Send + Sync {
    /// `delta` bytes were just written for `segment`, whose full span is
    /// `segment_total` bytes (0 when the size is unknown).
    fn on_progress(&self, _segment: usize, _delta: u64, _segment_total: u64) {}

    /// Human-readable status line.
    fn on_status(&self, _message: &str) {}

    /// Estimated seconds until the whole job completes.
    fn on_time_remaining(&self, _seconds: f64) {}

    /// Current throughput of the reporting worker in bytes per second.
    fn on_speed(&self, _bytes_per_sec: f64) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}
