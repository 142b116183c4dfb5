//! Throughput and ETA figures reported to observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Job-wide counters shared by all workers of one run.
#[derive(Debug)]
pub struct JobProgress {
    /// Total object size in bytes (0 when unknown).
    total_bytes: u64,
    /// Bytes already on disk when this run started (resumed progress).
    resumed_bytes: u64,
    /// Bytes received during this run.
    received: AtomicU64,
    started: Instant,
}

impl JobProgress {
    pub fn new(total_bytes: u64, resumed_bytes: u64) -> Self {
        JobProgress {
            total_bytes,
            resumed_bytes,
            received: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Count `n` newly received bytes; returns the running total for this run.
    pub fn add(&self, n: u64) -> u64 {
        self.received.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Bytes on disk overall (resumed + this run).
    pub fn bytes_done(&self) -> u64 {
        self.resumed_bytes + self.received()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Download rate of this run in bytes per second (0 before any time elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        rate(self.received(), self.started.elapsed().as_secs_f64())
    }

    /// Estimated seconds remaining (None if the size is unknown or nothing arrived yet).
    pub fn eta_secs(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_done());
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_done() as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Per-worker speed measurement since the worker started.
#[derive(Debug)]
pub struct WorkerRate {
    started: Instant,
    bytes: u64,
}

impl WorkerRate {
    pub fn start() -> Self {
        WorkerRate {
            started: Instant::now(),
            bytes: 0,
        }
    }

    /// Count `n` bytes and return the worker's average rate so far.
    pub fn add(&mut self, n: u64) -> f64 {
        self.bytes += n;
        rate(self.bytes, self.started.elapsed().as_secs_f64())
    }
}

fn rate(bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / elapsed_secs
}
