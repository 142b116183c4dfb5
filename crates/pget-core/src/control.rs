//! Job control for pause/cancel.
//!
//! Each job owns one [`ControlSignals`], shared by reference with all of its
//! segment workers. Workers check the signals between chunks; a paused worker
//! blocks on a condition variable until resumed or cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cancel flag (monotonic) and pause flag (togglable) for one job.
#[derive(Debug, Default)]
pub struct ControlSignals {
    cancelled: AtomicBool,
    paused: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; once set it is never cleared.
    /// Wakes paused workers so they can observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clear the pause flag and wake all paused workers.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn notify(&self) {
        // Taking the lock orders the flag store before any waiter's re-check.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }

    /// Block while the job is paused. Returns early if it is cancelled.
    pub fn wait_while_paused(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.is_paused() && !self.is_cancelled() {
            guard = self
                .wake
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleep for `duration` unless cancelled first. Returns true if cancelled.
    pub fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = self
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        self.is_cancelled()
    }
}

/// Cloneable control surface for an active job, handed to front-ends.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    signals: Arc<ControlSignals>,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        tracing::info!("cancel requested");
        self.signals.cancel();
    }

    pub fn pause(&self) {
        tracing::info!("pause requested");
        self.signals.pause();
    }

    pub fn resume(&self) {
        tracing::info!("resume requested");
        self.signals.resume();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        self.signals.is_paused()
    }

    pub fn signals(&self) -> &ControlSignals {
        &self.signals
    }
}
