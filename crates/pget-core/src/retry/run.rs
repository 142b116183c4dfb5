//! Re-running a failed segment.

use super::classify;
use super::policy::RetryPolicy;
use crate::control::ControlSignals;
use crate::error::FetchError;
use crate::worker::SegmentOutcome;

/// Runs `f` until it succeeds, the policy gives up, or the job is cancelled
/// during a backoff wait. Returns the error of the last run when giving up.
pub fn run_with_retry<F>(
    policy: &RetryPolicy,
    signals: &ControlSignals,
    mut f: F,
) -> Result<SegmentOutcome, FetchError>
where
    F: FnMut() -> Result<SegmentOutcome, FetchError>,
{
    let mut failures = 0u32;
    loop {
        let e = match f() {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };
        failures += 1;
        let Some(delay) = policy.next_delay(failures, &e) else {
            tracing::debug!(attempts = failures, "giving up: {}", e);
            return Err(e);
        };
        tracing::debug!(
            attempt = failures,
            kind = ?classify::classify(&e),
            delay_ms = delay.as_millis() as u64,
            "retrying after: {}",
            e
        );
        if signals.sleep_unless_cancelled(delay) {
            return Ok(SegmentOutcome::Cancelled);
        }
    }
}
