//! Segment workers.
//!
//! A [`SegmentWorker`] fetches one segment with HTTP range requests, appending
//! each chunk to the segment's part file and then recording it in the ledger.
//! Between chunks it honors the job's cancel and pause signals. Failures are
//! returned, not retried; see [`crate::retry`] for the optional retry layer.

mod single;
mod transfer;

pub use single::{download_single, SingleStream};

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::control::ControlSignals;
use crate::error::FetchError;
use crate::http::CurlOptions;
use crate::ledger::ProgressLedger;
use crate::observer::DownloadObserver;
use crate::progress::{JobProgress, WorkerRate};
use crate::segmenter::Segment;
use crate::storage;

use transfer::{Stop, Transfer};

/// How a worker run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Every byte of the segment is in its part file and recorded.
    Completed,
    /// Stopped because the job was cancelled; progress so far is kept.
    Cancelled,
}

/// Everything one segment transfer needs. Borrowed from the job for the
/// duration of the run.
pub struct SegmentWorker<'a> {
    pub url: &'a str,
    pub segment: Segment,
    pub segment_count: usize,
    pub part_path: PathBuf,
    /// Largest unit written and recorded at once.
    pub chunk_size: usize,
    pub ledger: &'a ProgressLedger,
    pub signals: &'a ControlSignals,
    pub observer: &'a dyn DownloadObserver,
    pub progress: &'a JobProgress,
    pub curl: CurlOptions,
}

impl SegmentWorker<'_> {
    /// Fetch whatever the ledger says is still missing from this segment.
    ///
    /// Returns immediately, without network access, when the segment is
    /// already complete. Batched ledger progress is flushed before returning.
    pub fn run(&self) -> Result<SegmentOutcome, FetchError> {
        let result = self.run_until_stopped();
        let flushed = self.ledger.flush().map_err(ledger_err);
        let outcome = result?;
        flushed?;
        Ok(outcome)
    }

    fn run_until_stopped(&self) -> Result<SegmentOutcome, FetchError> {
        let index = self.segment.index;
        loop {
            if self.signals.is_cancelled() {
                tracing::debug!(segment = index, "cancelled");
                return Ok(SegmentOutcome::Cancelled);
            }
            if self.signals.is_paused() {
                tracing::debug!(segment = index, "paused");
                self.observer
                    .on_status(&format!("Part {}/{} paused", index + 1, self.segment_count));
                self.signals.wait_while_paused();
                continue;
            }

            let (file, done) = self.open_part()?;
            let Some((start, end)) = self.segment.remaining_range(done) else {
                tracing::debug!(segment = index, "already complete");
                return Ok(SegmentOutcome::Completed);
            };

            tracing::debug!(segment = index, start, end, "fetching range");
            match transfer::fetch_range(self, file, start, end)? {
                Transfer::Finished => {
                    tracing::debug!(segment = index, "complete");
                    return Ok(SegmentOutcome::Completed);
                }
                Transfer::Stopped(Stop::Cancelled) => {
                    tracing::debug!(segment = index, "cancelled mid-transfer");
                    return Ok(SegmentOutcome::Cancelled);
                }
                Transfer::Stopped(Stop::Paused) => continue,
            }
        }
    }

    /// Open the part file for appending, lowering the ledger if the part file
    /// holds fewer bytes than recorded.
    fn open_part(&self) -> Result<(File, u64), FetchError> {
        let index = self.segment.index;
        let recorded = self.ledger.get(index);
        let (file, have) =
            storage::open_part_for_resume(&self.part_path, recorded).map_err(FetchError::Storage)?;
        if have < recorded {
            tracing::warn!(
                segment = index,
                recorded,
                on_disk = have,
                "part file shorter than ledger; resuming from part file length"
            );
            self.ledger.reset(index, have).map_err(ledger_err)?;
        }
        Ok((file, have))
    }
}

/// Map a ledger failure into the transfer error space.
fn ledger_err(e: crate::error::DownloadError) -> FetchError {
    FetchError::Storage(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Append `piece` to the part file, then record it for `index`.
/// The write always precedes the ledger update. Returns the new ledger value.
fn write_increment(
    file: &mut File,
    ledger: &ProgressLedger,
    index: usize,
    piece: &[u8],
) -> Result<u64, FetchError> {
    file.write_all(piece).map_err(FetchError::Storage)?;
    ledger
        .record_progress(index, piece.len() as u64)
        .map_err(ledger_err)
}

/// Turns written chunks into observer notifications for one transfer.
struct Reporter<'a> {
    index: usize,
    segment_count: usize,
    /// Full span of the segment (0 when unknown).
    segment_total: u64,
    observer: &'a dyn DownloadObserver,
    progress: &'a JobProgress,
    rate: WorkerRate,
}

impl<'a> Reporter<'a> {
    fn new(
        index: usize,
        segment_count: usize,
        segment_total: u64,
        observer: &'a dyn DownloadObserver,
        progress: &'a JobProgress,
    ) -> Self {
        Reporter {
            index,
            segment_count,
            segment_total,
            observer,
            progress,
            rate: WorkerRate::start(),
        }
    }

    /// `delta` bytes were written; `done` is the segment's running total.
    fn chunk(&mut self, delta: u64, done: u64) {
        self.progress.add(delta);
        let speed = self.rate.add(delta);

        self.observer.on_progress(self.index, delta, self.segment_total);
        let status = if self.segment_total > 0 {
            format!(
                "Downloading part {}/{}: {:.2}%",
                self.index + 1,
                self.segment_count,
                done as f64 / self.segment_total as f64 * 100.0
            )
        } else {
            format!(
                "Downloading part {}/{}: {} bytes",
                self.index + 1,
                self.segment_count,
                done
            )
        };
        self.observer.on_status(&status);
        if let Some(eta) = self.progress.eta_secs() {
            self.observer.on_time_remaining(eta);
        }
        if speed > 0.0 {
            self.observer.on_speed(speed);
        }
    }
}
