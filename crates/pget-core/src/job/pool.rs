//! Bounded worker pool for the segments of one job.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;

use crate::control::ControlSignals;
use crate::error::FetchError;
use crate::http::CurlOptions;
use crate::ledger::ProgressLedger;
use crate::observer::DownloadObserver;
use crate::progress::JobProgress;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::segmenter::Segment;
use crate::storage;
use crate::worker::{SegmentOutcome, SegmentWorker};

pub(super) type SegmentResult = (usize, Result<SegmentOutcome, FetchError>);

/// Shared state every worker thread borrows for the duration of [`SegmentPool::run`].
pub(super) struct SegmentPool<'a> {
    pub url: &'a str,
    pub destination: &'a Path,
    pub segment_count: usize,
    pub chunk_size: usize,
    pub ledger: &'a ProgressLedger,
    pub signals: &'a ControlSignals,
    pub observer: &'a dyn DownloadObserver,
    pub progress: &'a JobProgress,
    pub curl: CurlOptions,
    pub retry: Option<RetryPolicy>,
    /// Pool width cap; None runs one thread per segment.
    pub max_concurrent: Option<usize>,
}

impl SegmentPool<'_> {
    /// Run every segment and return results in completion order.
    ///
    /// A failed segment does not stop the others; whatever they fetch is kept
    /// for the next run.
    pub(super) fn run(&self, segments: &[Segment]) -> Vec<SegmentResult> {
        if segments.is_empty() {
            return Vec::new();
        }
        let width = self
            .max_concurrent
            .unwrap_or(segments.len())
            .clamp(1, segments.len());
        let work: Mutex<VecDeque<Segment>> = Mutex::new(segments.iter().copied().collect());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..width {
                let tx = tx.clone();
                let work = &work;
                scope.spawn(move || loop {
                    let next = work
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(segment) = next else { break };
                    let result = self.run_segment(segment);
                    if tx.send((segment.index, result)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);
            rx.iter().collect()
        })
    }

    fn run_segment(&self, segment: Segment) -> Result<SegmentOutcome, FetchError> {
        let worker = SegmentWorker {
            url: self.url,
            segment,
            segment_count: self.segment_count,
            part_path: storage::part_path(self.destination, segment.index),
            chunk_size: self.chunk_size,
            ledger: self.ledger,
            signals: self.signals,
            observer: self.observer,
            progress: self.progress,
            curl: self.curl,
        };
        tracing::debug!(segment = segment.index, start = segment.start, end = segment.end, "segment start");
        let result = match &self.retry {
            Some(policy) => run_with_retry(policy, self.signals, || worker.run()),
            None => worker.run(),
        };
        tracing::debug!(segment = segment.index, ok = result.is_ok(), "segment finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use crate::segmenter::plan_segments;

    #[test]
    fn finished_segments_report_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let segments = plan_segments(40, 4);
        let ledger = ProgressLedger::load(&dest, 4).unwrap();
        for s in &segments {
            std::fs::write(storage::part_path(&dest, s.index), vec![0u8; s.len() as usize]).unwrap();
            ledger.reset(s.index, s.len()).unwrap();
        }
        let signals = ControlSignals::new();
        let progress = JobProgress::new(40, 40);
        let pool = SegmentPool {
            url: "http://127.0.0.1:9/",
            destination: &dest,
            segment_count: 4,
            chunk_size: 8,
            ledger: &ledger,
            signals: &signals,
            observer: &NoopObserver,
            progress: &progress,
            curl: CurlOptions::default(),
            retry: None,
            max_concurrent: Some(2),
        };
        let mut results = pool.run(&segments);
        results.sort_by_key(|(i, _)| *i);
        let indices: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, Ok(SegmentOutcome::Completed))));
    }
}
