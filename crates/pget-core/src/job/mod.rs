//! Download orchestration: one [`DownloadJob`] per destination file.
//!
//! A job probes the size, plans the segments, loads the progress ledger, runs
//! the segment workers on a bounded thread pool and merges the part files once
//! every segment is complete. Servers that report no length or do not honor
//! ranges are fetched with a single stream instead.

mod pool;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::PgetConfig;
use crate::control::JobHandle;
use crate::error::{DownloadError, FetchError};
use crate::http::CurlOptions;
use crate::ledger::ProgressLedger;
use crate::observer::{DownloadObserver, NoopObserver};
use crate::probe;
use crate::progress::JobProgress;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::segmenter::{plan_segments, SplitPlan, MAX_CHUNK_SIZE};
use crate::storage;
use crate::worker::{download_single, SegmentOutcome, SingleStream};

use pool::SegmentPool;

/// Caller-supplied values that replace probed or derived ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub segment_count: Option<usize>,
    /// Bytes per write/ledger increment.
    pub chunk_size: Option<u64>,
    /// Known object size; skips the probe and assumes range support.
    pub total_size: Option<u64>,
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Planning,
    Running,
    Completed,
    Cancelled,
    Partial,
    /// The job stopped on an error that is not a segment failure (probe,
    /// ledger or merge).
    Failed,
}

/// Result of a job run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Destination written, part files and ledger removed.
    Completed { bytes: u64 },
    /// Cancel was requested; part files and ledger are kept for a later resume.
    Cancelled,
}

pub struct DownloadJob {
    url: String,
    destination: PathBuf,
    options: JobOptions,
    curl: CurlOptions,
    ledger_flush_every: u32,
    max_concurrent: Option<usize>,
    retry: Option<RetryPolicy>,
    observer: Arc<dyn DownloadObserver>,
    handle: JobHandle,
    state: Mutex<JobState>,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        DownloadJob {
            url: url.into(),
            destination: destination.into(),
            options: JobOptions::default(),
            curl: CurlOptions::default(),
            ledger_flush_every: 1,
            max_concurrent: None,
            retry: None,
            observer: Arc::new(NoopObserver),
            handle: JobHandle::new(),
            state: Mutex::new(JobState::Created),
        }
    }

    /// Apply timeouts, ledger batching, pool width and retry from `config`.
    /// Split overrides from the config fill only what `options` leaves unset.
    pub fn with_config(mut self, config: &PgetConfig) -> Self {
        self.curl = config.curl_options();
        self.ledger_flush_every = config.ledger_flush_every.max(1);
        self.max_concurrent = config.max_concurrent_segments.filter(|&n| n > 0);
        self.retry = config.retry_policy();
        self.options.segment_count = self.options.segment_count.or(config.segment_count);
        self.options.chunk_size = self.options.chunk_size.or(config.chunk_size_bytes);
        self
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = JobOptions {
            segment_count: options.segment_count.or(self.options.segment_count),
            chunk_size: options.chunk_size.or(self.options.chunk_size),
            total_size: options.total_size.or(self.options.total_size),
        };
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DownloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_retry(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Control handle for this job; clones share the same signals.
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: JobState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            tracing::info!(dest = %self.destination.display(), from = ?*state, to = ?next, "job state");
            *state = next;
        }
    }

    /// Run the job to completion, cancellation or failure. Blocks the calling thread.
    ///
    /// A previous interrupted run of the same destination is resumed from its
    /// ledger. If that run used a different segment count, its ledger and part
    /// files are discarded and the download starts over.
    pub fn run(&self) -> Result<JobOutcome, DownloadError> {
        if self.handle.is_cancelled() {
            self.set_state(JobState::Cancelled);
            return Ok(JobOutcome::Cancelled);
        }
        let result = self.plan_and_run();
        if let Err(e) = &result {
            if !matches!(e, DownloadError::Partial { .. }) {
                tracing::error!(dest = %self.destination.display(), "download failed: {}", e);
                self.set_state(JobState::Failed);
            }
        }
        result
    }

    fn plan_and_run(&self) -> Result<JobOutcome, DownloadError> {
        self.set_state(JobState::Planning);

        let (total, ranged) = match self.options.total_size.filter(|&n| n > 0) {
            Some(total) => (Some(total), true),
            None => {
                let head = probe::probe(&self.url, &self.curl).map_err(DownloadError::Probe)?;
                tracing::debug!(url = %self.url, ?head, "probed");
                (head.known_size(), head.accept_ranges)
            }
        };

        match total {
            Some(total) if ranged => self.run_segmented(total),
            _ => {
                tracing::info!(
                    url = %self.url,
                    size = ?total,
                    ranged,
                    "no usable length or range support; falling back to a single stream"
                );
                self.run_single_stream(total)
            }
        }
    }

    fn run_segmented(&self, total: u64) -> Result<JobOutcome, DownloadError> {
        let plan = SplitPlan::with_overrides(total, self.options.segment_count, self.options.chunk_size);
        let segments = plan_segments(total, plan.segment_count);
        let ledger = ProgressLedger::load(&self.destination, segments.len())?
            .with_flush_every(self.ledger_flush_every);
        if ledger.stale_plan().is_some() {
            // Old parts hold other byte ranges; none of them can be kept.
            let removed = storage::remove_parts_from(&self.destination, 0)
                .map_err(|e| DownloadError::io(&self.destination, e))?;
            tracing::info!(
                dest = %self.destination.display(),
                removed,
                "removed part files of the old split"
            );
            ledger.flush()?;
        }
        ledger.clamp_to(&segments)?;

        let progress = JobProgress::new(total, ledger.total());
        tracing::info!(
            url = %self.url,
            dest = %self.destination.display(),
            total,
            segments = segments.len(),
            chunk_size = plan.chunk_size,
            resumed = ledger.total(),
            "starting segmented download"
        );
        self.set_state(JobState::Running);

        let pool = SegmentPool {
            url: &self.url,
            destination: &self.destination,
            segment_count: segments.len(),
            chunk_size: chunk_len(plan.chunk_size),
            ledger: &ledger,
            signals: self.handle.signals(),
            observer: self.observer.as_ref(),
            progress: &progress,
            curl: self.curl,
            retry: self.retry,
            max_concurrent: self.max_concurrent,
        };
        let results = pool.run(&segments);
        self.finish(results, &ledger, segments.len())
    }

    fn run_single_stream(&self, expected_len: Option<u64>) -> Result<JobOutcome, DownloadError> {
        // Nothing to resume from: part 0 is rewritten from byte 0 and parts
        // left by an earlier segmented attempt would never be merged.
        storage::remove_parts_from(&self.destination, 1)
            .map_err(|e| DownloadError::io(&self.destination, e))?;
        let ledger = ProgressLedger::load(&self.destination, 1)?
            .with_flush_every(self.ledger_flush_every);
        let progress = JobProgress::new(expected_len.unwrap_or(0), 0);
        let chunk_size = chunk_len(
            self.options
                .chunk_size
                .filter(|&n| n > 0)
                .unwrap_or(MAX_CHUNK_SIZE),
        );
        self.set_state(JobState::Running);

        let signals = self.handle.signals();
        let attempt = || {
            download_single(SingleStream {
                url: &self.url,
                part_path: storage::part_path(&self.destination, 0),
                expected_len,
                chunk_size,
                ledger: &ledger,
                signals,
                observer: self.observer.as_ref(),
                progress: &progress,
                curl: self.curl,
            })
        };
        let result = match &self.retry {
            Some(policy) => run_with_retry(policy, signals, attempt),
            None => attempt(),
        };
        self.finish(vec![(0, result)], &ledger, 1)
    }

    /// Turn worker results into the job outcome: cancel wins, then failures,
    /// and only a clean run is merged.
    fn finish(
        &self,
        results: Vec<(usize, Result<SegmentOutcome, FetchError>)>,
        ledger: &ProgressLedger,
        segment_count: usize,
    ) -> Result<JobOutcome, DownloadError> {
        let mut cancelled = false;
        let mut failures = Vec::new();
        for (segment, result) in results {
            match result {
                Ok(SegmentOutcome::Completed) => {}
                Ok(SegmentOutcome::Cancelled) => cancelled = true,
                Err(source) => {
                    tracing::warn!(segment, "segment failed: {}", source);
                    failures.push(DownloadError::Fetch { segment, source });
                }
            }
        }

        if cancelled || self.handle.is_cancelled() {
            self.set_state(JobState::Cancelled);
            keep_ledger(ledger);
            self.observer.on_status("Download cancelled");
            return Ok(JobOutcome::Cancelled);
        }
        if !failures.is_empty() {
            self.set_state(JobState::Partial);
            keep_ledger(ledger);
            let failed = failures.len();
            let first = failures.swap_remove(0);
            return Err(DownloadError::Partial {
                failed,
                first: Box::new(first),
            });
        }

        let parts = storage::part_paths(&self.destination, segment_count);
        let bytes = storage::merge_parts(&parts, &self.destination)?;
        ProgressLedger::discard(&self.destination)?;
        self.set_state(JobState::Completed);
        tracing::info!(dest = %self.destination.display(), bytes, "download complete");
        self.observer.on_status("Download Complete");
        Ok(JobOutcome::Completed { bytes })
    }
}

/// Flush batched progress of a job that stops short; a failure is only logged
/// since part files are truncated back to the ledger on resume.
fn keep_ledger(ledger: &ProgressLedger) {
    if let Err(e) = ledger.flush() {
        tracing::warn!("could not save progress: {}", e);
    }
}

fn chunk_len(chunk_size: u64) -> usize {
    usize::try_from(chunk_size.max(1)).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_before_run_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest);
        job.handle().cancel();
        assert_eq!(job.run().unwrap(), JobOutcome::Cancelled);
        assert_eq!(job.state(), JobState::Cancelled);
        assert!(!storage::ledger_path(&dest).exists());
        assert!(!dest.exists());
    }

    #[test]
    fn options_override_config_values() {
        let config = PgetConfig {
            segment_count: Some(8),
            chunk_size_bytes: Some(4096),
            max_concurrent_segments: Some(0),
            ..PgetConfig::default()
        };
        let job = DownloadJob::new("http://example.invalid/f", "f")
            .with_options(JobOptions {
                segment_count: Some(2),
                ..JobOptions::default()
            })
            .with_config(&config);
        assert_eq!(job.options.segment_count, Some(2));
        assert_eq!(job.options.chunk_size, Some(4096));
        assert_eq!(job.max_concurrent, None);
        assert!(job.retry.is_none());
        assert_eq!(job.state(), JobState::Created);
    }

    #[test]
    fn completed_ledger_is_merged_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let data: Vec<u8> = (0..100u8).collect();
        let segments = plan_segments(100, 4);
        let ledger = ProgressLedger::load(&dest, 4).unwrap();
        for s in &segments {
            std::fs::write(
                storage::part_path(&dest, s.index),
                &data[s.start as usize..=s.end as usize],
            )
            .unwrap();
            ledger.reset(s.index, s.len()).unwrap();
        }

        let job = DownloadJob::new("http://127.0.0.1:9/", &dest).with_options(JobOptions {
            segment_count: Some(4),
            total_size: Some(100),
            ..JobOptions::default()
        });
        assert_eq!(job.run().unwrap(), JobOutcome::Completed { bytes: 100 });
        assert_eq!(std::fs::read(&dest).unwrap(), data);
        assert!(!storage::ledger_path(&dest).exists());
        assert!(!storage::part_path(&dest, 0).exists());
    }

    #[test]
    fn unreachable_server_leaves_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest).with_options(JobOptions {
            segment_count: Some(2),
            total_size: Some(10),
            ..JobOptions::default()
        });
        match job.run() {
            Err(DownloadError::Partial { failed, first }) => {
                assert_eq!(failed, 2);
                assert!(matches!(*first, DownloadError::Fetch { .. }));
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        assert_eq!(job.state(), JobState::Partial);
        assert!(!dest.exists());
    }

    /// A ledger whose batched progress can no longer be written: the temp
    /// file used for the atomic replace is blocked by a directory.
    fn unwritable_ledger(dest: &Path) -> ProgressLedger {
        let ledger = ProgressLedger::load(dest, 2).unwrap().with_flush_every(100);
        ledger.record_progress(0, 5).unwrap();
        let mut tmp = storage::ledger_path(dest).into_os_string();
        tmp.push(".tmp");
        std::fs::create_dir(tmp).unwrap();
        ledger
    }

    #[test]
    fn failed_ledger_flush_keeps_partial_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let ledger = unwritable_ledger(&dest);
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest);
        job.set_state(JobState::Running);

        let results = vec![
            (1, Ok(SegmentOutcome::Completed)),
            (0, Err(FetchError::Http(503))),
        ];
        match job.finish(results, &ledger, 2) {
            Err(DownloadError::Partial { failed, first }) => {
                assert_eq!(failed, 1);
                assert!(matches!(
                    *first,
                    DownloadError::Fetch { segment: 0, source: FetchError::Http(503) }
                ));
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        assert_eq!(job.state(), JobState::Partial);
    }

    #[test]
    fn failed_ledger_flush_keeps_cancelled_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let ledger = unwritable_ledger(&dest);
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest);
        job.set_state(JobState::Running);

        let results = vec![
            (0, Ok(SegmentOutcome::Cancelled)),
            (1, Err(FetchError::Http(500))),
        ];
        assert_eq!(job.finish(results, &ledger, 2).unwrap(), JobOutcome::Cancelled);
        assert_eq!(job.state(), JobState::Cancelled);
    }

    #[test]
    fn merge_failure_leaves_failed_state_and_parts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let data: Vec<u8> = (0..100u8).collect();
        let ledger = ProgressLedger::load(&dest, 2).unwrap();
        for s in plan_segments(100, 2) {
            std::fs::write(
                storage::part_path(&dest, s.index),
                &data[s.start as usize..=s.end as usize],
            )
            .unwrap();
            ledger.reset(s.index, s.len()).unwrap();
        }
        // The merged file cannot be renamed onto a non-empty directory.
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), b"x").unwrap();

        let job = DownloadJob::new("http://127.0.0.1:9/", &dest).with_options(JobOptions {
            segment_count: Some(2),
            total_size: Some(100),
            ..JobOptions::default()
        });
        assert!(matches!(job.run(), Err(DownloadError::Merge { .. })));
        assert_eq!(job.state(), JobState::Failed);
        assert!(storage::ledger_path(&dest).exists());
        assert!(storage::part_path(&dest, 0).exists());
        assert!(storage::part_path(&dest, 1).exists());
    }

    #[test]
    fn probe_failure_leaves_failed_state() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest);
        assert!(matches!(job.run(), Err(DownloadError::Probe(_))));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn single_stream_removes_parts_of_a_segmented_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        for i in 0..4 {
            std::fs::write(storage::part_path(&dest, i), b"old").unwrap();
        }
        let job = DownloadJob::new("http://127.0.0.1:9/", &dest);
        // Nothing listens on port 9, so the stream fails after the cleanup.
        assert!(job.run_single_stream(None).is_err());
        for i in 1..4 {
            assert!(!storage::part_path(&dest, i).exists(), "part{} should be removed", i);
        }
    }
}
