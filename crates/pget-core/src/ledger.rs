//! Persistent per-segment progress for one destination file.
//!
//! The ledger maps segment index to the number of bytes already appended to
//! that segment's part file. It is stored next to the destination as a flat
//! JSON object (`{"0": 1048576, "1": 0}`) and rewritten whenever progress is
//! recorded, so an interrupted job can resume from exactly where each segment
//! stopped. Callers must write to the part file before recording the bytes
//! here; the on-disk ledger then never claims more than the part file holds.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::DownloadError;
use crate::segmenter::Segment;
use crate::storage;

#[derive(Debug)]
struct LedgerState {
    bytes: Vec<u64>,
    /// Records accepted since the last write to disk.
    unflushed: u32,
}

/// Segment progress shared by all workers of a job.
///
/// Counters and the serialized file sit behind a single mutex so concurrent
/// workers never interleave writes to the ledger file.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    flush_every: u32,
    stale_plan: Option<usize>,
    state: Mutex<LedgerState>,
}

impl ProgressLedger {
    /// Load the ledger for `destination`, sized for `segment_count` segments.
    ///
    /// Every persisted ledger lists all of its segments, so a file whose keys
    /// are not exactly `0..segment_count` was written under a different split.
    /// Its byte counts refer to other ranges and cannot be reused: the ledger
    /// starts from zero and [`ProgressLedger::stale_plan`] reports the old
    /// count so the caller can drop the old part files. A missing ledger means
    /// a fresh start; an unparsable one is logged and treated the same way.
    pub fn load(destination: &Path, segment_count: usize) -> Result<Self, DownloadError> {
        let path = storage::ledger_path(destination);
        let mut stale_plan = None;
        let bytes = match read_entries(&path) {
            Ok(Some(entries)) if entries.is_empty() => vec![0u64; segment_count],
            Ok(Some(entries)) if entries.keys().copied().eq(0..segment_count) => {
                entries.into_values().collect()
            }
            Ok(Some(entries)) => {
                let previous = entries.keys().next_back().map_or(0, |&max| max + 1);
                tracing::warn!(
                    ledger = %path.display(),
                    previous,
                    segment_count,
                    "ledger was written for a different segment count; starting over"
                );
                stale_plan = Some(previous);
                vec![0u64; segment_count]
            }
            Ok(None) => vec![0u64; segment_count],
            Err(e @ DownloadError::LedgerCorrupt { .. }) => {
                tracing::warn!("{}; starting from zero", e);
                vec![0u64; segment_count]
            }
            Err(e) => return Err(e),
        };
        Ok(ProgressLedger {
            path,
            flush_every: 1,
            stale_plan,
            state: Mutex::new(LedgerState {
                bytes,
                // The zeroed counters replace the stale file on the next flush.
                unflushed: u32::from(stale_plan.is_some()),
            }),
        })
    }

    /// Segment count of a discarded ledger from an earlier run with a
    /// different split, if [`ProgressLedger::load`] found one.
    pub fn stale_plan(&self) -> Option<usize> {
        self.stale_plan
    }

    /// Persist only every `n`-th record (n = 1 writes on every chunk).
    /// Anything not yet persisted is written by [`ProgressLedger::flush`].
    pub fn with_flush_every(mut self, n: u32) -> Self {
        self.flush_every = n.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of segments tracked.
    pub fn segment_count(&self) -> usize {
        self.lock().bytes.len()
    }

    /// Bytes recorded for `index` (0 for unknown indices).
    pub fn get(&self, index: usize) -> u64 {
        self.lock().bytes.get(index).copied().unwrap_or(0)
    }

    /// Copy of all counters, in index order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.lock().bytes.clone()
    }

    /// Sum of all counters.
    pub fn total(&self) -> u64 {
        self.lock().bytes.iter().sum()
    }

    /// Add `delta` bytes to segment `index` and persist (subject to batching).
    /// Returns the new counter value.
    pub fn record_progress(&self, index: usize, delta: u64) -> Result<u64, DownloadError> {
        let mut state = self.lock();
        let slot = state.bytes.get_mut(index).ok_or_else(|| {
            DownloadError::io(
                &self.path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("segment index {} out of range", index),
                ),
            )
        })?;
        *slot += delta;
        let value = *slot;
        state.unflushed += 1;
        if state.unflushed >= self.flush_every {
            self.persist(&state.bytes)?;
            state.unflushed = 0;
        }
        Ok(value)
    }

    /// Overwrite the counter for `index` and persist immediately.
    ///
    /// Only used to bring the ledger back in line with what is on disk (a part
    /// file that lost data, or a value larger than the segment).
    pub fn reset(&self, index: usize, value: u64) -> Result<(), DownloadError> {
        let mut state = self.lock();
        if let Some(slot) = state.bytes.get_mut(index) {
            *slot = value;
        }
        self.persist(&state.bytes)?;
        state.unflushed = 0;
        Ok(())
    }

    /// Cap every counter at its segment's length.
    pub fn clamp_to(&self, segments: &[Segment]) -> Result<(), DownloadError> {
        for seg in segments {
            let done = self.get(seg.index);
            if done > seg.len() {
                tracing::warn!(
                    segment = seg.index,
                    recorded = done,
                    len = seg.len(),
                    "ledger exceeds segment length; clamping"
                );
                self.reset(seg.index, seg.len())?;
            }
        }
        Ok(())
    }

    /// Write any batched progress to disk.
    pub fn flush(&self) -> Result<(), DownloadError> {
        let mut state = self.lock();
        if state.unflushed > 0 {
            self.persist(&state.bytes)?;
            state.unflushed = 0;
        }
        Ok(())
    }

    /// Remove the ledger file for `destination`. Only valid after a successful merge.
    pub fn discard(destination: &Path) -> Result<(), DownloadError> {
        let path = storage::ledger_path(destination);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DownloadError::io(path, e)),
        }
    }

    /// Serialize the whole map to a temp file and rename it over the ledger,
    /// so readers see either the old or the new ledger, never a torn write.
    fn persist(&self, bytes: &[u64]) -> Result<(), DownloadError> {
        let entries: BTreeMap<usize, u64> = bytes.iter().copied().enumerate().collect();
        let json = serde_json::to_vec(&entries).map_err(|e| {
            DownloadError::io(&self.path, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| DownloadError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| DownloadError::io(&self.path, e))?;
        Ok(())
    }
}

/// Read and parse the ledger file. `Ok(None)` when no ledger exists.
fn read_entries(path: &Path) -> Result<Option<BTreeMap<usize, u64>>, DownloadError> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DownloadError::io(path, e)),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| DownloadError::LedgerCorrupt {
            path: path.to_path_buf(),
            source,
        })
}
