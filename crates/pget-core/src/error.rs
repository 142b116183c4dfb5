//! Error types for the download engine.
//!
//! `FetchError` describes why one HTTP transfer failed and is what the retry
//! layer classifies. `DownloadError` is the job-level error returned by
//! [`crate::job::DownloadJob::run`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single HTTP transfer (probe, range GET or single-stream GET).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection reset, DNS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Non-2xx status, with or without a body.
    #[error("HTTP {0}")]
    Http(u32),
    /// A success status other than 206, or a 206 for a different range.
    #[error("server did not honor range {start}-{end} (status {status})")]
    RangeNotHonored { start: u64, end: u64, status: u32 },
    /// Transfer ended before the requested number of bytes arrived.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Writing the part file or the ledger failed. Not retried.
    #[error("storage: {0}")]
    Storage(#[source] io::Error),
}

/// Job-level error.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Server did not report a usable content length; range splitting is not possible.
    #[error("server did not report a content length")]
    SizeUnavailable,
    /// Size probe failed for a reason other than a missing length.
    #[error("size probe failed: {0}")]
    Probe(#[source] FetchError),
    /// A segment transfer failed.
    #[error("segment {segment}: {source}")]
    Fetch {
        segment: usize,
        #[source]
        source: FetchError,
    },
    /// Part file missing or destination not writable while merging.
    #[error("merge failed at {}: {source}", path.display())]
    Merge {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Ledger file exists but could not be parsed.
    #[error("progress ledger {} is corrupt: {source}", path.display())]
    LedgerCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Other local I/O failure (ledger write, part file setup).
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// One or more segments failed; carries the first failure. Progress is kept on disk.
    #[error("download incomplete, {failed} segment(s) failed; first error: {first}")]
    Partial {
        failed: usize,
        #[source]
        first: Box<DownloadError>,
    },
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DownloadError::Io {
            path: path.into(),
            source,
        }
    }
}
