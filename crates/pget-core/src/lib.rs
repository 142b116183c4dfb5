//! Segmented parallel HTTP downloader.
//!
//! [`job::DownloadJob`] fetches one URL into one destination file: the object
//! is split into byte ranges fetched concurrently into part files, per-segment
//! progress is persisted in a ledger next to the destination so an interrupted
//! run resumes where it stopped, and the parts are concatenated at the end.

pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod http;
pub mod job;
pub mod ledger;
pub mod naming;
pub mod observer;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod worker;

pub use control::JobHandle;
pub use error::{DownloadError, FetchError};
pub use job::{DownloadJob, JobOptions, JobOutcome, JobState};
pub use observer::{DownloadObserver, NoopObserver};
