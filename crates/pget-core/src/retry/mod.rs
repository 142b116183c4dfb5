//! Optional retry and backoff above the segment workers.
//!
//! Workers never retry on their own. When a job is configured with a
//! [`RetryPolicy`], a failed worker run is classified (timeouts, throttling,
//! connection failures) and run again after an exponential backoff. Each
//! re-run resumes from the ledger, so nothing already written is fetched twice.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status, ErrorKind};
pub use policy::RetryPolicy;
pub use run::run_with_retry;
