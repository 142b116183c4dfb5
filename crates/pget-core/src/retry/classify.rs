//! Sort transfer errors into those worth another attempt and those that
//! would fail the same way again.

use crate::error::FetchError;

/// Broad cause of a failed segment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or low-speed timeout.
    Timeout,
    /// 429 or 503.
    Throttled,
    /// Connection refused, reset or closed before the range was complete.
    Connection,
    /// Any other 5xx.
    ServerError,
    /// Client errors, ignored ranges and local storage failures.
    Permanent,
}

impl ErrorKind {
    /// Whether a later run of the same segment can succeed.
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Permanent)
    }
}

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Permanent,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Permanent
}

/// Kind of a failed segment run.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => classify_http_status(*code),
        // Server closed early; the next attempt resumes from the ledger.
        FetchError::PartialTransfer { .. } => ErrorKind::Connection,
        FetchError::RangeNotHonored { .. } | FetchError::Storage(_) => ErrorKind::Permanent,
    }
}
