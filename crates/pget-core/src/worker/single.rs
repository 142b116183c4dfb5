//! Single-stream GET (no Range) for servers without a usable length or range support.
//!
//! The whole body goes into part file 0 and is recorded under segment 0. Such
//! a transfer cannot be resumed, so it always starts from byte 0. Pausing
//! blocks inside the transfer and holds the connection open; a pause longer
//! than the read timeout fails the transfer.

use std::fs::File;
use std::path::PathBuf;

use curl::easy::{Easy2, Handler, WriteError};

use crate::control::ControlSignals;
use crate::error::FetchError;
use crate::http::{self, CurlOptions, HeaderLines};
use crate::ledger::ProgressLedger;
use crate::observer::DownloadObserver;
use crate::progress::JobProgress;

use super::{ledger_err, write_increment, Reporter, SegmentOutcome};

/// Inputs for a single-stream download.
pub struct SingleStream<'a> {
    pub url: &'a str,
    pub part_path: PathBuf,
    /// Size from the probe when it was known (servers without range support).
    pub expected_len: Option<u64>,
    pub chunk_size: usize,
    pub ledger: &'a ProgressLedger,
    pub signals: &'a ControlSignals,
    pub observer: &'a dyn DownloadObserver,
    pub progress: &'a JobProgress,
    pub curl: CurlOptions,
}

struct SingleHandler<'a> {
    file: File,
    headers: HeaderLines,
    chunk_size: usize,
    ledger: &'a ProgressLedger,
    signals: &'a ControlSignals,
    reporter: Reporter<'a>,
    received: u64,
    cancelled: bool,
    failure: Option<FetchError>,
}

impl Handler for SingleHandler<'_> {
    fn header(&mut self, data: &[u8]) -> bool {
        self.headers.push_raw(data);
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.received == 0 {
            // Error pages must not end up in the part file.
            match http::parse_http_status(self.headers.lines()) {
                Some(code) if !(200..300).contains(&code) => {
                    self.failure = Some(FetchError::Http(code));
                    return Ok(0);
                }
                _ => {}
            }
        }
        for piece in data.chunks(self.chunk_size.max(1)) {
            match write_increment(&mut self.file, self.ledger, 0, piece) {
                Ok(done) => {
                    self.received += piece.len() as u64;
                    self.reporter.chunk(piece.len() as u64, done);
                }
                Err(e) => {
                    self.failure = Some(e);
                    return Ok(0);
                }
            }
            if self.signals.is_paused() {
                self.signals.wait_while_paused();
            }
            if self.signals.is_cancelled() {
                self.cancelled = true;
                return Ok(0);
            }
        }
        Ok(data.len())
    }
}

/// Download the whole body with one GET into part file 0.
pub fn download_single(stream: SingleStream<'_>) -> Result<SegmentOutcome, FetchError> {
    if stream.signals.is_cancelled() {
        return Ok(SegmentOutcome::Cancelled);
    }
    let file = File::create(&stream.part_path).map_err(FetchError::Storage)?;
    stream.ledger.reset(0, 0).map_err(ledger_err)?;

    let reporter = Reporter::new(
        0,
        1,
        stream.expected_len.unwrap_or(0),
        stream.observer,
        stream.progress,
    );
    let mut easy = Easy2::new(SingleHandler {
        file,
        headers: HeaderLines::default(),
        chunk_size: stream.chunk_size,
        ledger: stream.ledger,
        signals: stream.signals,
        reporter,
        received: 0,
        cancelled: false,
        failure: None,
    });
    http::configure(&mut easy, stream.url, &stream.curl)?;
    easy.buffer_size(stream.chunk_size.clamp(1024, 512 * 1024))?;

    tracing::debug!(url = stream.url, "single-stream GET");
    let performed = easy.perform();
    let handler = easy.get_mut();
    if let Some(e) = handler.failure.take() {
        return Err(e);
    }
    let received = handler.received;
    let cancelled = handler.cancelled;
    stream.ledger.flush().map_err(ledger_err)?;
    if cancelled {
        return Ok(SegmentOutcome::Cancelled);
    }
    performed?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    if let Some(expected) = stream.expected_len {
        if received != expected {
            return Err(FetchError::PartialTransfer { expected, received });
        }
    }
    Ok(SegmentOutcome::Completed)
}
