//! One ranged GET for a segment, streamed into its part file.

use std::fs::File;

use curl::easy::{Easy2, Handler, WriteError};

use crate::error::FetchError;
use crate::http::{self, HeaderLines};

use super::{write_increment, Reporter, SegmentWorker};

/// Why a transfer stopped before the range was complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stop {
    Cancelled,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Transfer {
    Finished,
    Stopped(Stop),
}

/// Easy2 handler for one range request. Validates `206` and `Content-Range`
/// before the first byte is written.
struct SegmentHandler<'w, 'a> {
    worker: &'w SegmentWorker<'a>,
    file: File,
    /// Requested range, inclusive.
    start: u64,
    end: u64,
    headers: HeaderLines,
    /// None = not yet checked; Some(false) = body is not the requested range
    /// (an error status, a 2xx other than 206, or a mismatched Content-Range).
    range_ok: Option<bool>,
    received: u64,
    reporter: Reporter<'w>,
    stop: Option<Stop>,
    failure: Option<FetchError>,
}

impl SegmentHandler<'_, '_> {
    fn expected(&self) -> u64 {
        self.end - self.start + 1
    }

    fn check_range(&mut self) -> bool {
        if self.range_ok.is_none() {
            let lines = self.headers.lines();
            let status_ok = http::parse_http_status(lines) == Some(206);
            let range_ok = http::parse_content_range(lines)
                .map(|cr| cr.start == self.start && cr.end == self.end)
                .unwrap_or(false);
            self.range_ok = Some(status_ok && range_ok);
        }
        self.range_ok == Some(true)
    }
}

impl Handler for SegmentHandler<'_, '_> {
    fn header(&mut self, data: &[u8]) -> bool {
        self.headers.push_raw(data);
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.check_range() {
            return Ok(0);
        }
        let index = self.worker.segment.index;
        let allowed = self.expected().saturating_sub(self.received).min(data.len() as u64) as usize;
        for piece in data[..allowed].chunks(self.worker.chunk_size.max(1)) {
            let done = match write_increment(&mut self.file, self.worker.ledger, index, piece) {
                Ok(done) => done,
                Err(e) => {
                    self.failure = Some(e);
                    return Ok(0);
                }
            };
            self.received += piece.len() as u64;
            self.reporter.chunk(piece.len() as u64, done);
            if self.worker.signals.is_cancelled() {
                self.stop = Some(Stop::Cancelled);
                return Ok(0);
            }
        }
        if self.worker.signals.is_paused() && self.received < self.expected() {
            self.stop = Some(Stop::Paused);
            return Ok(0);
        }
        Ok(data.len())
    }
}

/// GET `[start, end]` and append it to `file`.
///
/// Aborting the transfer from the write callback is how cancel and pause take
/// effect; everything written before that point is already recorded.
pub(super) fn fetch_range(
    worker: &SegmentWorker<'_>,
    file: File,
    start: u64,
    end: u64,
) -> Result<Transfer, FetchError> {
    let reporter = Reporter::new(
        worker.segment.index,
        worker.segment_count,
        worker.segment.len(),
        worker.observer,
        worker.progress,
    );
    let mut easy = Easy2::new(SegmentHandler {
        worker,
        file,
        start,
        end,
        headers: HeaderLines::default(),
        range_ok: None,
        received: 0,
        reporter,
        stop: None,
        failure: None,
    });
    http::configure(&mut easy, worker.url, &worker.curl)?;
    easy.range(&format!("{}-{}", start, end))?;
    // Delivery size from libcurl; pieces above chunk_size are split in the handler.
    easy.buffer_size(worker.chunk_size.clamp(1024, 512 * 1024))?;

    let performed = easy.perform();
    let code = easy.response_code().unwrap_or(0);
    let handler = easy.get_mut();

    if let Some(e) = handler.failure.take() {
        return Err(e);
    }
    if let Some(stop) = handler.stop {
        return Ok(Transfer::Stopped(stop));
    }
    if let Some(e) = rejected_response(code, handler.range_ok, start, end) {
        return Err(e);
    }
    performed?;

    if code != 206 {
        return Err(FetchError::RangeNotHonored { start, end, status: code });
    }
    let expected = handler.expected();
    if handler.received != expected {
        return Err(FetchError::PartialTransfer {
            expected,
            received: handler.received,
        });
    }
    Ok(Transfer::Finished)
}

/// Error for a response whose body was refused by the handler. A non-2xx
/// status is an HTTP error whatever the range headers say; only a success
/// status with the wrong range means the server ignored the request.
fn rejected_response(
    code: u32,
    range_ok: Option<bool>,
    start: u64,
    end: u64,
) -> Option<FetchError> {
    if code != 0 && !(200..300).contains(&code) {
        return Some(FetchError::Http(code));
    }
    if range_ok == Some(false) {
        return Some(FetchError::RangeNotHonored { start, end, status: code });
    }
    None
}
