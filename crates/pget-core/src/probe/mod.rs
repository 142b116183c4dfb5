//! Size probing.
//!
//! Issues a HEAD request to learn the object's `Content-Length` and whether
//! the server accepts byte ranges. Servers that reject HEAD, or that do not
//! advertise `Accept-Ranges`, get a `GET` with `Range: bytes=0-0` instead;
//! a `206` with `Content-Range: bytes 0-0/<total>` yields both answers while
//! transferring a single body byte.

mod parse;

use curl::easy::{Easy2, Handler, WriteError};

use crate::error::{DownloadError, FetchError};
use crate::http::{self, CurlOptions, HeaderLines};

pub use parse::HeadResult;

struct HeaderCollector {
    headers: HeaderLines,
    /// Range probe only: abort as soon as the body turns out not to be a 206.
    require_partial: bool,
}

impl Handler for HeaderCollector {
    fn header(&mut self, data: &[u8]) -> bool {
        self.headers.push_raw(data);
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.require_partial && http::parse_http_status(self.headers.lines()) != Some(206) {
            return Ok(0);
        }
        Ok(data.len())
    }
}

fn head_request(url: &str, opts: &CurlOptions) -> Result<HeadResult, FetchError> {
    let mut easy = Easy2::new(HeaderCollector {
        headers: HeaderLines::default(),
        require_partial: false,
    });
    http::configure(&mut easy, url, opts)?;
    easy.nobody(true)?;
    easy.perform()?;

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(parse::parse_headers(easy.get_ref().headers.lines()))
}

/// `GET` the first byte. Never fails for servers that ignore ranges; those
/// come back with `accept_ranges == false`.
fn range_request(url: &str, opts: &CurlOptions) -> Result<HeadResult, FetchError> {
    let mut easy = Easy2::new(HeaderCollector {
        headers: HeaderLines::default(),
        require_partial: true,
    });
    http::configure(&mut easy, url, opts)?;
    easy.range("0-0")?;
    let performed = easy.perform();

    let lines = easy.get_ref().headers.lines();
    let status = http::parse_http_status(lines);
    if status == Some(206) {
        performed?;
        return Ok(parse::parse_range_probe(lines));
    }
    match performed {
        Err(e) if !e.is_write_error() => Err(FetchError::Curl(e)),
        _ => match status {
            Some(code) if (200..300).contains(&code) => Ok(HeadResult {
                content_length: parse::parse_headers(lines).content_length,
                accept_ranges: false,
            }),
            Some(code) => Err(FetchError::Http(code)),
            None => Err(FetchError::Http(0)),
        },
    }
}

/// Probe `url` for its size and range support.
pub fn probe(url: &str, opts: &CurlOptions) -> Result<HeadResult, FetchError> {
    let head = match head_request(url, opts) {
        Ok(head) => head,
        Err(FetchError::Http(code)) => {
            tracing::debug!(url, code, "HEAD rejected, probing with a range request");
            return range_request(url, opts);
        }
        Err(e) => return Err(e),
    };
    if head.accept_ranges {
        return Ok(head);
    }
    match range_request(url, opts) {
        Ok(ranged) if ranged.accept_ranges => Ok(HeadResult {
            content_length: head.content_length.or(ranged.content_length),
            accept_ranges: true,
        }),
        Ok(_) => Ok(head),
        Err(e) => {
            tracing::debug!(url, "range probe failed: {}", e);
            Ok(head)
        }
    }
}

/// Total size of the object at `url`.
///
/// Fails with [`DownloadError::SizeUnavailable`] when the server reports no
/// length (or a length of 0); the caller should then fall back to a single
/// full-stream fetch.
pub fn probe_size(url: &str, opts: &CurlOptions) -> Result<u64, DownloadError> {
    let head = probe(url, opts).map_err(DownloadError::Probe)?;
    head.known_size().ok_or(DownloadError::SizeUnavailable)
}
