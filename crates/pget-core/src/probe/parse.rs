//! Parse HTTP response header lines into HeadResult.

use crate::http::{header_value, parse_content_range};

/// Metadata needed to plan a segmented download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if the server reported one.
    pub content_length: Option<u64>,
    /// True if byte ranges are supported (advertised or observed).
    pub accept_ranges: bool,
}

impl HeadResult {
    /// Size usable for splitting: present and non-zero.
    pub fn known_size(&self) -> Option<u64> {
        self.content_length.filter(|&n| n > 0)
    }
}

/// Parse a HEAD (or plain GET) response.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    HeadResult {
        content_length: header_value(lines, "content-length").and_then(|v| v.parse().ok()),
        accept_ranges: header_value(lines, "accept-ranges")
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false),
    }
}

/// Parse a `206` answer to `Range: bytes=0-0`; the total comes from `Content-Range`.
pub(crate) fn parse_range_probe(lines: &[String]) -> HeadResult {
    HeadResult {
        content_length: parse_content_range(lines).and_then(|cr| cr.total),
        accept_ranges: true,
    }
}
