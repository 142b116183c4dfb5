//! Local file name for a download when the caller does not supply one.

use url::Url;

/// Used when the URL path has no usable last segment.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Longest file name most filesystems accept, in bytes.
const NAME_MAX: usize = 255;

/// Last non-empty path segment of `url`, made safe to use as a file name.
///
/// Query and fragment are ignored. Separators and control characters become
/// `_`; leading and trailing dots, spaces and underscores are stripped.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(sanitize)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

fn sanitize(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let mut name = replaced
        .trim_matches(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .to_string();
    if name.len() > NAME_MAX {
        let mut cut = NAME_MAX;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}
