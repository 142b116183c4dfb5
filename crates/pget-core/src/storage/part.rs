//! Part file handling for a single segment.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// Open (or create) a segment's part file in append mode, reconciled against
/// the `recorded` byte count from the ledger.
///
/// The ledger is a lower bound on what reached the part file, so a file longer
/// than `recorded` (crash between the write and the ledger update) is truncated
/// back to `recorded`. Returns the file together with the number of bytes it
/// actually holds, which is below `recorded` only if the file lost data.
pub fn open_part_for_resume(path: &Path, recorded: u64) -> io::Result<(File, u64)> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e),
    };
    if len > recorded {
        tracing::debug!(
            path = %path.display(),
            len,
            recorded,
            "truncating part file to recorded progress"
        );
        OpenOptions::new().write(true).open(path)?.set_len(recorded)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok((file, len.min(recorded)))
}

/// Delete every `<destination>.part<N>` with `N >= first`. Returns how many
/// files were removed.
///
/// Scans the destination's directory rather than a fixed index range, since a
/// run with a different segment count may have left parts at any index.
pub fn remove_parts_from(destination: &Path, first: usize) -> io::Result<usize> {
    let Some(name) = destination.file_name().and_then(|n| n.to_str()) else {
        return Ok(0);
    };
    let prefix = format!("{}.part", name);
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let index = file_name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok());
        match index {
            Some(index) if index >= first => {
                fs::remove_file(entry.path())?;
                tracing::debug!(path = %entry.path().display(), "removed stale part file");
                removed += 1;
            }
            _ => {}
        }
    }
    Ok(removed)
}
