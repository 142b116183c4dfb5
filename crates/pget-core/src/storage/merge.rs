//! Concatenate part files into the destination.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::DownloadError;

use super::merge_temp_path;

fn merge_err(path: &Path, source: io::Error) -> DownloadError {
    DownloadError::Merge {
        path: path.to_path_buf(),
        source,
    }
}

/// Append every part file, in the given (index) order, into `destination`,
/// then delete the parts.
///
/// Data is written to `<destination>.merging` and renamed into place once all
/// parts are copied and synced, so a crash mid-merge leaves the parts intact.
/// A missing part is an error and nothing is deleted. Returns the bytes written.
pub fn merge_parts(parts: &[PathBuf], destination: &Path) -> Result<u64, DownloadError> {
    if let Some(missing) = parts.iter().find(|p| !p.exists()) {
        return Err(merge_err(
            missing,
            io::Error::new(io::ErrorKind::NotFound, "part file missing"),
        ));
    }

    let temp = merge_temp_path(destination);
    let out = File::create(&temp).map_err(|e| merge_err(&temp, e))?;
    let mut writer = BufWriter::new(out);
    let mut total = 0u64;
    for part in parts {
        let mut input = File::open(part).map_err(|e| merge_err(part, e))?;
        total += io::copy(&mut input, &mut writer).map_err(|e| merge_err(part, e))?;
    }
    let out = writer
        .into_inner()
        .map_err(|e| merge_err(&temp, e.into_error()))?;
    out.sync_all().map_err(|e| merge_err(&temp, e))?;
    drop(out);

    fs::rename(&temp, destination).map_err(|e| merge_err(destination, e))?;

    for part in parts {
        if let Err(e) = fs::remove_file(part) {
            tracing::warn!(part = %part.display(), "could not remove part file: {}", e);
        }
    }
    tracing::debug!(
        destination = %destination.display(),
        parts = parts.len(),
        bytes = total,
        "merged part files"
    );
    Ok(total)
}
