//! On-disk layout of a job: part files, ledger path and the final merge.
//!
//! Every segment accumulates into its own append-only part file next to the
//! destination (`file.iso.part0`, `file.iso.part1`, ...). Once all segments are
//! complete the parts are concatenated in index order into the destination.

mod merge;
mod part;

pub use merge::merge_parts;
pub use part::{open_part_for_resume, remove_parts_from};

use std::path::{Path, PathBuf};

/// Suffix of the per-job progress ledger.
pub const LEDGER_SUFFIX: &str = ".progress";

/// Suffix used while merging, before the atomic rename into the destination.
pub const MERGE_SUFFIX: &str = ".merging";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// Path of segment `index`'s part file: `<destination>.part<index>`.
pub fn part_path(destination: &Path, index: usize) -> PathBuf {
    with_suffix(destination, &format!(".part{}", index))
}

/// Part file paths for segments `0..segment_count`, in index order.
pub fn part_paths(destination: &Path, segment_count: usize) -> Vec<PathBuf> {
    (0..segment_count)
        .map(|i| part_path(destination, i))
        .collect()
}

/// Path of the progress ledger: `<destination>.progress`.
pub fn ledger_path(destination: &Path) -> PathBuf {
    with_suffix(destination, LEDGER_SUFFIX)
}

pub(crate) fn merge_temp_path(destination: &Path) -> PathBuf {
    with_suffix(destination, MERGE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_index() {
        let p = part_path(Path::new("file.iso"), 0);
        assert_eq!(p.to_string_lossy(), "file.iso.part0");
        let p2 = part_path(Path::new("/tmp/archive.zip"), 12);
        assert_eq!(p2.to_string_lossy(), "/tmp/archive.zip.part12");
    }

    #[test]
    fn part_paths_in_index_order() {
        let parts = part_paths(Path::new("out.bin"), 3);
        let names: Vec<_> = parts.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["out.bin.part0", "out.bin.part1", "out.bin.part2"]);
    }

    #[test]
    fn ledger_path_appends_progress() {
        let p = ledger_path(Path::new("/data/video.mp4"));
        assert_eq!(p.to_string_lossy(), "/data/video.mp4.progress");
    }
}
