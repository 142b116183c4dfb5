//! Segment count and chunk size selection.

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Upper bound on the streaming read/write unit.
pub const MAX_CHUNK_SIZE: u64 = 4 * MIB;

/// How a download is split: number of parallel segments and the streaming
/// unit used when writing each segment's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub segment_count: usize,
    pub chunk_size: u64,
}

impl SplitPlan {
    /// Derive the plan for `total_size` bytes.
    ///
    /// Below 100 MiB uses 4 segments, below 1 GiB 8, otherwise 16. The chunk
    /// size is `min(4 MiB, total_size / segment_count)`, never below 1 byte.
    pub fn for_size(total_size: u64) -> Self {
        let segment_count = if total_size < 100 * MIB {
            4
        } else if total_size < GIB {
            8
        } else {
            16
        };
        SplitPlan {
            segment_count,
            chunk_size: derive_chunk_size(total_size, segment_count),
        }
    }

    /// Like [`SplitPlan::for_size`] but each caller-supplied value replaces the
    /// derived one independently. Zero overrides are ignored.
    pub fn with_overrides(
        total_size: u64,
        segment_count: Option<usize>,
        chunk_size: Option<u64>,
    ) -> Self {
        let derived = Self::for_size(total_size);
        SplitPlan {
            segment_count: segment_count
                .filter(|&n| n > 0)
                .unwrap_or(derived.segment_count),
            chunk_size: chunk_size.filter(|&n| n > 0).unwrap_or(derived.chunk_size),
        }
    }
}

fn derive_chunk_size(total_size: u64, segment_count: usize) -> u64 {
    (total_size / segment_count as u64).clamp(1, MAX_CHUNK_SIZE)
}
