//! Segment type and range planning.

/// A single segment: byte range `[start, end]` (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Position of the segment in the file; segment 0 holds the lowest offsets.
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (inclusive).
    pub end: u64,
}

impl Segment {
    /// Length of this segment in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Byte range still to fetch after `done` bytes were written, or `None`
    /// when the segment is already complete.
    pub fn remaining_range(&self, done: u64) -> Option<(u64, u64)> {
        let resume_start = self.start.saturating_add(done);
        if resume_start > self.end {
            None
        } else {
            Some((resume_start, self.end))
        }
    }

    /// HTTP Range header value for the bytes still to fetch.
    pub fn range_header_value(&self, done: u64) -> Option<String> {
        self.remaining_range(done)
            .map(|(start, end)| format!("bytes={}-{}", start, end))
    }
}

/// Builds the segment list for `total_size` bytes split into `segment_count` parts.
///
/// Every segment but the last covers `floor(total_size / n)` bytes; the last one
/// absorbs the remainder up to `total_size - 1`. The count is clamped to
/// `total_size` so no segment is empty. Returns an empty vec if either input is 0.
pub fn plan_segments(total_size: u64, segment_count: usize) -> Vec<Segment> {
    if total_size == 0 || segment_count == 0 {
        return Vec::new();
    }

    let n = (segment_count as u64).min(total_size);
    let base = total_size / n;

    (0..n)
        .map(|i| {
            let start = i * base;
            let end = if i == n - 1 {
                total_size - 1
            } else {
                (i + 1) * base - 1
            };
            Segment {
                index: i as usize,
                start,
                end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(segs: &[Segment], total: u64) {
        assert_eq!(segs.first().map(|s| s.start), Some(0));
        assert_eq!(segs.last().map(|s| s.end), Some(total - 1));
        for pair in segs.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap");
        }
        assert_eq!(segs.iter().map(Segment::len).sum::<u64>(), total);
        for (i, s) in segs.iter().enumerate() {
            assert_eq!(s.index, i);
        }
    }

    #[test]
    fn plan_segments_million_bytes_four_ways() {
        let segs = plan_segments(1_000_000, 4);
        let bounds: Vec<_> = segs.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(
            bounds,
            vec![
                (0, 249_999),
                (250_000, 499_999),
                (500_000, 749_999),
                (750_000, 999_999)
            ]
        );
    }

    #[test]
    fn plan_segments_last_absorbs_remainder() {
        let segs = plan_segments(10, 4);
        let bounds: Vec<_> = segs.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(bounds, vec![(0, 1), (2, 3), (4, 5), (6, 9)]);
        assert_covers(&segs, 10);
    }

    #[test]
    fn plan_segments_covers_many_sizes() {
        for total in [1u64, 2, 3, 7, 99, 1000, 4097, 1 << 20, 123_456_789] {
            for count in [1usize, 2, 3, 4, 8, 16] {
                assert_covers(&plan_segments(total, count), total);
            }
        }
    }

    #[test]
    fn plan_segments_clamps_count_to_size() {
        let segs = plan_segments(3, 16);
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn plan_segments_empty() {
        assert!(plan_segments(0, 4).is_empty());
        assert!(plan_segments(100, 0).is_empty());
    }

    #[test]
    fn remaining_range_resumes_after_written_bytes() {
        let segs = plan_segments(1_000_000, 4);
        assert_eq!(segs[1].remaining_range(100_000), Some((350_000, 499_999)));
        assert_eq!(segs[0].remaining_range(249_999), Some((249_999, 249_999)));
        assert_eq!(segs[0].remaining_range(250_000), None);
        assert_eq!(segs[2].remaining_range(0), Some((500_000, 749_999)));
    }

    #[test]
    fn segment_range_header() {
        let s = Segment {
            index: 0,
            start: 0,
            end: 98,
        };
        assert_eq!(s.len(), 99);
        assert_eq!(s.range_header_value(0).as_deref(), Some("bytes=0-98"));
        assert_eq!(s.range_header_value(98).as_deref(), Some("bytes=98-98"));
        assert_eq!(s.range_header_value(99), None);
    }
}
