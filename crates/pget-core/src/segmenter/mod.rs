//! Split planning and segment range math.
//!
//! Derives the segment count and streaming chunk size for a download and
//! splits the byte range `[0, total_size)` into contiguous inclusive segments.

mod plan;
mod range;

pub use plan::{SplitPlan, GIB, MAX_CHUNK_SIZE, MIB};
pub use range::{plan_segments, Segment};
