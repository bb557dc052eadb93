//! The representation chooser.
//!
//! [`choose`] is the ONLY authority on which representation a set of a
//! given (count, max value) takes. Every insertion, removal, and bulk
//! build consults it after computing the post-operation pair; nothing else
//! in the crate decides a representation on its own.

use crate::tag::ReprKind;

/// Largest value an Array16 leaf or an Inline4 lane can hold.
pub const MAX_ARRAY16_VALUE: u32 = u16::MAX as u32;

/// Largest value an Inline3 field can hold (21 bits).
pub const MAX_INLINE3_VALUE: u32 = (1 << 21) - 1;

/// Largest item count an array leaf can hold.
pub const MAX_ARRAY_ITEM_COUNT: u32 = 1024;

/// Smallest count at which a dense small range switches to a bitmap.
pub const MIN_BITSET_ITEM_COUNT: u32 = 256;

/// Number of values a bitset window (and a level-0 trie slot) covers.
pub const BITSET_CAPACITY: u32 = 4096;

/// Map a post-operation `(count, max_id)` to the representation that set
/// takes. `max_id` is local: relative to the enclosing slot base, which is
/// 0 for a set held directly.
///
/// The dense-range rule fires even where an array would be smaller
/// (`count == 256`, `max_id == 255`); holding the bitmap there avoids
/// representation flips near the boundary.
#[must_use]
pub fn choose(count: u32, max_id: u32) -> ReprKind {
    if max_id < BITSET_CAPACITY && count >= MIN_BITSET_ITEM_COUNT {
        ReprKind::BitSet
    } else if count < 3 {
        match count {
            0 => ReprKind::Empty,
            1 => ReprKind::Inline1,
            _ => ReprKind::Inline2,
        }
    } else if count == 3 && max_id <= MAX_INLINE3_VALUE {
        ReprKind::Inline3
    } else if count == 4 && max_id <= MAX_ARRAY16_VALUE {
        ReprKind::Inline4
    } else if count <= MAX_ARRAY_ITEM_COUNT {
        if max_id <= MAX_ARRAY16_VALUE {
            ReprKind::Array16
        } else {
            ReprKind::Array32
        }
    } else {
        ReprKind::Node
    }
}

// ============================================================================
// Tests
// ============================================================================
