//! Bulk construction.
//!
//! Two entry points: [`from_sorted`] builds straight from a sorted slice,
//! recursing into per-slot partitions when the chooser demands a node;
//! [`from_reader`] drains a stream reader through a 4096-id scratch window
//! first. Every internal rebuild source (array-to-node splices, node
//! collapse) fits a single window; longer streams continue by ascending
//! insertion.

use crate::alloc::BlockAllocator;
use crate::chooser::choose;
use crate::handle::SetHandle;
use crate::leaf::{array16, array32, bitset};
use crate::node;
use crate::stream::IdReader;
use crate::tag::{ReprKind, TAG_NODE};
use crate::tracing_helpers::debug_log;
use crate::inline;

/// Scratch window of the stream build: one level-0 slot's worth of ids.
pub(crate) const SCRATCH_IDS: usize = 4096;

/// Build a handle from strictly ascending `ids`, storing each as
/// `id - offset` (`offset` is the enclosing slot base, 0 at the root).
#[must_use]
pub(crate) fn from_sorted<A: BlockAllocator>(alloc: &A, ids: &[u32], offset: u32) -> SetHandle {
    debug_assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must ascend");
    debug_assert!(ids.first().is_none_or(|&v| v >= offset));

    let Some(&last) = ids.last() else {
        return SetHandle::EMPTY;
    };

    let count = ids.len() as u32;
    let max = last - offset;
    let rel = |i: usize| ids[i] - offset;

    match choose(count, max) {
        ReprKind::Empty => SetHandle::EMPTY,
        ReprKind::Inline1 => inline::inline1(rel(0)),
        ReprKind::Inline2 => inline::inline2(rel(0), rel(1)),
        ReprKind::Inline3 => inline::inline3(rel(0), rel(1), rel(2)),
        ReprKind::Inline4 => inline::inline4([rel(0), rel(1), rel(2), rel(3)]),
        ReprKind::Array16 => array16::from_ids(alloc, ids, offset),
        ReprKind::Array32 => array32::from_ids(alloc, ids, offset),
        ReprKind::BitSet => bitset::from_ids(alloc, ids, offset),
        ReprKind::Node => build_node(alloc, ids, offset, max),
    }
}

/// Build a node by partitioning `ids` at slot boundaries and recursing.
fn build_node<A: BlockAllocator>(alloc: &A, ids: &[u32], offset: u32, max: u32) -> SetHandle {
    let level = node::level_for(max, 0);
    let width = node::width(level);
    let block = node::new_block(alloc, level);

    debug_log!(count = ids.len(), level, "bulk build creates node");

    let mut lo = 0;
    for slot in 0..node::FAN_OUT {
        // First id at or past this slot's exclusive maximum.
        let slot_end = (slot as u64 + 1) * width;
        let hi = lo
            + ids[lo..].partition_point(|&id| u64::from(id - offset) < slot_end);

        if hi > lo {
            let slot_base = offset + (slot as u64 * width) as u32;
            let child = from_sorted(alloc, &ids[lo..hi], slot_base);

            // SAFETY: freshly built node, exclusively owned.
            unsafe { node::set_child(block, slot, child) };
            lo = hi;
        }

        if lo == ids.len() {
            break;
        }
    }

    // SAFETY: freshly built node, exclusively owned.
    unsafe { node::set_total_count(block, ids.len() as u32) };

    SetHandle::from_ptr(TAG_NODE, block)
}

/// Pull from `reader` until `buf` is full or the reader is exhausted.
fn fill<R: IdReader>(reader: &mut R, buf: &mut [u32]) -> usize {
    let mut n = 0;
    loop {
        let got = reader.read(&mut buf[n..]);
        if got == 0 {
            return n;
        }

        n += got;
        if n == buf.len() {
            return n;
        }
    }
}

/// Build a handle from a stream of strictly ascending ids.
///
/// The first scratch window builds in one shot. A stream that outlives
/// the window (none of the internal rebuild sources do) continues by
/// ascending insertion, which grows the tree through the ordinary
/// create-parent machinery.
#[must_use]
pub(crate) fn from_reader<A, R>(alloc: &A, reader: &mut R) -> SetHandle
where
    A: BlockAllocator,
    R: IdReader,
{
    let mut buf = [0u32; SCRATCH_IDS];

    let len = fill(reader, &mut buf);
    if len == 0 {
        return SetHandle::EMPTY;
    }

    let mut handle = from_sorted(alloc, &buf[..len], 0);

    loop {
        let len = fill(reader, &mut buf);
        if len == 0 {
            return handle;
        }

        for &id in &buf[..len] {
            let (next, changed) = handle.try_add(alloc, id);
            debug_assert!(changed, "stream ids must ascend strictly");

            if changed {
                // SAFETY: handle is an owned reference this builder created.
                unsafe { handle.release(alloc) };
                handle = next;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{CountingAllocator, HeapAllocator};
    use crate::stream::SliceReader;

    fn released(alloc: &CountingAllocator, handle: SetHandle) {
        unsafe { handle.release(alloc) };
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn small_builds_pick_inline() {
        let alloc = CountingAllocator::new(HeapAllocator);

        assert_eq!(from_sorted(&alloc, &[], 0), SetHandle::EMPTY);

        let one = from_sorted(&alloc, &[9], 0);
        assert_eq!(one.kind(), ReprKind::Inline1);

        let three = from_sorted(&alloc, &[4096, 5000, 6000], 0);
        assert_eq!(three.kind(), ReprKind::Inline3);
        assert!(three.contains(5000));

        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn offset_rebases_children() {
        let alloc = CountingAllocator::new(HeapAllocator);

        let h = from_sorted(&alloc, &[4096, 5000, 6000], 4096);
        assert_eq!(h.kind(), ReprKind::Inline3);
        assert!(h.contains(0));
        assert!(h.contains(904));
        assert!(h.contains(1904));
        assert!(!h.contains(5000));
    }

    #[test]
    fn node_build_partitions_by_slot() {
        let alloc = CountingAllocator::new(HeapAllocator);

        // 1501 ids spanning two level-0 slots: too many for an array,
        // too wide for one bitset window.
        let ids: Vec<u32> = (0..1000).chain(4096..4597).collect();
        let h = from_sorted(&alloc, &ids, 0);
        assert_eq!(h.kind(), ReprKind::Node);
        assert_eq!(h.count(), 1501);

        for &id in &ids {
            assert!(h.contains(id), "missing {id}");
        }
        assert!(!h.contains(1000));
        assert!(!h.contains(4095));
        assert!(!h.contains(4597));

        released(&alloc, h);
    }

    #[test]
    fn reader_build_matches_slice_build() {
        let alloc = CountingAllocator::new(HeapAllocator);

        let ids: Vec<u32> = (0..2000).map(|i| i * 37).collect();
        let from_slice = from_sorted(&alloc, &ids, 0);

        let mut reader = SliceReader::new(&ids);
        let from_stream = from_reader(&alloc, &mut reader);

        assert_eq!(from_stream.kind(), from_slice.kind());
        assert_eq!(from_stream.count(), from_slice.count());
        for &id in &ids {
            assert!(from_stream.contains(id));
        }

        unsafe {
            from_slice.release(&alloc);
            from_stream.release(&alloc);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn overlong_stream_continues_by_insertion() {
        let alloc = CountingAllocator::new(HeapAllocator);

        let ids: Vec<u32> = (0..5000).map(|i| i * 3).collect();
        let mut reader = SliceReader::new(&ids);
        let h = from_reader(&alloc, &mut reader);

        assert_eq!(h.count(), 5000);
        assert!(h.contains(3 * 4999));
        assert!(!h.contains(1));

        released(&alloc, h);
    }
}
