//! Filepath: src/set/remove.rs
//!
//! Removal and the collapses it drives.
//!
//! `try_remove` mirrors `try_add`: "not present" costs nothing, a changed
//! result is a fresh owned handle. Shrinking representations converge
//! downward: arrays and bitmaps with at most five survivors rebuild
//! through the leaf builder (and may land back in an inline form), and a
//! node whose total drops to the array limit converts back into a leaf.

use crate::alloc::BlockAllocator;
use crate::chooser::{BITSET_CAPACITY, MAX_ARRAY_ITEM_COUNT};
use crate::handle::SetHandle;
use crate::leaf::{array16, array32, bitset};
use crate::stream::IdReader;
use crate::tag::{ReprKind, TAG_NODE};
use crate::tracing_helpers::debug_log;
use crate::{build, inline, node};

/// Survivor count at or below which a shrinking leaf rebuilds through the
/// chooser instead of splicing.
const REBUILD_SURVIVORS: u32 = 5;

impl SetHandle {
    /// Remove `id`, returning the resulting handle and whether anything
    /// changed. On `false` the input handle is returned untouched (no
    /// refcount change, no allocation); on `true` the returned handle is
    /// a fresh owned reference and the input remains owned by the caller.
    #[must_use]
    pub fn try_remove<A: BlockAllocator>(self, alloc: &A, id: u32) -> (Self, bool) {
        match self.kind() {
            ReprKind::Empty => (self, false),

            ReprKind::Inline1 | ReprKind::Inline2 | ReprKind::Inline3 | ReprKind::Inline4 => {
                inline_remove(alloc, self, id)
            }

            // SAFETY (heap arms): the liveness contract of the handle.
            ReprKind::Array16 => unsafe { array16_remove(alloc, self, id) },
            ReprKind::Array32 => unsafe { array32_remove(alloc, self, id) },
            ReprKind::BitSet => unsafe { bitset_remove(alloc, self, id) },
            ReprKind::Node => unsafe { node_remove(alloc, self, id) },
        }
    }

    /// Remove `id`, always returning an owned handle: an acquired copy of
    /// the input when `id` was absent, the new tree otherwise.
    #[must_use]
    pub fn remove<A: BlockAllocator>(self, alloc: &A, id: u32) -> Self {
        let (handle, changed) = self.try_remove(alloc, id);

        if changed { handle } else { handle.acquire() }
    }
}

/// Remove from an inline variant: the survivors pack into the smallest
/// representation that fits.
fn inline_remove<A: BlockAllocator>(alloc: &A, handle: SetHandle, id: u32) -> (SetHandle, bool) {
    let mut ids = [0u32; 4];
    let n = inline::unpack(handle, &mut ids);

    match ids[..n].binary_search(&id) {
        Err(_) => (handle, false),

        Ok(at) => {
            ids.copy_within(at + 1..n, at);
            (build::from_sorted(alloc, &ids[..n - 1], 0), true)
        }
    }
}

/// Remove from an Array16 leaf: splice, or rebuild when few survive.
unsafe fn array16_remove<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();

    let at = match unsafe { array16::search(block, id) } {
        Err(_) => return (handle, false),
        Ok(at) => at,
    };

    let items = unsafe { array16::items(block) };
    let survivors = items.len() as u32 - 1;

    if survivors <= REBUILD_SURVIVORS {
        let mut tmp = [0u32; REBUILD_SURVIVORS as usize];
        let mut n = 0;
        for (i, &v) in items.iter().enumerate() {
            if i != at {
                tmp[n] = u32::from(v);
                n += 1;
            }
        }

        (build::from_sorted(alloc, &tmp[..n], 0), true)
    } else {
        (unsafe { array16::remove_at(alloc, block, at) }, true)
    }
}

/// Remove from an Array32 leaf. Mirrors the Array16 path; the rebuild may
/// narrow the survivors back into an Array16 or an inline form.
unsafe fn array32_remove<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();

    let at = match unsafe { array32::search(block, id) } {
        Err(_) => return (handle, false),
        Ok(at) => at,
    };

    let items = unsafe { array32::items(block) };
    let survivors = items.len() as u32 - 1;

    if survivors <= REBUILD_SURVIVORS {
        let mut tmp = [0u32; REBUILD_SURVIVORS as usize];
        let mut n = 0;
        for (i, &v) in items.iter().enumerate() {
            if i != at {
                tmp[n] = v;
                n += 1;
            }
        }

        (build::from_sorted(alloc, &tmp[..n], 0), true)
    } else {
        (unsafe { array32::remove_at(alloc, block, at) }, true)
    }
}

/// Remove from a BitSet leaf: in-place when mutable-owned, clone
/// otherwise, rebuild when few survive.
unsafe fn bitset_remove<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    if id >= BITSET_CAPACITY {
        return (handle, false);
    }

    let block = handle.block_ptr();
    if !unsafe { bitset::contains(block, id) } {
        return (handle, false);
    }

    let survivors = unsafe { bitset::count(block) } - 1;
    if survivors <= REBUILD_SURVIVORS {
        let mut tmp = [0u32; REBUILD_SURVIVORS as usize];
        let n = unsafe { bitset::fill_without(block, id, &mut tmp) };

        return (build::from_sorted(alloc, &tmp[..n], 0), true);
    }

    if handle.is_mutable_owned() {
        // SAFETY: exclusively owned, bit currently set.
        unsafe { bitset::clear_bit_in_place(block, id) };
        (handle.acquire(), true)
    } else {
        (unsafe { bitset::clone_with_bit(alloc, block, id, false) }, true)
    }
}

/// Remove from a node. A node that would drop to the array limit is
/// rebuilt as a leaf from its surviving ids without touching the original
/// blocks; otherwise the owning slot is recursed into and the node is
/// reused or deep-shallow-copied like insertion.
unsafe fn node_remove<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();
    let level = unsafe { node::level(block) };

    let slot = node::slot_of(id, level);
    if slot >= node::FAN_OUT {
        return (handle, false);
    }

    let rel = (u64::from(id) - slot as u64 * node::width(level)) as u32;

    let child = unsafe { node::child(block, slot) };
    if !child.contains(rel) {
        return (handle, false);
    }

    let total = unsafe { node::total_count(block) };
    if total - 1 <= MAX_ARRAY_ITEM_COUNT {
        return (collapse_without(alloc, handle, id), true);
    }

    let reuse = handle.is_mutable_owned();
    let child = if reuse { child } else { child.flagged_immutable() };

    let (new_child, changed) = child.try_remove(alloc, rel);
    debug_assert!(changed, "membership was checked above");

    let target = if reuse {
        handle.acquire()
    } else {
        // SAFETY: liveness contract; the copy takes a reference to every
        // child before any old reference is given up.
        SetHandle::from_ptr(TAG_NODE, unsafe { node::clone_shallow(alloc, block) })
    };

    let dst = target.block_ptr();
    // SAFETY: `dst` is mutable-owned.
    unsafe {
        node::child(dst, slot).release(alloc);
        node::set_child(dst, slot, new_child);
        node::set_total_count(dst, total - 1);
    }

    (target, true)
}

/// Rebuild a node's survivors as a leaf, skipping `id`. Reads the
/// original tree as-is, so it works identically for shared, immutable,
/// and exclusively owned nodes.
fn collapse_without<A: BlockAllocator>(alloc: &A, handle: SetHandle, id: u32) -> SetHandle {
    debug_log!(id, total = handle.count(), "node collapses back to a leaf");

    let mut buf = [0u32; build::SCRATCH_IDS];
    let mut n = 0;

    let mut reader = handle.stream_reader();
    loop {
        let got = reader.read(&mut buf[n..]);
        if got == 0 {
            break;
        }
        n += got;
    }

    let at = buf[..n].binary_search(&id).expect("membership was checked");
    buf.copy_within(at + 1..n, at);

    build::from_sorted(alloc, &buf[..n - 1], 0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{CountingAllocator, HeapAllocator};

    type Alloc = CountingAllocator<HeapAllocator>;

    #[test]
    fn absent_remove_reports_unchanged() {
        let alloc = Alloc::default();

        let h = SetHandle::create(&alloc, &[10, 20, 30, 40, 50]);
        let blocks = alloc.outstanding_blocks();

        let (same, changed) = h.try_remove(&alloc, 25);
        assert!(!changed);
        assert_eq!(same, h);
        assert_eq!(alloc.outstanding_blocks(), blocks);

        let (same, changed) = SetHandle::EMPTY.try_remove(&alloc, 0);
        assert!(!changed);
        assert_eq!(same, SetHandle::EMPTY);

        unsafe { h.release(&alloc) };
    }

    #[test]
    fn inline_ladder_steps_down_to_empty() {
        let alloc = Alloc::default();

        let mut h = SetHandle::create(&alloc, &[1, 3, 5, 7]);
        assert_eq!(h.kind(), ReprKind::Inline4);

        for (id, kind) in [
            (5, ReprKind::Inline3),
            (1, ReprKind::Inline2),
            (7, ReprKind::Inline1),
            (3, ReprKind::Empty),
        ] {
            let (next, changed) = h.try_remove(&alloc, id);
            assert!(changed);
            assert_eq!(next.kind(), kind);
            assert!(!next.contains(id));
            h = next;
        }

        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn array_collapses_into_inline() {
        let alloc = Alloc::default();

        let h = SetHandle::create(&alloc, &[2, 4, 6, 8, 10]);
        assert_eq!(h.kind(), ReprKind::Array16);

        let (small, changed) = h.try_remove(&alloc, 6);
        assert!(changed);
        assert_eq!(small.kind(), ReprKind::Inline4);
        assert!(!small.contains(6));
        for id in [2, 4, 8, 10] {
            assert!(small.contains(id));
        }

        unsafe { h.release(&alloc) };
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn wide_array_narrows_through_rebuild() {
        let alloc = Alloc::default();

        // Five small values and one wide one.
        let h = SetHandle::create(&alloc, &[1, 2, 3, 4, 5, 100_000]);
        assert_eq!(h.kind(), ReprKind::Array32);

        let (narrow, changed) = h.try_remove(&alloc, 100_000);
        assert!(changed);
        assert_eq!(narrow.kind(), ReprKind::Array16);
        assert_eq!(narrow.count(), 5);

        unsafe {
            h.release(&alloc);
            narrow.release(&alloc);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn bitset_shrinks_by_bit_or_rebuild() {
        let alloc = Alloc::default();

        let mut h = SetHandle::create(&alloc, &(0..300).collect::<Vec<_>>());
        assert_eq!(h.kind(), ReprKind::BitSet);

        // Mutable-owned removals stay in the same block.
        let before = h;
        for id in 6..300 {
            let (next, changed) = h.try_remove(&alloc, id);
            assert!(changed);
            unsafe { h.release(&alloc) };
            h = next;
        }
        assert_eq!(h, before);
        assert_eq!(h.count(), 6);
        assert_eq!(h.kind(), ReprKind::BitSet);

        // The sixth removal leaves five survivors: rebuild to inline.
        let (small, changed) = h.try_remove(&alloc, 0);
        assert!(changed);
        assert_eq!(small.kind(), ReprKind::Array16);
        assert_eq!(small.count(), 5);

        let (tiny, changed) = small.try_remove(&alloc, 1);
        assert!(changed);
        assert_eq!(tiny.kind(), ReprKind::Inline4);

        unsafe {
            h.release(&alloc);
            small.release(&alloc);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn node_converts_back_to_leaf_at_the_limit() {
        let alloc = Alloc::default();

        let ids: Vec<u32> = (0..1025).map(|i| i * 100).collect();
        let h = SetHandle::create(&alloc, &ids);
        assert_eq!(h.kind(), ReprKind::Node);
        assert_eq!(h.count(), 1025);

        let (leaf, changed) = h.try_remove(&alloc, 500);
        assert!(changed);
        assert_eq!(leaf.kind(), ReprKind::Array32);
        assert_eq!(leaf.count(), 1024);
        assert!(!leaf.contains(500));
        assert!(leaf.contains(0));
        assert!(leaf.contains(1024 * 100));

        unsafe {
            h.release(&alloc);
            leaf.release(&alloc);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn deep_node_stays_a_node_above_the_limit() {
        let alloc = Alloc::default();

        let ids: Vec<u32> = (0..2000).map(|i| i * 50).collect();
        let h = SetHandle::create(&alloc, &ids);
        assert_eq!(h.kind(), ReprKind::Node);

        let (next, changed) = h.try_remove(&alloc, 1000);
        assert!(changed);
        assert_eq!(next.kind(), ReprKind::Node);
        assert_eq!(next.count(), 1999);
        assert!(!next.contains(1000));
        assert!(next.contains(950));

        unsafe {
            h.release(&alloc);
            next.release(&alloc);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
    }
}
