//! Filepath: src/set/insert.rs
//!
//! Insertion and the representation transitions it drives.
//!
//! `try_add` returns a NEW owned handle plus a changed flag; the caller's
//! input handle stays owned by the caller. "Already present" performs no
//! allocation and no refcount traffic. On the in-place paths the returned
//! handle is the same pointer with one added reference ("acquire self").
//!
//! Copy-on-write applies when a handle is *not* mutable-owned: either its
//! immutability flag is set (directly, inherited from an ancestor on the
//! descent, or forced because an ancestor block is shared) or its block's
//! refcount exceeds 1. Replacement blocks are always allocated before any
//! old reference is given up.

use crate::alloc::BlockAllocator;
use crate::chooser::{BITSET_CAPACITY, choose};
use crate::handle::SetHandle;
use crate::leaf::{array16, array32, bitset};
use crate::stream::{ItemsCursor, SpliceReader};
use crate::tag::{ReprKind, TAG_NODE};
use crate::tracing_helpers::{debug_log, trace_log};
use crate::{build, inline, node, refcount};

impl SetHandle {
    /// Insert `id`, returning the resulting handle and whether anything
    /// changed. On `false` the input handle is returned untouched (no
    /// refcount change); on `true` the returned handle is a fresh owned
    /// reference and the input remains owned by the caller.
    #[must_use]
    pub fn try_add<A: BlockAllocator>(self, alloc: &A, id: u32) -> (Self, bool) {
        match self.kind() {
            ReprKind::Empty => (inline::inline1(id), true),

            ReprKind::Inline1 | ReprKind::Inline2 | ReprKind::Inline3 | ReprKind::Inline4 => {
                inline_insert(alloc, self, id)
            }

            // SAFETY (heap arms): the liveness contract of the handle.
            ReprKind::Array16 => unsafe { array16_insert(alloc, self, id) },
            ReprKind::Array32 => unsafe { array32_insert(alloc, self, id) },
            ReprKind::BitSet => unsafe { bitset_insert(alloc, self, id) },
            ReprKind::Node => unsafe { node_insert(alloc, self, id) },
        }
    }

    /// Insert `id`, always returning an owned handle: an acquired copy of
    /// the input when `id` was already present, the new tree otherwise.
    #[must_use]
    pub fn add<A: BlockAllocator>(self, alloc: &A, id: u32) -> Self {
        let (handle, changed) = self.try_add(alloc, id);

        if changed { handle } else { handle.acquire() }
    }

    /// Whether this handle may mutate its block in place: not flagged
    /// immutable and exclusively owned.
    pub(crate) fn is_mutable_owned(self) -> bool {
        if self.is_immutable() {
            return false;
        }

        let block = self.block_ptr();

        // SAFETY: the liveness contract of the handle.
        match self.kind() {
            ReprKind::Node => unsafe { refcount::node_refcount(block) == 1 },
            _ => unsafe { refcount::leaf_refcount(block) == 1 },
        }
    }
}

/// Insert into an inline variant: unpack, merge, rebuild through the
/// chooser (which may stay inline or spill to a leaf block).
fn inline_insert<A: BlockAllocator>(alloc: &A, handle: SetHandle, id: u32) -> (SetHandle, bool) {
    let mut ids = [0u32; 4];
    let n = inline::unpack(handle, &mut ids);

    match ids[..n].binary_search(&id) {
        Ok(_) => (handle, false),

        Err(at) => {
            let mut merged = [0u32; 5];
            merged[..at].copy_from_slice(&ids[..at]);
            merged[at] = id;
            merged[at + 1..=n].copy_from_slice(&ids[at..n]);

            (build::from_sorted(alloc, &merged[..=n], 0), true)
        }
    }
}

/// Insert into an Array16 leaf. The chooser decides the target kind from
/// the grown count and maximum; arrays never mutate in place.
unsafe fn array16_insert<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();

    let at = match unsafe { array16::search(block, id) } {
        Ok(_) => return (handle, false),
        Err(at) => at,
    };

    let items = unsafe { array16::items(block) };
    let count = items.len() as u32;
    let max = u32::from(items[items.len() - 1]).max(id);

    let target = choose(count + 1, max);
    let grown = match target {
        ReprKind::Array16 => unsafe { array16::insert_at(alloc, block, at, id) },
        ReprKind::Array32 => unsafe { array16::insert_widening(alloc, block, at, id) },

        ReprKind::BitSet => bitset::build(
            alloc,
            items[..at]
                .iter()
                .map(|&v| u32::from(v))
                .chain(std::iter::once(id))
                .chain(items[at..].iter().map(|&v| u32::from(v))),
        ),

        ReprKind::Node => {
            debug_log!(count, max, "array16 spills to node");

            let mut splice = SpliceReader::new(
                ItemsCursor::U16(&items[..at]),
                Some(id),
                ItemsCursor::U16(&items[at..]),
            );
            build::from_reader(alloc, &mut splice)
        }

        other => unreachable!("chooser picked {other:?} for a grown array16"),
    };

    (grown, true)
}

/// Insert into an Array32 leaf. Mirrors the Array16 path, plus the
/// narrowing splice for leaves whose values shrank below 65,536.
unsafe fn array32_insert<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();

    let at = match unsafe { array32::search(block, id) } {
        Ok(_) => return (handle, false),
        Err(at) => at,
    };

    let items = unsafe { array32::items(block) };
    let count = items.len() as u32;
    let max = items[items.len() - 1].max(id);

    let target = choose(count + 1, max);
    let grown = match target {
        ReprKind::Array32 => unsafe { array32::insert_at(alloc, block, at, id) },
        ReprKind::Array16 => unsafe { array32::insert_narrowing(alloc, block, at, id) },

        ReprKind::BitSet => bitset::build(
            alloc,
            items[..at]
                .iter()
                .copied()
                .chain(std::iter::once(id))
                .chain(items[at..].iter().copied()),
        ),

        ReprKind::Node => {
            debug_log!(count, max, "array32 spills to node");

            let mut splice = SpliceReader::new(
                ItemsCursor::U32(&items[..at]),
                Some(id),
                ItemsCursor::U32(&items[at..]),
            );
            build::from_reader(alloc, &mut splice)
        }

        other => unreachable!("chooser picked {other:?} for a grown array32"),
    };

    (grown, true)
}

/// Insert into a BitSet leaf: in-place when mutable-owned, clone
/// otherwise; ids past the window climb through a fresh parent.
unsafe fn bitset_insert<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    if id >= BITSET_CAPACITY {
        return create_parent_and_add(alloc, handle, id);
    }

    let block = handle.block_ptr();
    if unsafe { bitset::contains(block, id) } {
        return (handle, false);
    }

    if handle.is_mutable_owned() {
        // SAFETY: exclusively owned, bit currently clear.
        unsafe { bitset::set_bit_in_place(block, id) };
        (handle.acquire(), true)
    } else {
        (unsafe { bitset::clone_with_bit(alloc, block, id, true) }, true)
    }
}

/// Insert into a node: recurse into the owning slot, then either reuse
/// the block (mutable-owned) or deep-shallow-copy it.
unsafe fn node_insert<A: BlockAllocator>(
    alloc: &A,
    handle: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let block = handle.block_ptr();
    let level = unsafe { node::level(block) };

    let slot = node::slot_of(id, level);
    if slot >= node::FAN_OUT {
        return create_parent_and_add(alloc, handle, id);
    }

    let rel = (u64::from(id) - slot as u64 * node::width(level)) as u32;

    // A child under a shared or immutable node must not mutate in place,
    // whatever its own tag and refcount say.
    let reuse = handle.is_mutable_owned();
    let child = unsafe { node::child(block, slot) };
    let child = if reuse { child } else { child.flagged_immutable() };

    let (new_child, changed) = child.try_add(alloc, rel);
    if !changed {
        return (handle, false);
    }

    let total = unsafe { node::total_count(block) };

    let target = if reuse {
        handle.acquire()
    } else {
        // SAFETY: liveness contract; the copy takes a reference to every
        // child before any old reference is given up.
        SetHandle::from_ptr(TAG_NODE, unsafe { node::clone_shallow(alloc, block) })
    };

    let dst = target.block_ptr();
    // SAFETY: `dst` is mutable-owned (fresh copy, or reuse of an
    // exclusively owned block). The old child's reference belongs to this
    // node and is replaced by the recursion's result.
    unsafe {
        node::child(dst, slot).release(alloc);
        node::set_child(dst, slot, new_child);
        node::set_total_count(dst, total + 1);
    }

    (target, true)
}

/// An id overflowed the current representation's range: acquire the tree,
/// hang it in slot 0 of a fresh node wide enough for both, and drop the
/// new id into its own slot. The fresh node is mutable-owned, so no
/// further allocation happens.
fn create_parent_and_add<A: BlockAllocator>(
    alloc: &A,
    tree: SetHandle,
    id: u32,
) -> (SetHandle, bool) {
    let floor = match tree.kind() {
        // SAFETY: liveness contract.
        ReprKind::Node => (unsafe { node::level(tree.block_ptr()) }) + 1,
        _ => 0,
    };
    let level = node::level_for(id, floor);

    debug_log!(level, id, "id overflows the tree, creating parent");

    let count = tree.count();
    let block = node::new_block(alloc, level);

    let slot = node::slot_of(id, level);
    debug_assert!(slot >= 1, "overflowing id cannot land in slot 0");
    let rel = (u64::from(id) - slot as u64 * node::width(level)) as u32;

    // SAFETY: the fresh node is exclusively owned. Slot 0 keeps the
    // current tree's relative ids unchanged; its stored tag keeps any
    // immutability mark.
    unsafe {
        node::set_child(block, 0, tree.acquire());
        node::set_child(block, slot, inline::inline1(rel));
        node::set_total_count(block, count + 1);
    }

    trace_log!(count, "parent adopted existing tree in slot 0");

    (SetHandle::from_ptr(TAG_NODE, block), true)
}

// ============================================================================
// Tests
// ============================================================================
