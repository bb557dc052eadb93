//! Filepath: src/node.rs
//!
//! 16-way inner trie node.
//!
//! A node at level `L` partitions its span into 16 slots of width
//! `W(L) = 4096 * 16^L`; slot `i` covers ids `[i*W, (i+1)*W)` relative to
//! the node's base, and every child stores ids relative to its own slot
//! base. Level 5 has `W = 2^32`, so no id ever overflows a level-5 span.
//!
//! # Memory Layout
//! `[level: u8, refcount: u24][total_count: u32][child_tags: u8 * 16][child_payloads: u64 * 16]`
//! for 152 bytes total. The child table is structure-of-arrays: 16 tag bytes
//! followed by 16 naturally-aligned payload words, so a child handle is
//! reassembled from one byte and one u64 at the same slot index.
//!
//! # Invariants
//! - `total_count` equals the sum of the children's counts.
//! - A node keeps more than 1024 descendants; removal below that converts
//!   it back to a leaf (`set/remove.rs`).

use std::ptr::NonNull;

use crate::alloc::BlockAllocator;
use crate::handle::SetHandle;
use crate::refcount;

/// Number of child slots.
pub const FAN_OUT: usize = 16;

/// Byte offset of the total count.
const OFF_TOTAL: usize = 4;

/// Byte offset of the child tag table.
const OFF_TAGS: usize = 8;

/// Byte offset of the child payload table.
const OFF_PAYLOADS: usize = 24;

/// Size in bytes of every node block.
pub const BLOCK_BYTES: usize = OFF_PAYLOADS + FAN_OUT * size_of::<u64>();

/// Highest meaningful level: `W(5) = 2^32` covers the whole universe.
pub const MAX_LEVEL: u8 = 5;

/// Slot width of a node at `level`.
#[inline]
#[must_use]
pub const fn width(level: u8) -> u64 {
    4096u64 << (4 * level)
}

/// Total span of a node at `level` (16 slots).
#[inline]
#[must_use]
pub const fn span(level: u8) -> u64 {
    width(level) * FAN_OUT as u64
}

/// Smallest level at or above `floor` whose span covers `max_id`.
#[inline]
#[must_use]
pub fn level_for(max_id: u32, floor: u8) -> u8 {
    let mut level = floor;
    while level < MAX_LEVEL && u64::from(max_id) >= span(level) {
        level += 1;
    }

    level
}

/// Slot that `id` falls into at `level`. May be >= 16 when `id` exceeds
/// the span; callers treat that as out-of-range.
#[inline]
#[must_use]
pub const fn slot_of(id: u32, level: u8) -> usize {
    (id as u64 / width(level)) as usize
}

/// Allocate a node with all slots Empty, total count 0, refcount 1.
#[must_use]
pub fn new_block<A: BlockAllocator>(alloc: &A, level: u8) -> NonNull<u8> {
    debug_assert!(level <= MAX_LEVEL);

    let block = alloc.allocate(BLOCK_BYTES);

    // SAFETY: freshly allocated BLOCK_BYTES. Zeroed tags and payloads are
    // exactly 16 Empty children.
    unsafe {
        block.cast::<u32>().write(refcount::node_initial(level));
        block.add(OFF_TOTAL).cast::<u32>().write(0);
        block.add(OFF_TAGS).write_bytes(0, BLOCK_BYTES - OFF_TAGS);
    }

    block
}

/// Level of a live node.
///
/// # Safety
/// `block` must point to a live node block.
#[inline]
#[must_use]
pub unsafe fn level(block: NonNull<u8>) -> u8 {
    unsafe { refcount::node_level(block) }
}

/// Total descendant count of a live node.
///
/// # Safety
/// `block` must point to a live node block.
#[inline]
#[must_use]
pub unsafe fn total_count(block: NonNull<u8>) -> u32 {
    unsafe { block.add(OFF_TOTAL).cast::<u32>().read() }
}

/// Overwrite the total descendant count.
///
/// # Safety
/// `block` must be a live node the caller may mutate (freshly built, or
/// mutable-owned).
#[inline]
pub unsafe fn set_total_count(block: NonNull<u8>, count: u32) {
    unsafe { block.add(OFF_TOTAL).cast::<u32>().write(count) };
}

/// Reassemble the child handle at `slot`.
///
/// # Safety
/// `block` must point to a live node block; `slot < 16`.
#[inline]
#[must_use]
pub unsafe fn child(block: NonNull<u8>, slot: usize) -> SetHandle {
    debug_assert!(slot < FAN_OUT);

    unsafe {
        let tag = block.add(OFF_TAGS + slot).read();
        let payload = block.add(OFF_PAYLOADS).cast::<u64>().add(slot).read();

        SetHandle::from_parts(tag, payload)
    }
}

/// Install `handle` as the child at `slot`. Refcounts are the caller's
/// business: the node takes over whatever reference `handle` represents.
///
/// # Safety
/// `block` must be a live node the caller may mutate; `slot < 16`.
#[inline]
pub unsafe fn set_child(block: NonNull<u8>, slot: usize, handle: SetHandle) {
    debug_assert!(slot < FAN_OUT);

    unsafe {
        block.add(OFF_TAGS + slot).write(handle.tag());
        block
            .add(OFF_PAYLOADS)
            .cast::<u64>()
            .add(slot)
            .write(handle.payload());
    }
}

/// Overwrite only the tag byte at `slot`. The immutability walk uses this
/// to mark node children in place; a concurrent reader observing either
/// byte is correct because the flag is consulted only on later mutation.
///
/// # Safety
/// `block` must point to a live node block; `slot < 16`; `tag` must keep
/// the slot's kind bits.
#[inline]
pub unsafe fn set_child_tag(block: NonNull<u8>, slot: usize, tag: u8) {
    debug_assert!(slot < FAN_OUT);

    unsafe { block.add(OFF_TAGS + slot).write(tag) };
}

/// Duplicate the 152-byte block and take a reference to every child.
/// The copy starts at refcount 1 and keeps the source's level, counts,
/// and child tags (including immutability marks on node children).
///
/// # Safety
/// `block` must point to a live node block.
#[must_use]
pub unsafe fn clone_shallow<A: BlockAllocator>(alloc: &A, block: NonNull<u8>) -> NonNull<u8> {
    let copy = alloc.allocate(BLOCK_BYTES);

    // SAFETY: both blocks are BLOCK_BYTES; copy is exclusively owned.
    unsafe {
        copy.copy_from_nonoverlapping(block, BLOCK_BYTES);
        copy.cast::<u32>().write(refcount::node_initial(level(block)));

        for slot in 0..FAN_OUT {
            child(copy, slot).incref();
        }
    }

    copy
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;
    use crate::inline;
    use crate::tag::ReprKind;

    #[test]
    fn width_and_span_arithmetic() {
        assert_eq!(width(0), 4096);
        assert_eq!(width(1), 65_536);
        assert_eq!(width(5), 1u64 << 32);

        assert_eq!(span(0), 65_536);
        assert_eq!(span(4), 1u64 << 32);

        // 4096 / 4096 = 1: the first id past the window lands in slot 1.
        assert_eq!(slot_of(4095, 0), 0);
        assert_eq!(slot_of(4096, 0), 1);
        assert_eq!(slot_of(u32::MAX, 0), (1 << 20) - 1);
        assert_eq!(slot_of(u32::MAX, 4), 15);
        assert_eq!(slot_of(u32::MAX, 5), 0);
    }

    #[test]
    fn level_for_covers_the_max() {
        assert_eq!(level_for(0, 0), 0);
        assert_eq!(level_for(65_535, 0), 0);
        assert_eq!(level_for(65_536, 0), 1);
        assert_eq!(level_for(6000, 0), 0);
        assert_eq!(level_for(u32::MAX, 0), 4);
        assert_eq!(level_for(0, 3), 3);
    }

    #[test]
    fn fresh_block_is_all_empty() {
        let alloc = HeapAllocator;
        let block = new_block(&alloc, 2);

        unsafe {
            assert_eq!(level(block), 2);
            assert_eq!(total_count(block), 0);
            for slot in 0..FAN_OUT {
                assert_eq!(child(block, slot).kind(), ReprKind::Empty);
            }

            alloc.free(block);
        }
    }

    #[test]
    fn child_round_trip() {
        let alloc = HeapAllocator;
        let block = new_block(&alloc, 0);

        unsafe {
            set_child(block, 3, inline::inline2(7, 9));
            set_total_count(block, 2);

            assert_eq!(child(block, 3), inline::inline2(7, 9));
            assert_eq!(total_count(block), 2);
            assert_eq!(child(block, 2).kind(), ReprKind::Empty);

            alloc.free(block);
        }
    }
}
