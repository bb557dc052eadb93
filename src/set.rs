//! Public operations on [`SetHandle`]: construction, queries, and the
//! reference-counting lifecycle. The mutating algorithms live in
//! [`set::insert`](self::insert) and [`set::remove`](self::remove);
//! everything dispatches on the low 7 bits of the tag, never on anything
//! resembling subtype polymorphism.

pub(crate) mod insert;
pub(crate) mod remove;

use crate::alloc::BlockAllocator;
use crate::handle::SetHandle;
use crate::leaf::{array16, array32, bitset};
use crate::stream::HandleReader;
use crate::tag::ReprKind;
use crate::{build, inline, node, refcount};

/// Fixed bookkeeping charge per heap block in memory estimates.
const PER_BLOCK_OVERHEAD: u64 = 32;

impl SetHandle {
    /// Build a set from strictly ascending ids.
    ///
    /// The returned handle is an owned reference (for pointer-backed
    /// results) and must eventually be balanced by a
    /// [`release`](SetHandle::release).
    #[must_use]
    pub fn create<A: BlockAllocator>(alloc: &A, ids: &[u32]) -> Self {
        build::from_sorted(alloc, ids, 0)
    }

    /// Whether `id` is in the set.
    #[must_use]
    pub fn contains(self, id: u32) -> bool {
        match self.kind() {
            ReprKind::Empty => false,

            ReprKind::Inline1 | ReprKind::Inline2 | ReprKind::Inline3 | ReprKind::Inline4 => {
                inline::contains(self, id)
            }

            // SAFETY (all heap arms): the liveness contract of the handle.
            ReprKind::Array16 => unsafe { array16::contains(self.block_ptr(), id) },
            ReprKind::Array32 => unsafe { array32::contains(self.block_ptr(), id) },
            ReprKind::BitSet => unsafe { bitset::contains(self.block_ptr(), id) },

            ReprKind::Node => {
                let block = self.block_ptr();
                let level = unsafe { node::level(block) };

                let slot = node::slot_of(id, level);
                if slot >= node::FAN_OUT {
                    return false;
                }

                let rel = (u64::from(id) - slot as u64 * node::width(level)) as u32;
                unsafe { node::child(block, slot) }.contains(rel)
            }
        }
    }

    /// Number of ids in the set.
    #[must_use]
    pub fn count(self) -> u32 {
        match self.kind() {
            ReprKind::Empty => 0,
            ReprKind::Inline1 => 1,
            ReprKind::Inline2 => 2,
            ReprKind::Inline3 => 3,
            ReprKind::Inline4 => 4,

            // SAFETY (all heap arms): the liveness contract of the handle.
            ReprKind::Array16 => unsafe { array16::count(self.block_ptr()) },
            ReprKind::Array32 => unsafe { array32::count(self.block_ptr()) },
            ReprKind::BitSet => unsafe { bitset::count(self.block_ptr()) },
            ReprKind::Node => unsafe { node::total_count(self.block_ptr()) },
        }
    }

    /// Whether the set has no ids.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.kind() == ReprKind::Empty
    }

    /// Take one more reference and return the handle.
    ///
    /// A no-op for Empty and inline handles, which have no lifecycle cost.
    #[must_use]
    pub fn acquire(self) -> Self {
        self.incref();
        self
    }

    /// Crate-internal acquire without the fluent return.
    pub(crate) fn incref(self) {
        match self.kind() {
            ReprKind::Array16 | ReprKind::Array32 | ReprKind::BitSet => {
                // SAFETY: the liveness contract of the handle.
                unsafe { refcount::leaf_incref(self.block_ptr()) };
            }

            ReprKind::Node => {
                // SAFETY: the liveness contract of the handle.
                unsafe { refcount::node_incref(self.block_ptr()) };
            }

            _ => {}
        }
    }

    /// Drop one reference. On the last one, children are released
    /// recursively and the block is returned to `alloc`.
    ///
    /// # Safety
    /// The handle must be an owned reference; it (and every copy of it
    /// standing for the same reference) must not be used afterwards.
    /// `alloc` must be behaviorally equivalent to the allocator the
    /// tree's blocks came from.
    pub unsafe fn release<A: BlockAllocator>(self, alloc: &A) {
        match self.kind() {
            ReprKind::Array16 | ReprKind::Array32 | ReprKind::BitSet => {
                let block = self.block_ptr();

                // SAFETY: owned reference per caller contract.
                unsafe {
                    if refcount::leaf_decref(block) {
                        alloc.free(block);
                    }
                }
            }

            ReprKind::Node => {
                let block = self.block_ptr();

                // SAFETY: owned reference per caller contract. Zero means
                // this thread owns the free path; the children each held
                // one reference from this node.
                unsafe {
                    if refcount::node_decref(block) {
                        for slot in 0..node::FAN_OUT {
                            node::child(block, slot).release(alloc);
                        }

                        alloc.free(block);
                    }
                }
            }

            _ => {}
        }
    }

    /// Pull-based ascending reader over this set.
    ///
    /// The borrow pins the handle for the reader's lifetime; the usual
    /// liveness contract still applies to the underlying blocks.
    #[must_use]
    pub fn stream_reader(&self) -> HandleReader<'_> {
        // SAFETY: the liveness contract of the handle.
        unsafe { HandleReader::new(*self) }
    }

    /// Bytes occupied by the tree's heap blocks, plus a fixed per-block
    /// bookkeeping charge. Shared blocks are charged once per reference.
    #[must_use]
    pub fn estimate_memory_consumption(self) -> u64 {
        match self.kind() {
            ReprKind::Empty
            | ReprKind::Inline1
            | ReprKind::Inline2
            | ReprKind::Inline3
            | ReprKind::Inline4 => 0,

            // SAFETY (all heap arms): the liveness contract of the handle.
            ReprKind::Array16 => {
                (unsafe { array16::heap_bytes(self.block_ptr()) }) + PER_BLOCK_OVERHEAD
            }
            ReprKind::Array32 => {
                (unsafe { array32::heap_bytes(self.block_ptr()) }) + PER_BLOCK_OVERHEAD
            }
            ReprKind::BitSet => bitset::BLOCK_BYTES as u64 + PER_BLOCK_OVERHEAD,

            ReprKind::Node => {
                let block = self.block_ptr();
                let mut bytes = node::BLOCK_BYTES as u64 + PER_BLOCK_OVERHEAD;

                for slot in 0..node::FAN_OUT {
                    // SAFETY: the liveness contract of the handle.
                    bytes += unsafe { node::child(block, slot) }.estimate_memory_consumption();
                }

                bytes
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
