//! Handle immutability.
//!
//! Freezing a handle sets the immutability bit in its tag; for nodes it
//! additionally walks the tree once and marks every descendant *node*'s
//! stored tag byte in place. The in-place marks travel with every later
//! deep-shallow-copy, so interior nodes shared out of a frozen tree keep
//! forcing copy-on-write no matter which mutable copy reaches them. Leaf
//! children need no mark: a descent inherits the parent handle's flag, and
//! a leaf shared by a copy fails the exclusive-ownership half of the
//! mutable-owned gate.
//!
//! The flag is sticky and one-way. The pre-freeze handle value aliases the
//! same block without the flag, so callers must use only the returned
//! handle afterwards.

use std::ptr::NonNull;

use crate::handle::SetHandle;
use crate::node;
use crate::tag::{self, ReprKind};
use crate::tracing_helpers::trace_log;

impl SetHandle {
    /// Freeze this handle: any later mutation through the returned handle
    /// (or anything derived from it) copies instead of writing in place.
    ///
    /// Consumes the input value by contract: the unflagged handle must
    /// not be used once the flagged one exists.
    #[must_use]
    pub fn make_immutable(self) -> Self {
        if self.kind() == ReprKind::Node && !self.is_immutable() {
            // SAFETY: the liveness contract of the handle.
            unsafe { mark_descendant_nodes(self.block_ptr()) };
        }

        self.flagged_immutable()
    }
}

/// Set the immutability bit on every node child's stored tag, recursively.
/// An already-marked child subtree was fully marked by an earlier freeze
/// (the flag is sticky), so it is skipped.
unsafe fn mark_descendant_nodes(block: NonNull<u8>) {
    for slot in 0..node::FAN_OUT {
        // SAFETY: live node per caller; the single-byte tag store is the
        // one write `make_immutable` is licensed to make on shared state.
        unsafe {
            let child = node::child(block, slot);
            if child.kind() == ReprKind::Node && !child.is_immutable() {
                trace_log!(slot, "marking descendant node immutable");

                node::set_child_tag(block, slot, tag::with_immutable(child.tag()));
                mark_descendant_nodes(child.block_ptr());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
