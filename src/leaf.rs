//! Heap leaf blocks.
//!
//! Three leaf representations live behind pointers: two sorted-array
//! encodings (16-bit offsets for dense small ranges, 32-bit offsets for
//! sparse or wide leaves) and a fixed 4096-bit bitmap. Each block starts
//! with the common 32-bit refcount header (`refcount.rs`); everything past
//! it is representation-specific and documented per module.
//!
//! Array blocks are never mutated in place: every array insertion or
//! removal allocates the replacement before the old block is released.
//! The bitmap is the one leaf with an in-place path, gated on the handle
//! being mutable and the block being exclusively owned.

pub mod array16;
pub mod array32;
pub mod bitset;
