//! Standard memory orderings for the refcount protocol.
//!
//! These constants ensure consistent ordering usage across the codebase
//! and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for refcount increments. Taking a new reference needs no
/// synchronization of its own; the handle that was cloned already proves
/// the block is reachable.
pub const INCREF_ORD: Ordering = Ordering::Relaxed;

/// Ordering for refcount decrements. Release publishes every prior write
/// to the block before another thread can observe the dropped count.
pub const DECREF_ORD: Ordering = Ordering::Release;

/// Ordering for the fence taken by the thread that drops the count to
/// zero, before it walks and frees the block. Pairs with [`DECREF_ORD`].
pub const FREE_FENCE_ORD: Ordering = Ordering::Acquire;

/// Ordering for plain reads of header words (level bits, count snapshot).
pub const HEADER_READ_ORD: Ordering = Ordering::Relaxed;
