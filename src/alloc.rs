//! Block allocation abstraction for `packset` trees.
//!
//! This module provides the [`BlockAllocator`] trait that abstracts how
//! heap blocks are allocated and freed.
//!
//! ## Allocators
//!
//! - [`HeapAllocator`] (default): global-heap allocator. The trait frees by
//!   bare address, so each block carries a hidden length prefix from which
//!   the original [`Layout`] is rebuilt on `free`.
//!
//! - [`CountingAllocator`]: wrapper that records every outstanding block
//!   behind a `parking_lot::Mutex`. Used to assert the refcount-balance
//!   property (a balanced acquire/release sequence returns the outstanding
//!   block count to its baseline).
//!
//! ## Contract
//!
//! The allocator reference is passed explicitly to every mutating tree
//! operation and is never stored inside a tree. A tree may be released
//! against a different-but-behaviorally-equivalent allocator instance.

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

/// Trait for allocating and freeing the raw heap blocks behind pointer
/// variant handles.
///
/// Implementations must guarantee:
///
/// 1. **Alignment**: returned addresses are aligned for `u64` (the node
///    child payload table and the bitset words are 8-byte fields).
///
/// 2. **Stability**: a returned address stays valid until the matching
///    [`free`](BlockAllocator::free).
///
/// 3. **Infallibility**: allocation either succeeds or diverges (abort or
///    panic). Tree operations allocate replacement blocks *before*
///    releasing old ones, so a diverging allocation leaves every tree it
///    was mutating fully intact.
pub trait BlockAllocator {
    /// Allocate `bytes` of 8-byte-aligned memory.
    ///
    /// Block sizes are small (a few hundred bytes at most: the largest
    /// fixed block is the 520-byte bitset; arrays top out at 8 + 4 * 1024).
    fn allocate(&self, bytes: usize) -> NonNull<u8>;

    /// Free a block previously returned by
    /// [`allocate`](BlockAllocator::allocate) on a behaviorally equivalent
    /// allocator.
    ///
    /// # Safety
    /// `addr` must be such a block, not yet freed, and no live handle may
    /// reference it after this call.
    unsafe fn free(&self, addr: NonNull<u8>);
}

// ============================================================================
//  HeapAllocator
// ============================================================================

/// Length word kept in front of every [`HeapAllocator`] block so that
/// `free` can rebuild the [`Layout`] from the bare address.
const PREFIX: usize = size_of::<u64>();

/// Global-heap block allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl HeapAllocator {
    /// Layout of a block plus its hidden length prefix.
    fn layout(bytes: usize) -> Layout {
        // 8-byte alignment keeps both the prefix and the caller's block
        // aligned for u64.
        Layout::from_size_align(PREFIX + bytes, align_of::<u64>())
            .expect("block size overflow")
    }
}

impl BlockAllocator for HeapAllocator {
    fn allocate(&self, bytes: usize) -> NonNull<u8> {
        let layout = Self::layout(bytes);

        // SAFETY: layout has non-zero size (PREFIX > 0).
        let base = unsafe { alloc(layout) };
        let Some(base) = NonNull::new(base) else {
            handle_alloc_error(layout);
        };

        // SAFETY: base points to PREFIX + bytes writable bytes.
        unsafe {
            base.cast::<u64>().write(bytes as u64);
            base.add(PREFIX)
        }
    }

    unsafe fn free(&self, addr: NonNull<u8>) {
        // SAFETY: addr came from allocate, so the length prefix sits
        // immediately below it.
        unsafe {
            let base = addr.sub(PREFIX);
            let bytes = base.cast::<u64>().read() as usize;
            dealloc(base.as_ptr(), Self::layout(bytes));
        }
    }
}

// ============================================================================
//  CountingAllocator
// ============================================================================

/// Wrapper allocator that tracks every outstanding block.
///
/// Interior mutability through `parking_lot::Mutex` keeps the tracking
/// concurrent-safe while the trait only hands out `&self`.
#[derive(Debug, Default)]
pub struct CountingAllocator<A: BlockAllocator = HeapAllocator> {
    inner: A,
    live: Mutex<HashMap<usize, usize>>,
}

impl<A: BlockAllocator> CountingAllocator<A> {
    /// Wrap an allocator.
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Number of blocks allocated and not yet freed.
    #[must_use]
    pub fn outstanding_blocks(&self) -> usize {
        self.live.lock().len()
    }

    /// Total bytes of blocks allocated and not yet freed (without the
    /// inner allocator's bookkeeping overhead).
    #[must_use]
    pub fn outstanding_bytes(&self) -> usize {
        self.live.lock().values().sum()
    }
}

impl<A: BlockAllocator> BlockAllocator for CountingAllocator<A> {
    fn allocate(&self, bytes: usize) -> NonNull<u8> {
        let addr = self.inner.allocate(bytes);

        let prev = self.live.lock().insert(addr.as_ptr() as usize, bytes);
        debug_assert!(prev.is_none(), "allocator returned a live address");

        addr
    }

    unsafe fn free(&self, addr: NonNull<u8>) {
        let known = self.live.lock().remove(&(addr.as_ptr() as usize));
        debug_assert!(known.is_some(), "free of an address not outstanding");

        // SAFETY: forwarded contract.
        unsafe { self.inner.free(addr) };
    }
}

// ============================================================================
// Tests
// ============================================================================
