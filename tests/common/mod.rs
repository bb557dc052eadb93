//! Common test utilities.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     let alloc = common::Alloc::default();
//!     // ...
//! }
//! ```
//!
//! Set `RUST_LOG` (e.g. `packset=debug`) to see representation-transition
//! logging when the crate is built with `--features tracing`.

#![allow(dead_code)]

use std::sync::Once;

use packset::{BlockAllocator, CountingAllocator, HeapAllocator, IdReader, SetHandle};

/// The balance-checking allocator every test goes through.
pub type Alloc = CountingAllocator<HeapAllocator>;

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber from `RUST_LOG`.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Drain a handle's stream reader into a vector.
pub fn ids_of(handle: SetHandle) -> Vec<u32> {
    let mut reader = handle.stream_reader();
    let mut out = Vec::new();
    let mut buf = [0u32; 1024];

    loop {
        let n = reader.read(&mut buf);
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Add `id`, releasing the old owned handle.
pub fn add_owned<A: BlockAllocator>(alloc: &A, handle: SetHandle, id: u32) -> SetHandle {
    let (next, changed) = handle.try_add(alloc, id);
    if changed {
        unsafe { handle.release(alloc) };
        next
    } else {
        handle
    }
}

/// Remove `id`, releasing the old owned handle.
pub fn remove_owned<A: BlockAllocator>(alloc: &A, handle: SetHandle, id: u32) -> SetHandle {
    let (next, changed) = handle.try_remove(alloc, id);
    if changed {
        unsafe { handle.release(alloc) };
        next
    } else {
        handle
    }
}
