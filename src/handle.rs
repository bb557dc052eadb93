//! Filepath: src/handle.rs
//!
//! The 9-byte set handle.
//!
//! A [`SetHandle`] is the value users hold and copy: a 1-byte tag plus an
//! 8-byte payload. For the small variants the payload *is* the data; for
//! the heap variants it is the address of a refcounted block. Copying a
//! handle does not touch any refcount; ownership transfers are explicit
//! through [`acquire`](SetHandle::acquire) and
//! [`release`](SetHandle::release) in `set.rs`.
//!
//! Two handles with identical (tag, payload) denote the same logical set.

use std::fmt as StdFmt;
use std::ptr::NonNull;

use crate::tag::{self, ReprKind, TAG_EMPTY};

/// A persistent ordered set of `u32`, held by value.
///
/// # Liveness contract
///
/// A handle to a heap variant is valid only while the reference it denotes
/// is outstanding: after [`release`](SetHandle::release) the handle value
/// must not be used again. The library does not (and cannot) check this.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SetHandle {
    tag: u8,
    payload: u64,
}

impl SetHandle {
    /// The empty set. A known constant; no lifecycle cost.
    pub const EMPTY: Self = Self {
        tag: TAG_EMPTY,
        payload: 0,
    };

    /// Assemble a handle from raw parts.
    #[inline]
    #[must_use]
    pub(crate) const fn from_parts(tag: u8, payload: u64) -> Self {
        Self { tag, payload }
    }

    /// Assemble a heap-variant handle from a kind tag and block address.
    #[inline]
    #[must_use]
    pub(crate) fn from_ptr(tag: u8, ptr: NonNull<u8>) -> Self {
        debug_assert!(ReprKind::from_tag(tag).is_heap());

        Self {
            tag,
            payload: ptr.as_ptr() as usize as u64,
        }
    }

    /// The raw tag byte (kind bits plus immutability flag).
    #[inline]
    #[must_use]
    pub(crate) const fn tag(self) -> u8 {
        self.tag
    }

    /// The raw payload word.
    #[inline]
    #[must_use]
    pub(crate) const fn payload(self) -> u64 {
        self.payload
    }

    /// The representation kind of this handle.
    #[inline]
    #[must_use]
    pub fn kind(self) -> ReprKind {
        ReprKind::from_tag(self.tag)
    }

    /// Whether this handle is flagged immutable.
    ///
    /// Mutating an immutable handle copies instead of writing in place; the
    /// original keeps its contents.
    #[inline]
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        tag::is_immutable(self.tag)
    }

    /// This handle with the immutability flag set (flag only; see
    /// [`make_immutable`](SetHandle::make_immutable) for the full walk).
    #[inline]
    #[must_use]
    pub(crate) const fn flagged_immutable(self) -> Self {
        Self {
            tag: tag::with_immutable(self.tag),
            payload: self.payload,
        }
    }

    /// This handle with `parent`'s immutability flag inherited.
    #[inline]
    #[must_use]
    pub(crate) const fn inherit_immutable(self, parent: Self) -> Self {
        Self {
            tag: tag::inherit_immutable(self.tag, parent.tag),
            payload: self.payload,
        }
    }

    /// The heap block address of a pointer-backed handle.
    ///
    /// # Panics
    /// Panics in debug mode when called on an inline variant.
    #[inline]
    #[must_use]
    pub(crate) fn block_ptr(self) -> NonNull<u8> {
        debug_assert!(self.kind().is_heap(), "block_ptr on inline handle");

        // Payload of a heap variant is a non-null allocator address.
        unsafe { NonNull::new_unchecked(self.payload as usize as *mut u8) }
    }
}

impl StdFmt::Debug for SetHandle {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("SetHandle")
            .field("kind", &self.kind())
            .field("immutable", &self.is_immutable())
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
