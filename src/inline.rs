//! Filepath: src/inline.rs
//!
//! Pointer-free payload encodings for sets of up to four ids.
//!
//! The inline variants pack their entire contents into the handle's 8-byte
//! payload, so they have no heap block and no lifecycle cost. All packings
//! keep the ids strictly ascending so membership checks and unpacking stay
//! branch-light.
//!
//! # Packings
//!
//! - `Inline1`: the id in the low 32 bits.
//! - `Inline2`: smaller id in the high 32 bits, larger in the low 32.
//! - `Inline3`: three 21-bit ids, `id0 << 42 | id1 << 21 | id2`, smallest
//!   first in the top field.
//! - `Inline4`: four 16-bit ids in ascending little-endian lanes.

use crate::chooser::{MAX_ARRAY16_VALUE, MAX_INLINE3_VALUE};
use crate::handle::SetHandle;
use crate::tag::{ReprKind, TAG_INLINE1, TAG_INLINE2, TAG_INLINE3, TAG_INLINE4};

/// Width of an Inline3 field.
const INLINE3_SHIFT: u64 = 21;

/// Mask of an Inline3 field.
const INLINE3_MASK: u64 = (1 << INLINE3_SHIFT) - 1;

/// Build a one-id handle.
#[inline]
#[must_use]
pub fn inline1(id: u32) -> SetHandle {
    SetHandle::from_parts(TAG_INLINE1, u64::from(id))
}

/// Build a two-id handle. Equal ids collapse to `Inline1` on construction.
#[inline]
#[must_use]
pub fn inline2(a: u32, b: u32) -> SetHandle {
    if a == b {
        return inline1(a);
    }

    let (small, large) = if a < b { (a, b) } else { (b, a) };

    SetHandle::from_parts(
        TAG_INLINE2,
        (u64::from(small) << 32) | u64::from(large),
    )
}

/// Build a three-id handle from strictly ascending ids, each at most
/// 2^21 - 1.
#[inline]
#[must_use]
pub fn inline3(id0: u32, id1: u32, id2: u32) -> SetHandle {
    debug_assert!(id0 < id1 && id1 < id2, "inline3 ids must ascend");
    debug_assert!(id2 <= MAX_INLINE3_VALUE, "inline3 id exceeds 21 bits");

    SetHandle::from_parts(
        TAG_INLINE3,
        (u64::from(id0) << (2 * INLINE3_SHIFT))
            | (u64::from(id1) << INLINE3_SHIFT)
            | u64::from(id2),
    )
}

/// Build a four-id handle from strictly ascending ids, each at most
/// 65,535.
#[inline]
#[must_use]
pub fn inline4(ids: [u32; 4]) -> SetHandle {
    debug_assert!(
        ids[0] < ids[1] && ids[1] < ids[2] && ids[2] < ids[3],
        "inline4 ids must ascend"
    );
    debug_assert!(ids[3] <= MAX_ARRAY16_VALUE, "inline4 id exceeds 16 bits");

    let mut payload = 0u64;
    for (lane, &id) in ids.iter().enumerate() {
        payload |= u64::from(id as u16) << (16 * lane);
    }

    SetHandle::from_parts(TAG_INLINE4, payload)
}

/// Unpack an Empty or inline handle into `out`, ascending. Returns the
/// number of ids written (0..=4).
///
/// # Panics
/// Panics in debug mode on a heap-variant handle.
#[must_use]
pub fn unpack(handle: SetHandle, out: &mut [u32; 4]) -> usize {
    let payload = handle.payload();

    match handle.kind() {
        ReprKind::Empty => 0,

        ReprKind::Inline1 => {
            out[0] = payload as u32;
            1
        }

        ReprKind::Inline2 => {
            out[0] = (payload >> 32) as u32;
            out[1] = payload as u32;
            2
        }

        ReprKind::Inline3 => {
            out[0] = ((payload >> (2 * INLINE3_SHIFT)) & INLINE3_MASK) as u32;
            out[1] = ((payload >> INLINE3_SHIFT) & INLINE3_MASK) as u32;
            out[2] = (payload & INLINE3_MASK) as u32;
            3
        }

        ReprKind::Inline4 => {
            for lane in 0..4 {
                out[lane] = ((payload >> (16 * lane)) & 0xFFFF) as u32;
            }
            4
        }

        heap => {
            debug_assert!(false, "unpack on heap variant {heap:?}");
            0
        }
    }
}

/// Membership check over the packed ids.
#[inline]
#[must_use]
pub fn contains(handle: SetHandle, id: u32) -> bool {
    let mut ids = [0u32; 4];
    let n = unpack(handle, &mut ids);

    // Equality-any over at most four lanes; the compiler vectorizes the
    // Inline4 case on its own.
    ids[..n].contains(&id)
}

// ============================================================================
// Tests
// ============================================================================
