//! Small-integer overflow detection
//!
//! Small integers live in a half word, so arithmetic on them can be checked
//! in one of two ways:
//!
//! - **Intrinsic**: truncate both operands to the half word, use the
//!   `overflowing_*` primitives, and sign-extend the result back.
//! - **Portable**: do the operation at full word width, then check that the
//!   bits above the half word are a uniform copy of its sign bit. Shifting
//!   the result right by `HALF_BITS - 1` leaves `0` or `-1` exactly when that
//!   holds, so `(s as usize) + 1 <= 1` is a single unsigned compare.
//!
//! Both return the pair `(result, overflowed)`. On success the results are
//! identical; on overflow they agree once truncated to a `HalfWord`.

use crate::config::{HalfWord, SMALLINT_BITS};

/// Which overflow strategy a build uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowKind {
    Intrinsic,
    Portable,
}

/// Checked add/sub/mul on half-word operands carried in full words
pub trait OverflowStrategy {
    const KIND: OverflowKind;

    fn add(x: isize, y: isize) -> (isize, bool);
    fn sub(x: isize, y: isize) -> (isize, bool);
    fn mul(x: isize, y: isize) -> (isize, bool);
}

/// Half-word `overflowing_*` primitives
#[derive(Debug, Clone, Copy)]
pub struct Intrinsic;

impl OverflowStrategy for Intrinsic {
    const KIND: OverflowKind = OverflowKind::Intrinsic;

    #[inline(always)]
    fn add(x: isize, y: isize) -> (isize, bool) {
        let (r, ovf) = (x as HalfWord).overflowing_add(y as HalfWord);
        (r as isize, ovf)
    }

    #[inline(always)]
    fn sub(x: isize, y: isize) -> (isize, bool) {
        let (r, ovf) = (x as HalfWord).overflowing_sub(y as HalfWord);
        (r as isize, ovf)
    }

    #[inline(always)]
    fn mul(x: isize, y: isize) -> (isize, bool) {
        let (r, ovf) = (x as HalfWord).overflowing_mul(y as HalfWord);
        (r as isize, ovf)
    }
}

/// Full-width operation followed by a single sign-extension test
#[derive(Debug, Clone, Copy)]
pub struct Portable;

/// True if the bits above the low half word are not all equal to its sign bit
#[inline(always)]
fn exceeds_half_word(z: isize) -> bool {
    let s = (z >> (SMALLINT_BITS - 1)) as usize;
    s.wrapping_add(1) > 1
}

impl OverflowStrategy for Portable {
    const KIND: OverflowKind = OverflowKind::Portable;

    #[inline(always)]
    fn add(x: isize, y: isize) -> (isize, bool) {
        let z = x.wrapping_add(y);
        (z, exceeds_half_word(z))
    }

    #[inline(always)]
    fn sub(x: isize, y: isize) -> (isize, bool) {
        let z = x.wrapping_sub(y);
        (z, exceeds_half_word(z))
    }

    // Two half-word operands never overflow a full-word product.
    #[inline(always)]
    fn mul(x: isize, y: isize) -> (isize, bool) {
        let z = x.wrapping_mul(y);
        (z, exceeds_half_word(z))
    }
}

/// The strategy this build uses for small-integer fast paths
#[cfg(not(feature = "portable-overflow"))]
pub type ActiveOverflow = Intrinsic;

/// The strategy this build uses for small-integer fast paths
#[cfg(feature = "portable-overflow")]
pub type ActiveOverflow = Portable;
