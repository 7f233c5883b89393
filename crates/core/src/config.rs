//! Compile-time layout selection
//!
//! Everything about the word layout is decided once per build and never
//! branched on at runtime:
//!
//! - native word width: `target_pointer_width` (32 or 64)
//! - small-integer overflow detection: half-word `overflowing_*` intrinsics
//!   (default) or the portable full-width sign test (`portable-overflow`)
//! - double encoding: heap-allocate negative doubles (default on 64-bit),
//!   NaN-boxing (`nan-box`, 64-bit only), or always heap-allocate (32-bit)
//!
//! The derived constants below are what the rest of the crate builds on.

use crate::double::{ActiveDouble, DoubleEncoding, DoubleKind};
use crate::overflow::{ActiveOverflow, OverflowKind, OverflowStrategy};

#[cfg(all(feature = "nan-box", not(target_pointer_width = "64")))]
compile_error!("the `nan-box` feature requires a 64-bit target");

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("tagword supports 32-bit and 64-bit targets only");

/// Bits in a native machine word
pub const WORD_BITS: u32 = isize::BITS;

/// Half of a native word: the operand type for small-integer overflow checks
#[cfg(target_pointer_width = "64")]
pub type HalfWord = i32;

/// Half of a native word: the operand type for small-integer overflow checks
#[cfg(target_pointer_width = "32")]
pub type HalfWord = i16;

/// Bits available to an immediate value `n` stored as `(n << 1) | 1`
pub const BOXED_VALUE_BITS: u32 = <ActiveDouble as DoubleEncoding>::VALUE_BITS;

pub const MAX_BOXED_INT: isize = isize::MAX >> (WORD_BITS - BOXED_VALUE_BITS);
pub const MIN_BOXED_INT: isize = -MAX_BOXED_INT - 1;

pub const MAX_BOXED_UINT: usize = usize::MAX >> (WORD_BITS - BOXED_VALUE_BITS);
pub const MIN_BOXED_UINT: usize = 0;

/// Small integers are limited to a half word so one sign test covers overflow
pub const SMALLINT_BITS: u32 = HalfWord::BITS;

/// Largest small integer: `2^29 - 1` on 64-bit, `2^13 - 1` on 32-bit.
///
/// The boxed form `4n + 1` of every small integer fits in a `HalfWord`.
pub const SMALLINT_MAX: isize =
    (((isize::MAX as usize) >> (WORD_BITS - SMALLINT_BITS)) >> 2) as isize;
pub const SMALLINT_MIN: isize = -SMALLINT_MAX - 1;

/// Description of the layout this build was compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxLayout {
    pub word_bits: u32,
    pub boxed_value_bits: u32,
    pub smallint_bits: u32,
    pub smallint_min: isize,
    pub smallint_max: isize,
    pub overflow: OverflowKind,
    pub doubles: DoubleKind,
}

/// The active layout
pub const LAYOUT: BoxLayout = BoxLayout {
    word_bits: WORD_BITS,
    boxed_value_bits: BOXED_VALUE_BITS,
    smallint_bits: SMALLINT_BITS,
    smallint_min: SMALLINT_MIN,
    smallint_max: SMALLINT_MAX,
    overflow: <ActiveOverflow as OverflowStrategy>::KIND,
    doubles: <ActiveDouble as DoubleEncoding>::KIND,
};

// Every small integer's boxed form `4n + 1` must be representable as an
// immediate, and the immediate range must fit in a word.
const _: () = assert!(SMALLINT_BITS < BOXED_VALUE_BITS);
const _: () = assert!(BOXED_VALUE_BITS < WORD_BITS);
const _: () = assert!(SMALLINT_MAX * 4 + 1 <= HalfWord::MAX as isize);
const _: () = assert!(SMALLINT_MIN * 4 + 1 >= HalfWord::MIN as isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_smallint_range_64() {
        assert_eq!(SMALLINT_BITS, 32);
        assert_eq!(SMALLINT_MAX, (1 << 29) - 1);
        assert_eq!(SMALLINT_MIN, -(1 << 29));
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn test_ranges_32() {
        assert_eq!(SMALLINT_BITS, 16);
        assert_eq!(SMALLINT_MAX, (1 << 13) - 1);
        assert_eq!(SMALLINT_MIN, -(1 << 13));
        assert_eq!(MAX_BOXED_INT, (1 << 30) - 1);
        assert_eq!(MIN_BOXED_INT, -(1 << 30));
    }

    #[test]
    #[cfg(all(target_pointer_width = "64", not(feature = "nan-box")))]
    fn test_boxed_value_range_64() {
        assert_eq!(BOXED_VALUE_BITS, 63);
        assert_eq!(MAX_BOXED_INT, isize::MAX >> 1);
        assert_eq!(MIN_BOXED_INT, isize::MIN >> 1);
        assert_eq!(MAX_BOXED_UINT, usize::MAX >> 1);
    }

    #[test]
    #[cfg(feature = "nan-box")]
    fn test_boxed_value_range_nan_box() {
        assert_eq!(BOXED_VALUE_BITS, 51);
        assert_eq!(MAX_BOXED_INT, (1 << 50) - 1);
        assert_eq!(MIN_BOXED_INT, -(1 << 50));
    }

    #[test]
    fn test_layout_matches_constants() {
        assert_eq!(LAYOUT.word_bits, usize::BITS);
        assert_eq!(LAYOUT.smallint_max, SMALLINT_MAX);
        assert_eq!(LAYOUT.smallint_min, SMALLINT_MIN);
        assert!(LAYOUT.smallint_bits * 2 == LAYOUT.word_bits);
    }

    #[test]
    fn test_selected_strategies() {
        #[cfg(feature = "portable-overflow")]
        assert_eq!(LAYOUT.overflow, OverflowKind::Portable);
        #[cfg(not(feature = "portable-overflow"))]
        assert_eq!(LAYOUT.overflow, OverflowKind::Intrinsic);

        #[cfg(feature = "nan-box")]
        assert_eq!(LAYOUT.doubles, DoubleKind::NanBox);
        #[cfg(all(target_pointer_width = "64", not(feature = "nan-box")))]
        assert_eq!(LAYOUT.doubles, DoubleKind::HeapNegative);
        #[cfg(target_pointer_width = "32")]
        assert_eq!(LAYOUT.doubles, DoubleKind::HeapOnly);
    }
}
