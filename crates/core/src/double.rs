//! Double Encodings
//!
//! Three ways to put an IEEE 754 double in a box. One is selected per build
//! as `ActiveDouble`; the others stay available for direct use and testing.
//!
//! ## HeapNegative (64-bit default)
//!
//! A double whose sign bit is 0 has a 63-bit pattern that fits the immediate
//! slot exactly, so it is stored as the value `(bits << 1) | 1`. Negative
//! doubles (including `-0.0` and negative NaNs) go to a heap block.
//!
//! ## NanBox (64-bit, `nan-box` feature)
//!
//! Pointers and immediates are limited to 52 bits, so their top 12 bits are a
//! sign extension: always `0x000` or `0xFFF`. Doubles are moved out of that
//! range:
//!
//! ```text
//! 000x xxxx xxxx xxxz   z = bbbb bbb0  : positive pointer
//! 000x xxxx xxxx xxxz   z = bbbb bbb1  : positive value
//! 001x ... 7FFx ...                    : positive finite double + 2^52
//! 800x ... FFEx ...                    : negative finite double, unchanged
//! FFFx xxxx xxxx xxxz   z = bbbb bbb0  : negative pointer
//! FFFx xxxx xxxx xxxz   z = bbbb bbb1  : negative value
//! ```
//!
//! Infinities and NaNs have exponent `0x7FF`. Their sign is extended over the
//! exponent (a positive one gets its top 12 bits cleared), bit 0 is folded
//! into bit 1, and bit 0 is set so the word reads as a value. Unboxing
//! spreads bit 1 back into bit 0 and restores the exponent, so at most one
//! NaN payload bit changes and a NaN never comes back as an infinity.
//!
//! ## HeapOnly (32-bit)
//!
//! Every double is heap-allocated.

use crate::boxed::Boxed;
use crate::config::WORD_BITS;
use crate::heap::{Context, HeapCell, Tag};

/// Which double encoding a build uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleKind {
    HeapNegative,
    NanBox,
    HeapOnly,
}

/// A strategy for encoding doubles, and the pointer/value tests it implies
pub trait DoubleEncoding {
    const KIND: DoubleKind;

    /// Bits available to immediate values under this strategy
    const VALUE_BITS: u32;

    fn is_ptr(b: Boxed) -> bool;
    fn is_value(b: Boxed) -> bool;

    /// A finite double held directly in the word, if this word is one that
    /// can only be a double
    fn inline_double(b: Boxed) -> Option<f64>;

    fn box_double(d: f64, ctx: &Context) -> Boxed;

    /// Decode a double, releasing its heap block if it has one
    ///
    /// # Safety
    /// The word must have been produced by `box_double` of the same strategy
    /// (or be `Boxed::ANY`), and is consumed.
    unsafe fn unbox_double(b: Boxed, ctx: &Context) -> f64;
}

/// Allocate a `Double` block
#[inline]
pub fn box_double_heap(d: f64, ctx: &Context) -> Boxed {
    let cell = ctx.alloc_cell(d, 0, Tag::Double);
    Boxed::box_ptr(cell.cast())
}

/// Read a `Double` block and release it
///
/// # Safety
/// The word must point to a live `Double` block owned by the caller.
#[inline]
pub unsafe fn unbox_double_heap(b: Boxed, ctx: &Context) -> f64 {
    let block = unsafe { b.unbox_block(Tag::Double) };
    let d = unsafe { HeapCell::<f64>::from_block(block) }.value;
    unsafe { ctx.drop_block(block) };
    d
}

// =============================================================================
// Strategy A: positive doubles inline, negative doubles on the heap
// =============================================================================

#[cfg(target_pointer_width = "64")]
#[derive(Debug, Clone, Copy)]
pub struct HeapNegative;

#[cfg(target_pointer_width = "64")]
impl DoubleEncoding for HeapNegative {
    const KIND: DoubleKind = DoubleKind::HeapNegative;
    const VALUE_BITS: u32 = WORD_BITS - 1;

    #[inline(always)]
    fn is_ptr(b: Boxed) -> bool {
        b.is_ptr_fast()
    }

    #[inline(always)]
    fn is_value(b: Boxed) -> bool {
        b.is_value_fast()
    }

    #[inline(always)]
    fn inline_double(_b: Boxed) -> Option<f64> {
        None
    }

    #[inline]
    fn box_double(d: f64, ctx: &Context) -> Boxed {
        let bits = d.to_bits();
        if bits >> 63 == 0 {
            // Sign bit clear: the remaining 63 bits fit the immediate exactly.
            Boxed::from_bits(((bits << 1) | 1) as usize)
        } else {
            box_double_heap(d, ctx)
        }
    }

    #[inline]
    unsafe fn unbox_double(b: Boxed, ctx: &Context) -> f64 {
        if b.is_value_fast() {
            f64::from_bits((b.to_bits() >> 1) as u64)
        } else {
            unsafe { unbox_double_heap(b, ctx) }
        }
    }
}

// =============================================================================
// Strategy B: NaN-boxing
// =============================================================================

#[cfg(target_pointer_width = "64")]
#[derive(Debug, Clone, Copy)]
pub struct NanBox;

#[cfg(target_pointer_width = "64")]
const POSITIVE_DOUBLE_OFFSET: u64 = 1 << 52;

#[cfg(target_pointer_width = "64")]
const EXPONENT_MASK: u64 = 0x7FF << 52;

#[cfg(target_pointer_width = "64")]
impl NanBox {
    /// True if the top 12 bits are not a sign extension (`0x000`/`0xFFF`),
    /// i.e. the word is a finite double
    #[inline(always)]
    pub fn is_double_normal(b: Boxed) -> bool {
        // Move bit 52 to bit 31 and check the word is a sign-extended i32.
        let i = (b.to_bits() as i64) >> 21;
        i != (i as i32) as i64
    }

    /// An infinity or NaN; these share the value encoding
    #[inline(always)]
    pub fn is_double_special(b: Boxed) -> bool {
        b.is_value_fast() && !Self::is_double_normal(b)
    }

    #[inline(always)]
    pub fn is_double(b: Boxed) -> bool {
        Self::is_double_normal(b) || b.is_value_fast()
    }
}

#[cfg(target_pointer_width = "64")]
impl DoubleEncoding for NanBox {
    const KIND: DoubleKind = DoubleKind::NanBox;
    const VALUE_BITS: u32 = 51;

    #[inline(always)]
    fn is_ptr(b: Boxed) -> bool {
        b.is_ptr_fast() && !Self::is_double_normal(b)
    }

    #[inline(always)]
    fn is_value(b: Boxed) -> bool {
        b.is_value_fast() && !Self::is_double_normal(b)
    }

    #[inline]
    fn inline_double(b: Boxed) -> Option<f64> {
        if Self::is_double_normal(b) {
            let mut u = b.to_bits() as u64;
            if (u as i64) >= 0 {
                u -= POSITIVE_DOUBLE_OFFSET;
            }
            Some(f64::from_bits(u))
        } else {
            None
        }
    }

    #[inline]
    fn box_double(d: f64, _ctx: &Context) -> Boxed {
        let mut u = d.to_bits();
        let b = if u & EXPONENT_MASK != EXPONENT_MASK {
            // Finite; the sign bit (not the value) decides so -0.0 stays negative.
            if (u as i64) >= 0 {
                u += POSITIVE_DOUBLE_OFFSET;
            }
            Boxed::from_bits(u as usize)
        } else {
            // Infinity or NaN.
            if (u as i64) >= 0 {
                u = (u << 12) >> 12;
            }
            Boxed::from_bits((u | 1 | ((u & 1) << 1)) as usize)
        };
        debug_assert!(Self::is_double(b));
        b
    }

    #[inline]
    unsafe fn unbox_double(b: Boxed, _ctx: &Context) -> f64 {
        debug_assert!(Self::is_double(b) || b.is_any(), "unbox_double: not a double");
        if let Some(d) = Self::inline_double(b) {
            debug_assert!(d.is_finite());
            return d;
        }
        let v = b.to_bits() as u64;
        let u = ((v ^ 1) | ((v >> 1) & 1)) | EXPONENT_MASK;
        let d = f64::from_bits(u);
        debug_assert!(!d.is_finite());
        d
    }
}

// =============================================================================
// 32-bit: always on the heap
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct HeapOnly;

impl DoubleEncoding for HeapOnly {
    const KIND: DoubleKind = DoubleKind::HeapOnly;
    const VALUE_BITS: u32 = WORD_BITS - 1;

    #[inline(always)]
    fn is_ptr(b: Boxed) -> bool {
        b.is_ptr_fast()
    }

    #[inline(always)]
    fn is_value(b: Boxed) -> bool {
        b.is_value_fast()
    }

    #[inline(always)]
    fn inline_double(_b: Boxed) -> Option<f64> {
        None
    }

    #[inline]
    fn box_double(d: f64, ctx: &Context) -> Boxed {
        box_double_heap(d, ctx)
    }

    #[inline]
    unsafe fn unbox_double(b: Boxed, ctx: &Context) -> f64 {
        unsafe { unbox_double_heap(b, ctx) }
    }
}

/// The double encoding this build uses
#[cfg(all(target_pointer_width = "64", not(feature = "nan-box")))]
pub type ActiveDouble = HeapNegative;

/// The double encoding this build uses
#[cfg(all(target_pointer_width = "64", feature = "nan-box"))]
pub type ActiveDouble = NanBox;

/// The double encoding this build uses
#[cfg(target_pointer_width = "32")]
pub type ActiveDouble = HeapOnly;

/// Box a double with the active strategy
#[inline]
pub fn box_double(d: f64, ctx: &Context) -> Boxed {
    ActiveDouble::box_double(d, ctx)
}

/// Unbox a double with the active strategy
///
/// # Safety
/// The word must have been produced by `box_double` and is consumed.
#[inline]
pub unsafe fn unbox_double(b: Boxed, ctx: &Context) -> f64 {
    unsafe { ActiveDouble::unbox_double(b, ctx) }
}
