//! Single-Word Boxing
//!
//! Every runtime value fits in one machine word. Heap blocks are at least
//! 4-byte aligned, so bit 0 separates the two basic cases:
//!
//! ```text
//! xxxx ... xxxx xxx0 : pointer to a heap block (stored unchanged)
//! xxxx ... xxxx xxx1 : immediate value n, stored as (n << 1) | 1
//! ```
//!
//! Boxing a heap pointer is free and leaves the word usable as a pointer.
//! Doubles add a strategy-specific layer on top of this (see `double`); under
//! NaN-boxing the top 12 bits also take part in telling pointers and values
//! apart from doubles, so `is_ptr`/`is_value` go through the active strategy.
//!
//! A box never holds a null pointer. `Boxed::NULL` (all bits set) is the
//! "no value" word; `Boxed::ANY` is accepted by every unbox operation and is
//! used as the placeholder result while yielding.

use std::fmt;
use std::ptr::NonNull;

use crate::config::{MAX_BOXED_INT, MAX_BOXED_UINT, MIN_BOXED_INT};
use crate::double::{ActiveDouble, DoubleEncoding};
use crate::heap::{Block, Context, Tag};

/// A boxed runtime value: one machine word
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boxed(usize);

/// Closed view of a boxed word
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxView {
    /// Heap block reference
    Ptr(NonNull<Block>),
    /// Immediate value (ints, enums, bools, chars; positive doubles under
    /// the default strategy)
    Value(isize),
    /// A finite double held directly in the word (NaN-boxing only)
    Double(f64),
}

impl Boxed {
    /// The "no value" word; never a valid pointer
    pub const NULL: Boxed = Boxed(!0);

    /// Accepted by every unbox operation (decodes as 0)
    pub const ANY: Boxed = Boxed(1);

    // =========================================================================
    // Raw Access
    // =========================================================================

    #[inline(always)]
    pub const fn from_bits(bits: usize) -> Self {
        Boxed(bits)
    }

    #[inline(always)]
    pub const fn from_isize(i: isize) -> Self {
        Boxed(i as usize)
    }

    #[inline(always)]
    pub const fn to_bits(self) -> usize {
        self.0
    }

    #[inline(always)]
    pub const fn as_isize(self) -> isize {
        self.0 as isize
    }

    #[inline(always)]
    pub fn eq_bits(self, other: Boxed) -> bool {
        self.0 == other.0
    }

    // =========================================================================
    // Type Checking
    // =========================================================================

    /// Pointer test that ignores doubles; valid when the word is known not
    /// to hold one
    #[inline(always)]
    pub const fn is_ptr_fast(self) -> bool {
        self.0 & 1 == 0
    }

    /// Value test that ignores doubles; valid when the word is known not to
    /// hold one
    #[inline(always)]
    pub const fn is_value_fast(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline(always)]
    pub fn is_ptr(self) -> bool {
        ActiveDouble::is_ptr(self)
    }

    #[inline(always)]
    pub fn is_value(self) -> bool {
        ActiveDouble::is_value(self)
    }

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline(always)]
    pub fn is_any(self) -> bool {
        self == Self::ANY
    }

    // =========================================================================
    // Pointers
    // =========================================================================

    /// Box a heap block pointer; the word is the address itself
    #[inline(always)]
    pub fn box_ptr(p: NonNull<Block>) -> Self {
        let addr = p.as_ptr() as usize;
        debug_assert!(
            addr & 0x03 == 0,
            "box_ptr: pointer 0x{:x} is not 4-byte aligned",
            addr
        );
        Boxed(addr)
    }

    /// Recover the block pointer from a pointer word
    #[inline(always)]
    pub fn unbox_ptr(self) -> NonNull<Block> {
        debug_assert!(self.is_ptr() || self.is_any(), "unbox_ptr: not a pointer");
        debug_assert!(self.0 != 0, "unbox_ptr: null pointer");
        // Pointer words are produced only by box_ptr, which starts from a NonNull.
        unsafe { NonNull::new_unchecked(self.0 as *mut Block) }
    }

    /// Non-null pointer test
    #[inline(always)]
    pub fn is_non_null_ptr(self) -> bool {
        debug_assert!(!self.is_ptr() || self.0 != 0, "boxed null pointer");
        self.is_ptr()
    }

    /// Unbox a block pointer after checking its tag (debug builds)
    ///
    /// # Safety
    /// The word must point to a live block.
    #[inline]
    pub unsafe fn unbox_block(self, expected: Tag) -> NonNull<Block> {
        let block = self.unbox_ptr();
        debug_assert_eq!(
            unsafe { block.as_ref() }.tag(),
            expected,
            "unbox_block: tag mismatch"
        );
        block
    }

    // =========================================================================
    // Immediates
    // =========================================================================

    #[inline(always)]
    pub fn box_int(i: isize) -> Self {
        debug_assert!(
            (MIN_BOXED_INT..=MAX_BOXED_INT).contains(&i),
            "box_int: {} outside immediate range [{}, {}]",
            i,
            MIN_BOXED_INT,
            MAX_BOXED_INT
        );
        let b = Boxed(((i << 1) | 1) as usize);
        debug_assert!(b.is_value());
        b
    }

    #[inline(always)]
    pub fn unbox_int(self) -> isize {
        debug_assert!(self.is_value() || self.is_any(), "unbox_int: not a value");
        (self.0 as isize) >> 1
    }

    #[inline(always)]
    pub fn box_enum(u: usize) -> Self {
        debug_assert!(
            u <= MAX_BOXED_UINT,
            "box_enum: {} outside immediate range",
            u
        );
        let b = Boxed((u << 1) | 1);
        debug_assert!(b.is_value());
        b
    }

    #[inline(always)]
    pub fn unbox_enum(self) -> usize {
        debug_assert!(self.is_value() || self.is_any(), "unbox_enum: not a value");
        self.0 >> 1
    }

    #[inline(always)]
    pub fn box_bool(b: bool) -> Self {
        Self::box_enum(b as usize)
    }

    #[inline(always)]
    pub fn unbox_bool(self) -> bool {
        self.unbox_enum() != 0
    }

    #[inline(always)]
    pub fn box_int16(i: i16) -> Self {
        Self::box_int(i as isize)
    }

    #[inline(always)]
    pub fn unbox_int16(self) -> i16 {
        let i = self.unbox_int();
        debug_assert!(
            (i16::MIN as isize..=i16::MAX as isize).contains(&i),
            "unbox_int16: {} out of range",
            i
        );
        i as i16
    }

    /// Box a char as its scalar value
    #[inline(always)]
    pub fn box_char(c: char) -> Self {
        Self::box_enum(c as usize)
    }

    #[inline(always)]
    pub fn unbox_char(self) -> char {
        let u = self.unbox_enum();
        debug_assert!(
            char::from_u32(u as u32).is_some(),
            "unbox_char: 0x{:x} is not a char",
            u
        );
        char::from_u32(u as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Classify the word
    ///
    /// A double is only recognisable without type information under
    /// NaN-boxing; elsewhere a positive double reads as `Value` and a
    /// heap-boxed one as `Ptr`.
    pub fn view(self) -> BoxView {
        if let Some(d) = ActiveDouble::inline_double(self) {
            BoxView::Double(d)
        } else if self.is_ptr_fast() {
            BoxView::Ptr(self.unbox_ptr())
        } else {
            BoxView::Value(self.unbox_int())
        }
    }

    /// Pack a view back into a word
    pub fn from_view(view: BoxView, ctx: &Context) -> Self {
        match view {
            BoxView::Ptr(p) => Self::box_ptr(p),
            BoxView::Value(i) => Self::box_int(i),
            BoxView::Double(d) => ActiveDouble::box_double(d, ctx),
        }
    }

    // =========================================================================
    // Reference Counting
    // =========================================================================

    /// Duplicate: take another reference if this is a pointer
    ///
    /// # Safety
    /// A pointer word must refer to a live block.
    #[inline]
    pub unsafe fn dup(self, ctx: &Context) -> Self {
        if self.is_ptr() {
            unsafe { ctx.dup_block(self.unbox_ptr()) };
        }
        self
    }

    /// Release the reference this word holds, if any
    ///
    /// # Safety
    /// The caller must own the reference; the word must not be used after.
    #[inline]
    pub unsafe fn drop_in(self, ctx: &Context) {
        if self.is_ptr() {
            unsafe { ctx.drop_block(self.unbox_ptr()) };
        }
    }
}

impl fmt::Debug for Boxed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view() {
            BoxView::Ptr(p) => write!(f, "Ptr({:p})", p.as_ptr()),
            BoxView::Value(i) => write!(f, "Value({})", i),
            BoxView::Double(d) => write!(f, "Double({})", d),
        }
    }
}

// =============================================================================
// Int32
// =============================================================================

/// Box an `i32`; always immediate on 64-bit targets
#[cfg(target_pointer_width = "64")]
#[inline]
pub fn box_int32(i: i32, _ctx: &Context) -> Boxed {
    Boxed::box_int(i as isize)
}

/// Unbox an `i32`
///
/// # Safety
/// The word must have been produced by `box_int32`.
#[cfg(target_pointer_width = "64")]
#[inline]
pub unsafe fn unbox_int32(b: Boxed, _ctx: &Context) -> i32 {
    let i = b.unbox_int();
    debug_assert!(
        (i32::MIN as isize..=i32::MAX as isize).contains(&i),
        "unbox_int32: {} out of range",
        i
    );
    i as i32
}

/// Box an `i32`, heap-allocating values outside the 31-bit immediate range
#[cfg(target_pointer_width = "32")]
#[inline]
pub fn box_int32(i: i32, ctx: &Context) -> Boxed {
    if (MIN_BOXED_INT..=MAX_BOXED_INT).contains(&(i as isize)) {
        Boxed::box_int(i as isize)
    } else {
        let cell = ctx.alloc_cell(i, 0, Tag::Int32);
        Boxed::box_ptr(cell.cast())
    }
}

/// Unbox an `i32`, releasing its heap block if it had one
///
/// # Safety
/// The word must have been produced by `box_int32` and is consumed.
#[cfg(target_pointer_width = "32")]
#[inline]
pub unsafe fn unbox_int32(b: Boxed, ctx: &Context) -> i32 {
    if b.is_value() {
        let i = b.unbox_int();
        debug_assert!((i32::MIN as isize..=i32::MAX as isize).contains(&i));
        i as i32
    } else {
        let block = unsafe { b.unbox_block(Tag::Int32) };
        let i = unsafe { crate::heap::HeapCell::<i32>::from_block(block) }.value;
        unsafe { ctx.drop_block(block) };
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_is_one_word() {
        assert_eq!(std::mem::size_of::<Boxed>(), std::mem::size_of::<usize>());
    }

    #[test]
    fn test_int_encoding() {
        for i in [0isize, 1, -1, 42, -42, MAX_BOXED_INT / 3, MIN_BOXED_INT / 3] {
            let b = Boxed::box_int(i);
            assert_eq!(b.to_bits(), ((i << 1) | 1) as usize);
            assert!(b.is_value());
            assert!(!b.is_ptr());
            assert_eq!(b.unbox_int(), i);
        }
    }

    #[test]
    fn test_int_range_boundaries() {
        assert_eq!(Boxed::box_int(MAX_BOXED_INT).unbox_int(), MAX_BOXED_INT);
        assert_eq!(Boxed::box_int(MIN_BOXED_INT).unbox_int(), MIN_BOXED_INT);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside immediate range")]
    fn test_int_out_of_range_asserts() {
        let _ = Boxed::box_int(MAX_BOXED_INT + 1);
    }

    #[test]
    fn test_enum_and_bool() {
        assert_eq!(Boxed::box_enum(0).unbox_enum(), 0);
        assert_eq!(Boxed::box_enum(7).unbox_enum(), 7);
        assert_eq!(Boxed::box_enum(MAX_BOXED_UINT).unbox_enum(), MAX_BOXED_UINT);
        assert!(Boxed::box_bool(true).unbox_bool());
        assert!(!Boxed::box_bool(false).unbox_bool());
        assert_eq!(Boxed::box_bool(false), Boxed::ANY);
    }

    #[test]
    fn test_int16_and_char() {
        assert_eq!(Boxed::box_int16(i16::MIN).unbox_int16(), i16::MIN);
        assert_eq!(Boxed::box_int16(i16::MAX).unbox_int16(), i16::MAX);
        assert_eq!(Boxed::box_char('λ').unbox_char(), 'λ');
    }

    #[test]
    fn test_same_immediate_is_bit_identical() {
        assert!(Boxed::box_int(-5).eq_bits(Boxed::box_int(-5)));
        assert!(!Boxed::box_int(-5).eq_bits(Boxed::box_int(5)));
    }

    #[test]
    fn test_null_and_any() {
        assert!(Boxed::NULL.is_null());
        assert_eq!(Boxed::NULL.unbox_int(), -1);
        assert!(Boxed::ANY.is_any());
        assert_eq!(Boxed::ANY.unbox_int(), 0);
    }

    #[test]
    fn test_ptr_roundtrip() {
        let ctx = Context::new();
        let block = ctx.alloc_block(8, 0, Tag::Box);
        let b = Boxed::box_ptr(block);
        assert_eq!(b.to_bits(), block.as_ptr() as usize);
        assert!(b.is_ptr());
        assert!(b.is_non_null_ptr());
        assert!(!b.is_value());
        assert_eq!(b.unbox_ptr(), block);
        unsafe { b.drop_in(&ctx) };
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not 4-byte aligned")]
    fn test_misaligned_ptr_asserts() {
        let odd = NonNull::new(0x1001 as *mut Block).unwrap();
        let _ = Boxed::box_ptr(odd);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not 4-byte aligned")]
    fn test_two_byte_aligned_ptr_asserts() {
        let p = NonNull::new(0x1002 as *mut Block).unwrap();
        let _ = Boxed::box_ptr(p);
    }

    #[test]
    fn test_dup_and_drop_on_values_are_noops() {
        let ctx = Context::new();
        let b = Boxed::box_int(3);
        unsafe {
            let d = b.dup(&ctx);
            assert_eq!(d, b);
            d.drop_in(&ctx);
        }
        assert_eq!(ctx.stats().allocated, 0);
    }

    #[test]
    fn test_dup_and_drop_on_pointers() {
        let ctx = Context::new();
        let b = Boxed::box_ptr(ctx.alloc_block(8, 0, Tag::Box));
        unsafe {
            let d = b.dup(&ctx);
            assert_eq!(d.unbox_ptr().as_ref().refcount(), 2);
            d.drop_in(&ctx);
            assert_eq!(ctx.stats().live(), 1);
            b.drop_in(&ctx);
        }
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_view_roundtrip() {
        let ctx = Context::new();
        let v = Boxed::box_int(-17);
        assert_eq!(v.view(), BoxView::Value(-17));
        assert_eq!(Boxed::from_view(v.view(), &ctx), v);

        let block = ctx.alloc_block(8, 0, Tag::Box);
        let p = Boxed::box_ptr(block);
        assert_eq!(p.view(), BoxView::Ptr(block));
        assert_eq!(Boxed::from_view(p.view(), &ctx), p);
        unsafe { p.drop_in(&ctx) };
    }

    #[test]
    fn test_int32_roundtrip() {
        let ctx = Context::new();
        for i in [0, 1, -1, i32::MAX, i32::MIN, 1 << 30, -(1 << 30) - 1] {
            let b = box_int32(i, &ctx);
            assert_eq!(unsafe { unbox_int32(b, &ctx) }, i);
        }
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_int32_never_allocates_on_64_bit() {
        let ctx = Context::new();
        let b = box_int32(i32::MIN, &ctx);
        assert!(b.is_value());
        assert_eq!(ctx.stats().allocated, 0);
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn test_int32_outside_immediate_range_is_heap_boxed() {
        let ctx = Context::new();
        let b = box_int32(i32::MAX, &ctx);
        assert!(b.is_ptr());
        assert_eq!(ctx.stats().live(), 1);
        assert_eq!(unsafe { unbox_int32(b, &ctx) }, i32::MAX);

        let b = box_int32(MAX_BOXED_INT as i32, &ctx);
        assert!(b.is_value());
        assert_eq!(unsafe { unbox_int32(b, &ctx) }, MAX_BOXED_INT as i32);
        assert_eq!(ctx.stats().live(), 0);
    }
}
