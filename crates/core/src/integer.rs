//! Arbitrary-Precision Integers
//!
//! An `Integer` is always a single boxed word in one of two forms:
//!
//! - a pointer to a `BigInt` block (low bits `00`), or
//! - a small int `n`, stored as `4n + 1` (low bits `01`).
//!
//! Small ints are limited to `[SMALLINT_MIN, SMALLINT_MAX]` so that every
//! boxed small int fits in a half word. That lets the fast paths work on the
//! boxed words directly and detect overflow with a half-word check.
//!
//! Addition exploits the low bits. Adding two boxed words gives:
//!
//! ```text
//!  x + y = z
//! 00  00  00    ptr + ptr
//! 00  01  01    ptr + int
//! 01  00  01    int + ptr
//! 01  01  10    int + int
//! ```
//!
//! so bit 1 of the sum is set only if both operands were small ints. One add,
//! one overflow test, one bit test, then `z ^ 3` (`z - 1`) re-normalises
//! `4(n+m) + 2` to `4(n+m) + 1`. The other operations follow from the same
//! algebra:
//!
//! ```text
//! sub: (4n+1) - ((4m+1) ^ 1)          = 4(n-m) + 1
//! mul: ((4n+1) >> 1) * ((4m+1) >> 1)  = 4nm, then | 1
//! div: (2n / 2m) << 2 | 1             = 4(n/m) + 1
//! mod: (2n % 2m) << 1 | 1             = 4(n%m) + 1
//! ```
//!
//! Anything that overflows, or involves a big int, goes to the generic
//! routines in `bigint`, which always return canonical results: a value in
//! small-int range is never a `BigInt` block. Because of that, and because
//! `4n + 1` is monotonic, comparisons of two small ints compare words.
//!
//! ## Ownership
//!
//! `Integer` owns its word. Operations take their operands by value and
//! release any big int they do not return; use `dup` to keep a copy and
//! `drop_in` to release one. Small ints carry no reference, so both are free
//! for them.

use std::cmp::Ordering;
use std::fmt;

use crate::bigint;
use crate::boxed::Boxed;
use crate::config::{SMALLINT_MAX, SMALLINT_MIN};
use crate::heap::{Context, Tag};
use crate::overflow::{ActiveOverflow, OverflowStrategy};

/// An arbitrary-precision signed integer in one word
#[repr(transparent)]
#[must_use]
pub struct Integer(Boxed);

/// Boxed words of a few small ints
const ZERO_BITS: isize = 1;
const ONE_BITS: isize = 5;
const MINUS_ONE_BITS: isize = -3;
const SMALLINT_MIN_BITS: isize = SMALLINT_MIN * 4 + 1;

impl Integer {
    // =========================================================================
    // Construction
    // =========================================================================

    #[inline(always)]
    pub const fn zero() -> Self {
        Integer(Boxed::from_isize(ZERO_BITS))
    }

    #[inline(always)]
    pub const fn one() -> Self {
        Integer(Boxed::from_isize(ONE_BITS))
    }

    #[inline(always)]
    pub const fn minus_one() -> Self {
        Integer(Boxed::from_isize(MINUS_ONE_BITS))
    }

    /// A known small int
    #[inline(always)]
    pub fn from_small(i: isize) -> Self {
        debug_assert!(
            (SMALLINT_MIN..=SMALLINT_MAX).contains(&i),
            "from_small: {} outside small int range",
            i
        );
        Integer(Boxed::box_int(i << 1))
    }

    #[inline(always)]
    fn from_raw(i: isize) -> Self {
        Integer(Boxed::from_isize(i))
    }

    #[inline]
    pub fn from_int(i: isize, ctx: &Context) -> Self {
        if (SMALLINT_MIN..=SMALLINT_MAX).contains(&i) {
            Self::from_small(i)
        } else {
            bigint::from_big(i, ctx)
        }
    }

    #[inline]
    pub fn from_i32(i: i32, ctx: &Context) -> Self {
        Self::from_int(i as isize, ctx)
    }

    #[inline]
    pub fn from_i64(i: i64, ctx: &Context) -> Self {
        if (SMALLINT_MIN as i64..=SMALLINT_MAX as i64).contains(&i) {
            Self::from_small(i as isize)
        } else {
            bigint::from_big64(i, ctx)
        }
    }

    #[inline]
    pub fn from_u64(u: u64, ctx: &Context) -> Self {
        if u <= SMALLINT_MAX as u64 {
            Self::from_small(u as isize)
        } else {
            bigint::from_bigu64(u, ctx)
        }
    }

    #[inline]
    pub fn from_usize(u: usize, ctx: &Context) -> Self {
        Self::from_u64(u as u64, ctx)
    }

    /// Round to the nearest integer; NaN and infinities become 0
    #[inline]
    pub fn from_double(d: f64, ctx: &Context) -> Self {
        bigint::from_double(d, ctx)
    }

    /// Parse a decimal literal; `None` if malformed
    pub fn parse(s: &str, ctx: &Context) -> Option<Self> {
        bigint::parse(s, ctx)
    }

    // =========================================================================
    // Boxing and ownership
    // =========================================================================

    #[inline(always)]
    pub fn into_box(self) -> Boxed {
        self.0
    }

    /// Take ownership of a boxed integer
    ///
    /// # Safety
    /// The word must be a small int or an owned reference to a `BigInt` block.
    #[inline(always)]
    pub unsafe fn from_box(b: Boxed) -> Self {
        let i = Integer(b);
        debug_assert!(i.is_integer(), "from_box: not an integer");
        i
    }

    /// The word, without giving up ownership
    #[inline(always)]
    pub fn as_box(&self) -> Boxed {
        self.0
    }

    #[inline(always)]
    pub(crate) fn raw(&self) -> isize {
        self.0.as_isize()
    }

    #[inline]
    pub fn dup(&self, ctx: &Context) -> Self {
        // An Integer pointer word always refers to a live block it owns.
        Integer(unsafe { self.0.dup(ctx) })
    }

    #[inline]
    pub fn drop_in(self, ctx: &Context) {
        unsafe { self.0.drop_in(ctx) }
    }

    // =========================================================================
    // Representation
    // =========================================================================

    /// Either a small int in range, or a pointer to a `BigInt` block
    pub fn is_integer(&self) -> bool {
        if self.0.is_value() {
            (self.0.to_bits() & 0x03) == 0x01
                && (SMALLINT_MIN..=SMALLINT_MAX).contains(&(self.0.unbox_int() >> 1))
        } else {
            self.0.is_ptr() && unsafe { self.0.unbox_ptr().as_ref() }.tag() == Tag::BigInt
        }
    }

    #[inline(always)]
    pub fn is_smallint(&self) -> bool {
        self.0.is_value_fast()
    }

    #[inline(always)]
    pub fn is_bigint(&self) -> bool {
        self.0.is_ptr_fast()
    }

    /// Both small ints, in one test
    #[inline(always)]
    pub fn are_smallints(x: &Integer, y: &Integer) -> bool {
        debug_assert!(x.is_integer() && y.is_integer());
        (x.0.to_bits() & y.0.to_bits() & 1) != 0
    }

    /// The value of a known small int
    #[inline(always)]
    pub fn smallint(&self) -> isize {
        debug_assert!(
            self.0.is_value() && (self.0.to_bits() & 0x03) == 0x01,
            "smallint: not a small int"
        );
        self.0.unbox_int() >> 1
    }

    // =========================================================================
    // Addition and subtraction
    // =========================================================================

    /// Add two known small ints
    #[inline]
    pub fn add_small(self, y: Integer, ctx: &Context) -> Integer {
        debug_assert!(Self::are_smallints(&self, &y));
        let (z, ovf) = ActiveOverflow::add(self.raw(), y.raw() ^ 1);
        if !ovf {
            return Self::from_raw(z);
        }
        bigint::add_generic(self, y, ctx)
    }

    #[inline]
    pub fn add(self, y: Integer, ctx: &Context) -> Integer {
        debug_assert!(self.is_integer() && y.is_integer());
        let (z, ovf) = ActiveOverflow::add(self.raw(), y.raw());
        if !ovf && (z & 2) != 0 {
            return Self::from_raw(z ^ 3);
        }
        bigint::add_generic(self, y, ctx)
    }

    /// Subtract two known small ints
    #[inline]
    pub fn sub_small(self, y: Integer, ctx: &Context) -> Integer {
        debug_assert!(Self::are_smallints(&self, &y));
        let (z, ovf) = ActiveOverflow::sub(self.raw(), y.raw() ^ 1);
        if !ovf {
            return Self::from_raw(z);
        }
        bigint::sub_generic(self, y, ctx)
    }

    #[inline]
    pub fn sub(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) {
            return self.sub_small(y, ctx);
        }
        bigint::sub_generic(self, y, ctx)
    }

    #[inline]
    pub fn neg_small(self, ctx: &Context) -> Integer {
        debug_assert!(self.is_smallint());
        // -SMALLINT_MIN overflows and goes generic.
        Integer::zero().sub_small(self, ctx)
    }

    #[inline]
    pub fn neg(self, ctx: &Context) -> Integer {
        if self.is_smallint() {
            return self.neg_small(ctx);
        }
        bigint::neg_generic(self, ctx)
    }

    #[inline]
    pub fn inc(self, ctx: &Context) -> Integer {
        if self.is_smallint() {
            return self.add_small(Integer::one(), ctx);
        }
        bigint::add_generic(self, Integer::one(), ctx)
    }

    #[inline]
    pub fn dec(self, ctx: &Context) -> Integer {
        if self.is_smallint() {
            return self.sub_small(Integer::one(), ctx);
        }
        bigint::sub_generic(self, Integer::one(), ctx)
    }

    #[inline]
    pub fn abs(self, ctx: &Context) -> Integer {
        if self.is_smallint() {
            return if self.raw() < ZERO_BITS {
                self.neg_small(ctx)
            } else {
                self
            };
        }
        if bigint::signum_generic(self.dup(ctx), ctx) < 0 {
            bigint::neg_generic(self, ctx)
        } else {
            self
        }
    }

    // =========================================================================
    // Multiplication and division
    // =========================================================================

    /// Multiply two known small ints
    #[inline]
    pub fn mul_small(self, y: Integer, ctx: &Context) -> Integer {
        debug_assert!(Self::are_smallints(&self, &y));
        let i = self.raw() >> 1;
        let j = y.raw() >> 1;
        let (k, ovf) = ActiveOverflow::mul(i, j);
        if !ovf {
            return Self::from_raw(k | 1);
        }
        bigint::mul_generic(self, y, ctx)
    }

    #[inline]
    pub fn mul(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) {
            return self.mul_small(y, ctx);
        }
        bigint::mul_generic(self, y, ctx)
    }

    #[inline]
    pub fn sqr(self, ctx: &Context) -> Integer {
        if self.is_smallint() {
            let copy = Self::from_raw(self.raw());
            return self.mul_small(copy, ctx);
        }
        bigint::sqr_generic(self, ctx)
    }

    /// Whether a small-int division has a small-int quotient: the divisor is
    /// not zero, and it is not `SMALLINT_MIN / -1`
    #[inline(always)]
    fn small_quotient_fits(x: &Integer, y: &Integer) -> bool {
        y.raw() != ZERO_BITS && (x.raw() != SMALLINT_MIN_BITS || y.raw() != MINUS_ONE_BITS)
    }

    /// Truncating division of two known small ints
    #[inline]
    pub fn div_small(self, y: Integer) -> Integer {
        debug_assert!(Self::are_smallints(&self, &y));
        debug_assert!(Self::small_quotient_fits(&self, &y));
        let i = self.raw() >> 1;
        let j = y.raw() >> 1;
        Self::from_raw(((i / j) << 2) | 1)
    }

    /// Truncating remainder of two known small ints (sign follows `self`)
    #[inline]
    pub fn mod_small(self, y: Integer) -> Integer {
        debug_assert!(Self::are_smallints(&self, &y));
        debug_assert!(y.raw() != ZERO_BITS);
        let i = self.raw() >> 1;
        let j = y.raw() >> 1;
        Self::from_raw(((i % j) << 1) | 1)
    }

    #[inline]
    pub fn div_mod_small(self, y: Integer) -> (Integer, Integer) {
        debug_assert!(Self::are_smallints(&self, &y));
        debug_assert!(Self::small_quotient_fits(&self, &y));
        let i = self.raw() >> 1;
        let j = y.raw() >> 1;
        (
            Self::from_raw(((i / j) << 2) | 1),
            Self::from_raw(((i % j) << 1) | 1),
        )
    }

    #[inline]
    pub fn div(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) && Self::small_quotient_fits(&self, &y) {
            return self.div_small(y);
        }
        bigint::div_generic(self, y, ctx)
    }

    /// Truncating remainder
    #[inline]
    pub fn modulo(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) && y.raw() != ZERO_BITS {
            return self.mod_small(y);
        }
        bigint::mod_generic(self, y, ctx)
    }

    #[inline]
    pub fn div_mod(self, y: Integer, ctx: &Context) -> (Integer, Integer) {
        if Self::are_smallints(&self, &y) && Self::small_quotient_fits(&self, &y) {
            return self.div_mod_small(y);
        }
        bigint::div_mod_generic(self, y, ctx)
    }

    /// `self` raised to `p`
    #[inline]
    pub fn pow(self, p: Integer, ctx: &Context) -> Integer {
        bigint::pow(self, p, ctx)
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Saturating conversion to `i32`
    #[inline]
    pub fn clamp32(self, ctx: &Context) -> i32 {
        if self.is_smallint() {
            return self.smallint() as i32;
        }
        bigint::clamp32_generic(self, ctx)
    }

    /// Saturating conversion to `i64`
    #[inline]
    pub fn clamp64(self, ctx: &Context) -> i64 {
        if self.is_smallint() {
            return self.smallint() as i64;
        }
        bigint::clamp64_generic(self, ctx)
    }

    /// Saturating conversion to a native word
    #[inline]
    pub fn clamp(self, ctx: &Context) -> isize {
        if self.is_smallint() {
            return self.smallint();
        }
        #[cfg(target_pointer_width = "32")]
        {
            bigint::clamp32_generic(self, ctx) as isize
        }
        #[cfg(target_pointer_width = "64")]
        {
            bigint::clamp64_generic(self, ctx) as isize
        }
    }

    /// Nearest double
    #[inline]
    pub fn as_double(self, ctx: &Context) -> f64 {
        if self.is_smallint() {
            return self.smallint() as f64;
        }
        bigint::as_double_generic(self, ctx)
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    #[inline]
    pub fn cmp(self, y: Integer, ctx: &Context) -> Ordering {
        if Self::are_smallints(&self, &y) {
            return self.raw().cmp(&y.raw());
        }
        bigint::cmp_generic(self, y, ctx)
    }

    #[inline]
    pub fn lt(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() < y.raw();
        }
        self.cmp(y, ctx) == Ordering::Less
    }

    #[inline]
    pub fn lte(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() <= y.raw();
        }
        self.cmp(y, ctx) != Ordering::Greater
    }

    #[inline]
    pub fn gt(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() > y.raw();
        }
        self.cmp(y, ctx) == Ordering::Greater
    }

    #[inline]
    pub fn gte(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() >= y.raw();
        }
        self.cmp(y, ctx) != Ordering::Less
    }

    #[inline]
    pub fn eq(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() == y.raw();
        }
        self.cmp(y, ctx) == Ordering::Equal
    }

    #[inline]
    pub fn neq(self, y: Integer, ctx: &Context) -> bool {
        if Self::are_smallints(&self, &y) {
            return self.raw() != y.raw();
        }
        self.cmp(y, ctx) != Ordering::Equal
    }

    /// The larger operand; the other one is released
    #[inline]
    pub fn max(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) {
            return if self.raw() >= y.raw() { self } else { y };
        }
        if self.dup(ctx).gte(y.dup(ctx), ctx) {
            y.drop_in(ctx);
            self
        } else {
            self.drop_in(ctx);
            y
        }
    }

    /// The smaller operand; the other one is released
    #[inline]
    pub fn min(self, y: Integer, ctx: &Context) -> Integer {
        if Self::are_smallints(&self, &y) {
            return if self.raw() <= y.raw() { self } else { y };
        }
        if self.dup(ctx).lte(y.dup(ctx), ctx) {
            y.drop_in(ctx);
            self
        } else {
            self.drop_in(ctx);
            y
        }
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    // A big int is never 0, 1 or -1: those are small ints.

    #[inline]
    pub fn is_zero(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return self.raw() == ZERO_BITS;
        }
        self.drop_in(ctx);
        false
    }

    #[inline]
    pub fn is_one(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return self.raw() == ONE_BITS;
        }
        self.drop_in(ctx);
        false
    }

    #[inline]
    pub fn is_minus_one(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return self.raw() == MINUS_ONE_BITS;
        }
        self.drop_in(ctx);
        false
    }

    // Bit 2 of 4n+1 is bit 0 of n.
    #[inline]
    pub fn is_even(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return (self.raw() & 0x04) == 0;
        }
        bigint::is_even_generic(self, ctx)
    }

    #[inline]
    pub fn is_odd(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return (self.raw() & 0x04) != 0;
        }
        !bigint::is_even_generic(self, ctx)
    }

    /// -1, 0 or 1
    #[inline]
    pub fn signum(self, ctx: &Context) -> i32 {
        if self.is_smallint() {
            return (self.raw() > ZERO_BITS) as i32 - (self.raw() < 0) as i32;
        }
        bigint::signum_generic(self, ctx)
    }

    #[inline]
    pub fn is_neg(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return self.raw() < 0;
        }
        bigint::signum_generic(self, ctx) < 0
    }

    #[inline]
    pub fn is_pos(self, ctx: &Context) -> bool {
        if self.is_smallint() {
            return self.raw() > ZERO_BITS;
        }
        bigint::signum_generic(self, ctx) > 0
    }
}

impl fmt::Debug for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_smallint() {
            write!(f, "SmallInt({})", self.smallint())
        } else {
            write!(f, "BigInt({})", bigint::to_decimal_string(self))
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bigint::to_decimal_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(i: isize) -> Integer {
        Integer::from_small(i)
    }

    #[test]
    fn test_small_encoding() {
        for i in [0isize, 1, -1, 7, -7, SMALLINT_MAX, SMALLINT_MIN] {
            let x = small(i);
            assert_eq!(x.raw(), 4 * i + 1);
            assert_eq!(x.as_box().to_bits() & 0x03, 0x01);
            assert!(x.is_smallint());
            assert!(x.is_integer());
            assert_eq!(x.smallint(), i);
        }
        assert_eq!(Integer::zero().smallint(), 0);
        assert_eq!(Integer::one().smallint(), 1);
        assert_eq!(Integer::minus_one().smallint(), -1);
    }

    #[test]
    fn test_add_small_values() {
        let ctx = Context::new();
        let z = small(3).add(small(4), &ctx);
        assert_eq!(z.smallint(), 7);
        let z = small(-10).add(small(3), &ctx);
        assert_eq!(z.smallint(), -7);
        let z = small(5).add_small(small(-5), &ctx);
        assert_eq!(z.smallint(), 0);
        assert_eq!(ctx.stats().allocated, 0);
    }

    #[test]
    fn test_add_overflow_goes_generic() {
        let ctx = Context::new();
        let z = small(SMALLINT_MAX).add(small(1), &ctx);
        assert!(z.is_bigint());
        assert_eq!(z.to_string(), (SMALLINT_MAX as i64 + 1).to_string());
        z.drop_in(&ctx);

        let z = small(SMALLINT_MIN).add(small(-1), &ctx);
        assert!(z.is_bigint());
        assert_eq!(z.to_string(), (SMALLINT_MIN as i64 - 1).to_string());
        z.drop_in(&ctx);
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_add_at_edges_stays_small() {
        let ctx = Context::new();
        let z = small(SMALLINT_MAX - 1).add(small(1), &ctx);
        assert_eq!(z.smallint(), SMALLINT_MAX);
        let z = small(SMALLINT_MIN + 1).add(small(-1), &ctx);
        assert_eq!(z.smallint(), SMALLINT_MIN);
        assert_eq!(ctx.stats().allocated, 0);
    }

    #[test]
    fn test_sub() {
        let ctx = Context::new();
        assert_eq!(small(10).sub(small(3), &ctx).smallint(), 7);
        assert_eq!(small(3).sub(small(10), &ctx).smallint(), -7);
        let z = small(SMALLINT_MIN).sub(small(1), &ctx);
        assert!(z.is_bigint());
        z.drop_in(&ctx);
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_neg() {
        let ctx = Context::new();
        assert_eq!(small(5).neg(&ctx).smallint(), -5);
        assert_eq!(small(0).neg(&ctx).smallint(), 0);
        assert_eq!(small(SMALLINT_MAX).neg(&ctx).smallint(), -SMALLINT_MAX);

        let z = small(SMALLINT_MIN).neg(&ctx);
        assert!(z.is_bigint());
        assert_eq!(z.to_string(), (-(SMALLINT_MIN as i64)).to_string());
        z.drop_in(&ctx);
    }

    #[test]
    fn test_inc_dec() {
        let ctx = Context::new();
        assert_eq!(small(41).inc(&ctx).smallint(), 42);
        assert_eq!(small(-41).dec(&ctx).smallint(), -42);

        let z = small(SMALLINT_MAX).inc(&ctx);
        assert!(z.is_bigint());
        let back = z.dec(&ctx);
        assert!(back.is_smallint(), "result must be normalised back to a small int");
        assert_eq!(back.smallint(), SMALLINT_MAX);
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_mul() {
        let ctx = Context::new();
        assert_eq!(small(6).mul(small(7), &ctx).smallint(), 42);
        assert_eq!(small(-6).mul(small(7), &ctx).smallint(), -42);
        assert_eq!(small(-6).mul(small(-7), &ctx).smallint(), 42);
        assert_eq!(small(0).mul(small(SMALLINT_MIN), &ctx).smallint(), 0);

        let half = SMALLINT_MAX / 2 + 1;
        let z = small(half).mul(small(-half), &ctx);
        assert!(z.is_bigint());
        assert_eq!(z.to_string(), (-(half as i64) * half as i64).to_string());
        z.drop_in(&ctx);
    }

    #[test]
    fn test_sqr() {
        let ctx = Context::new();
        assert_eq!(small(-12).sqr(&ctx).smallint(), 144);
        let z = small(SMALLINT_MAX).sqr(&ctx);
        let m = SMALLINT_MAX as i128;
        assert_eq!(z.to_string(), (m * m).to_string());
        z.drop_in(&ctx);
    }

    #[test]
    fn test_div_mod_truncate() {
        let ctx = Context::new();
        let cases: [(isize, isize); 8] = [
            (7, 2),
            (-7, 2),
            (7, -2),
            (-7, -2),
            (0, 5),
            (SMALLINT_MAX, 3),
            (SMALLINT_MIN, 3),
            (SMALLINT_MIN, 1),
        ];
        for (n, m) in cases {
            assert_eq!(small(n).div(small(m), &ctx).smallint(), n / m, "{n} / {m}");
            assert_eq!(small(n).modulo(small(m), &ctx).smallint(), n % m, "{n} % {m}");
            let (q, r) = small(n).div_mod(small(m), &ctx);
            assert_eq!((q.smallint(), r.smallint()), (n / m, n % m));
        }
        assert_eq!(ctx.stats().allocated, 0);
    }

    #[test]
    fn test_div_overflow_goes_generic() {
        let ctx = Context::new();
        let q = small(SMALLINT_MIN).div(small(-1), &ctx);
        assert!(q.is_bigint());
        assert_eq!(q.to_string(), (-(SMALLINT_MIN as i64)).to_string());
        q.drop_in(&ctx);
        assert_eq!(small(SMALLINT_MIN).modulo(small(-1), &ctx).smallint(), 0);
    }

    #[test]
    fn test_div_by_zero_is_zero() {
        crate::error::clear_runtime_error();
        let ctx = Context::new();
        assert_eq!(small(5).div(Integer::zero(), &ctx).smallint(), 0);
        assert!(crate::error::take_runtime_error().is_some());
        assert_eq!(small(5).modulo(Integer::zero(), &ctx).smallint(), 0);
        assert!(crate::error::take_runtime_error().is_some());
    }

    #[test]
    fn test_abs() {
        let ctx = Context::new();
        assert_eq!(small(-9).abs(&ctx).smallint(), 9);
        assert_eq!(small(9).abs(&ctx).smallint(), 9);
        assert_eq!(small(0).abs(&ctx).smallint(), 0);
        let z = small(SMALLINT_MIN).abs(&ctx);
        assert!(z.is_bigint());
        z.drop_in(&ctx);
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_comparisons_on_small() {
        let ctx = Context::new();
        assert_eq!(small(1).cmp(small(2), &ctx), Ordering::Less);
        assert_eq!(small(2).cmp(small(2), &ctx), Ordering::Equal);
        assert_eq!(small(-1).cmp(small(-2), &ctx), Ordering::Greater);
        assert!(small(-3).lt(small(0), &ctx));
        assert!(small(0).lte(small(0), &ctx));
        assert!(small(4).gt(small(-4), &ctx));
        assert!(small(4).gte(small(4), &ctx));
        assert!(small(4).eq(small(4), &ctx));
        assert!(small(4).neq(small(5), &ctx));
    }

    #[test]
    fn test_predicates_on_small() {
        let ctx = Context::new();
        assert!(small(0).is_zero(&ctx));
        assert!(!small(1).is_zero(&ctx));
        assert!(small(1).is_one(&ctx));
        assert!(small(-1).is_minus_one(&ctx));
        assert!(small(-4).is_even(&ctx));
        assert!(small(-3).is_odd(&ctx));
        assert!(small(0).is_even(&ctx));
        assert_eq!(small(-8).signum(&ctx), -1);
        assert_eq!(small(0).signum(&ctx), 0);
        assert_eq!(small(8).signum(&ctx), 1);
        assert!(small(-1).is_neg(&ctx));
        assert!(!small(0).is_neg(&ctx));
        assert!(small(1).is_pos(&ctx));
        assert!(!small(0).is_pos(&ctx));
    }

    #[test]
    fn test_max_min_small() {
        let ctx = Context::new();
        assert_eq!(small(3).max(small(9), &ctx).smallint(), 9);
        assert_eq!(small(3).min(small(9), &ctx).smallint(), 3);
        assert_eq!(small(-3).max(small(-9), &ctx).smallint(), -3);
        assert_eq!(small(-3).min(small(-9), &ctx).smallint(), -9);
    }

    #[test]
    fn test_clamp_and_as_double() {
        let ctx = Context::new();
        assert_eq!(small(-77).clamp32(&ctx), -77);
        assert_eq!(small(SMALLINT_MAX).clamp64(&ctx), SMALLINT_MAX as i64);
        assert_eq!(small(SMALLINT_MIN).clamp(&ctx), SMALLINT_MIN);
        assert_eq!(small(-5).as_double(&ctx), -5.0);
    }

    #[test]
    fn test_from_int_chooses_representation() {
        let ctx = Context::new();
        assert!(Integer::from_int(SMALLINT_MAX, &ctx).is_smallint());
        assert!(Integer::from_int(SMALLINT_MIN, &ctx).is_smallint());

        let big = Integer::from_int(SMALLINT_MAX + 1, &ctx);
        assert!(big.is_bigint());
        assert!(big.is_integer());
        big.drop_in(&ctx);

        let big = Integer::from_u64(u64::MAX, &ctx);
        assert_eq!(big.to_string(), u64::MAX.to_string());
        big.drop_in(&ctx);

        let big = Integer::from_i64(i64::MIN, &ctx);
        assert_eq!(big.to_string(), i64::MIN.to_string());
        big.drop_in(&ctx);

        assert!(Integer::from_i32(-100, &ctx).is_smallint());
        assert!(Integer::from_usize(12, &ctx).is_smallint());
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_are_smallints_all_tag_combinations() {
        let ctx = Context::new();
        let big = || Integer::from_i64(i64::MAX, &ctx);
        let (p1, p2) = (big(), big());
        let (v1, v2) = (small(1), small(-1));

        assert!(!Integer::are_smallints(&p1, &p2));
        assert!(!Integer::are_smallints(&p1, &v1));
        assert!(!Integer::are_smallints(&v1, &p1));
        assert!(Integer::are_smallints(&v1, &v2));

        for (x, y) in [(&p1, &p2), (&p1, &v1), (&v1, &p1), (&v1, &v2)] {
            let by_tags = x.as_box().is_value() && y.as_box().is_value();
            assert_eq!(Integer::are_smallints(x, y), by_tags);
        }
        p1.drop_in(&ctx);
        p2.drop_in(&ctx);
        assert_eq!(ctx.stats().live(), 0);
    }

    #[test]
    fn test_debug_format() {
        let ctx = Context::new();
        assert_eq!(format!("{:?}", small(-3)), "SmallInt(-3)");
        let big = Integer::from_i64(1 << 40, &ctx);
        assert_eq!(format!("{:?}", big), "BigInt(1099511627776)");
        big.drop_in(&ctx);
    }
}
