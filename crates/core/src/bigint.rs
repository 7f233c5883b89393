//! Generic Integer Fallback
//!
//! Arbitrary-precision routines behind the `Integer` fast paths. Big values
//! live in `BigInt`-tagged blocks holding a `num_bigint::BigInt`.
//!
//! Every routine here:
//! - consumes its `Integer` operands (releasing any blocks),
//! - accepts small ints in any operand position, and
//! - returns canonical results: a value in small-int range is always a small
//!   int, never a block.
//!
//! Division is truncating, matching the fast path. Division or modulo by zero
//! records a runtime error and yields 0.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::io::{self, Write};

use num_bigint::{BigInt, Sign};
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use tracing::{debug, trace};

use crate::boxed::Boxed;
use crate::config::{SMALLINT_MAX, SMALLINT_MIN};
use crate::error::set_runtime_error;
use crate::heap::{Context, HeapCell, Tag};
use crate::integer::Integer;

// =============================================================================
// Representation
// =============================================================================

/// Canonical integer for `n`: a small int when it fits, a block otherwise
fn normalize(n: BigInt, ctx: &Context) -> Integer {
    match n.to_isize() {
        Some(i) if (SMALLINT_MIN..=SMALLINT_MAX).contains(&i) => Integer::from_small(i),
        _ => {
            let cell = ctx.alloc_cell(n, 0, Tag::BigInt);
            // A fresh BigInt block is an owned integer reference.
            unsafe { Integer::from_box(Boxed::box_ptr(cell.cast())) }
        }
    }
}

/// Borrow the value of an integer as a `BigInt`
fn to_big(x: &Integer) -> Cow<'_, BigInt> {
    if x.is_smallint() {
        Cow::Owned(BigInt::from(x.smallint()))
    } else {
        // `x` owns a reference, so the block outlives the borrow.
        let block = unsafe { x.as_box().unbox_block(Tag::BigInt) };
        Cow::Borrowed(&unsafe { HeapCell::<BigInt>::from_block(block) }.value)
    }
}

/// Extract the value and release the operand
fn into_big(x: Integer, ctx: &Context) -> BigInt {
    let n = to_big(&x).into_owned();
    x.drop_in(ctx);
    n
}

fn unary(x: Integer, ctx: &Context, f: impl FnOnce(&BigInt) -> BigInt) -> Integer {
    let z = f(&*to_big(&x));
    x.drop_in(ctx);
    normalize(z, ctx)
}

fn binary(
    x: Integer,
    y: Integer,
    ctx: &Context,
    f: impl FnOnce(&BigInt, &BigInt) -> BigInt,
) -> Integer {
    let z = f(&*to_big(&x), &*to_big(&y));
    x.drop_in(ctx);
    y.drop_in(ctx);
    normalize(z, ctx)
}

fn is_zero_ref(x: &Integer) -> bool {
    x.is_smallint() && x.smallint() == 0
}

fn division_by_zero(op: &str, x: Integer, y: Integer, ctx: &Context) -> Integer {
    set_runtime_error(format!("{}: division by zero", op));
    x.drop_in(ctx);
    y.drop_in(ctx);
    Integer::zero()
}

// =============================================================================
// Construction
// =============================================================================

pub fn from_big(i: isize, ctx: &Context) -> Integer {
    normalize(BigInt::from(i), ctx)
}

pub fn from_big64(i: i64, ctx: &Context) -> Integer {
    normalize(BigInt::from(i), ctx)
}

pub fn from_bigu64(u: u64, ctx: &Context) -> Integer {
    normalize(BigInt::from(u), ctx)
}

/// Round half away from zero; NaN and infinities become 0
pub fn from_double(d: f64, ctx: &Context) -> Integer {
    if !d.is_finite() {
        return Integer::zero();
    }
    let r = d.round();
    if r >= SMALLINT_MIN as f64 && r <= SMALLINT_MAX as f64 {
        return Integer::from_small(r as isize);
    }
    normalize(BigInt::from_f64(r).unwrap_or_default(), ctx)
}

/// Largest decimal exponent `parse` accepts
pub const MAX_PARSE_EXPONENT: u32 = 100_000;

/// Parse a decimal integer
///
/// Accepts an optional sign, digits with optional `_` separators between
/// them, and an optional non-negative exponent (`1_000`, `-42`, `12e3`).
/// Anything else is `None`, including an exponent above
/// [`MAX_PARSE_EXPONENT`].
pub fn parse(s: &str, ctx: &Context) -> Option<Integer> {
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };

    let digits = parse_digits(mantissa)?;
    let mut n = BigInt::parse_bytes(digits.as_bytes(), 10)?;
    if let Some(exp) = exponent {
        let exp = parse_digits(exp.strip_prefix('+').unwrap_or(exp))?;
        let exp: u32 = exp.parse().ok()?;
        if exp > MAX_PARSE_EXPONENT {
            debug!(input = s, "parse: exponent too large");
            return None;
        }
        n *= BigInt::from(10u32).pow(exp);
    }
    if negative {
        n = -n;
    }
    trace!(input = s, "parsed integer");
    Some(normalize(n, ctx))
}

/// Digits with `_` allowed only between two digits
fn parse_digits(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !bytes[0].is_ascii_digit() || !bytes[bytes.len() - 1].is_ascii_digit() {
        return None;
    }
    let mut out = String::with_capacity(bytes.len());
    let mut prev_sep = false;
    for &b in bytes {
        match b {
            b'0'..=b'9' => {
                out.push(b as char);
                prev_sep = false;
            }
            b'_' if !prev_sep => prev_sep = true,
            _ => return None,
        }
    }
    Some(out)
}

// =============================================================================
// Conversion
// =============================================================================

pub fn clamp32_generic(x: Integer, ctx: &Context) -> i32 {
    let n = into_big(x, ctx);
    n.to_i32()
        .unwrap_or(if n.is_negative() { i32::MIN } else { i32::MAX })
}

pub fn clamp64_generic(x: Integer, ctx: &Context) -> i64 {
    let n = into_big(x, ctx);
    n.to_i64()
        .unwrap_or(if n.is_negative() { i64::MIN } else { i64::MAX })
}

pub fn as_double_generic(x: Integer, ctx: &Context) -> f64 {
    let d = {
        let n = to_big(&x);
        n.to_f64().unwrap_or(if n.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    };
    x.drop_in(ctx);
    d
}

// =============================================================================
// Arithmetic
// =============================================================================

pub fn add_generic(x: Integer, y: Integer, ctx: &Context) -> Integer {
    trace!("add_generic");
    binary(x, y, ctx, |a, b| a + b)
}

pub fn sub_generic(x: Integer, y: Integer, ctx: &Context) -> Integer {
    trace!("sub_generic");
    binary(x, y, ctx, |a, b| a - b)
}

pub fn mul_generic(x: Integer, y: Integer, ctx: &Context) -> Integer {
    trace!("mul_generic");
    binary(x, y, ctx, |a, b| a * b)
}

/// Truncating division
pub fn div_generic(x: Integer, y: Integer, ctx: &Context) -> Integer {
    trace!("div_generic");
    if is_zero_ref(&y) {
        return division_by_zero("div", x, y, ctx);
    }
    binary(x, y, ctx, |a, b| a / b)
}

/// Truncating remainder; the sign follows the dividend
pub fn mod_generic(x: Integer, y: Integer, ctx: &Context) -> Integer {
    trace!("mod_generic");
    if is_zero_ref(&y) {
        return division_by_zero("mod", x, y, ctx);
    }
    binary(x, y, ctx, |a, b| a % b)
}

pub fn div_mod_generic(x: Integer, y: Integer, ctx: &Context) -> (Integer, Integer) {
    trace!("div_mod_generic");
    if is_zero_ref(&y) {
        return (division_by_zero("div_mod", x, y, ctx), Integer::zero());
    }
    let (q, r) = {
        let (a, b) = (to_big(&x), to_big(&y));
        (&*a / &*b, &*a % &*b)
    };
    x.drop_in(ctx);
    y.drop_in(ctx);
    (normalize(q, ctx), normalize(r, ctx))
}

pub fn neg_generic(x: Integer, ctx: &Context) -> Integer {
    trace!("neg_generic");
    unary(x, ctx, |a| -a)
}

pub fn sqr_generic(x: Integer, ctx: &Context) -> Integer {
    trace!("sqr_generic");
    unary(x, ctx, |a| a * a)
}

/// `x` raised to `p`
///
/// A negative exponent truncates toward zero: `1` and `-1` keep their
/// magnitude, anything else becomes 0.
pub fn pow(x: Integer, p: Integer, ctx: &Context) -> Integer {
    trace!("pow");
    let exp = into_big(p, ctx);
    let base = into_big(x, ctx);

    if base.is_zero() || base.is_one() {
        return normalize(
            if exp.is_zero() || base.is_one() {
                BigInt::one()
            } else if exp.is_negative() {
                set_runtime_error("pow: zero to a negative power");
                BigInt::zero()
            } else {
                BigInt::zero()
            },
            ctx,
        );
    }
    let odd = exp.bit(0);
    if base == BigInt::from(-1) {
        return if odd {
            Integer::minus_one()
        } else {
            Integer::one()
        };
    }
    if exp.is_negative() {
        return Integer::zero();
    }
    match exp.to_u32() {
        Some(e) => normalize(base.pow(e), ctx),
        None => {
            set_runtime_error("pow: exponent too large");
            Integer::zero()
        }
    }
}

// =============================================================================
// Comparison and predicates
// =============================================================================

pub fn cmp_generic(x: Integer, y: Integer, ctx: &Context) -> Ordering {
    let ord = to_big(&x).cmp(&to_big(&y));
    x.drop_in(ctx);
    y.drop_in(ctx);
    ord
}

pub fn is_even_generic(x: Integer, ctx: &Context) -> bool {
    let even = !to_big(&x).bit(0);
    x.drop_in(ctx);
    even
}

pub fn signum_generic(x: Integer, ctx: &Context) -> i32 {
    let s = match to_big(&x).sign() {
        Sign::Minus => -1,
        Sign::NoSign => 0,
        Sign::Plus => 1,
    };
    x.drop_in(ctx);
    s
}

// =============================================================================
// Decimal digits
// =============================================================================

/// Number of trailing zero decimal digits (0 for 0)
pub fn ctz(x: Integer, ctx: &Context) -> Integer {
    let n = into_big(x, ctx);
    if n.is_zero() {
        return Integer::zero();
    }
    let digits = n.magnitude().to_str_radix(10);
    let count = digits.bytes().rev().take_while(|&b| b == b'0').count();
    Integer::from_usize(count, ctx)
}

/// Number of decimal digits of `|x|` (1 for 0)
pub fn count_digits(x: Integer, ctx: &Context) -> Integer {
    let n = into_big(x, ctx);
    let digits = n.magnitude().to_str_radix(10).len();
    Integer::from_usize(digits, ctx)
}

/// `x * 10^p`; a negative `p` divides instead
pub fn mul_pow10(x: Integer, p: Integer, ctx: &Context) -> Integer {
    let p = p.clamp64(ctx);
    if p < 0 {
        return div_pow10_by(x, p.unsigned_abs(), ctx);
    }
    mul_pow10_by(x, p as u64, ctx)
}

/// `x / 10^p`, truncating; a negative `p` multiplies instead
pub fn div_pow10(x: Integer, p: Integer, ctx: &Context) -> Integer {
    let p = p.clamp64(ctx);
    if p < 0 {
        return mul_pow10_by(x, p.unsigned_abs(), ctx);
    }
    div_pow10_by(x, p as u64, ctx)
}

fn mul_pow10_by(x: Integer, p: u64, ctx: &Context) -> Integer {
    if p == 0 || is_zero_ref(&x) {
        return x;
    }
    let Ok(p) = u32::try_from(p) else {
        set_runtime_error("mul_pow10: exponent too large");
        x.drop_in(ctx);
        return Integer::zero();
    };
    unary(x, ctx, |a| a * BigInt::from(10u32).pow(p))
}

fn div_pow10_by(x: Integer, p: u64, ctx: &Context) -> Integer {
    if p == 0 {
        return x;
    }
    let digits = count_digits(x.dup(ctx), ctx).clamp64(ctx) as u64;
    if p >= digits {
        x.drop_in(ctx);
        return Integer::zero();
    }
    // p < digits, so it fits a u32.
    unary(x, ctx, |a| a / BigInt::from(10u32).pow(p as u32))
}

// =============================================================================
// Printing
// =============================================================================

/// Decimal rendering without consuming `x`
pub fn to_decimal_string(x: &Integer) -> String {
    if x.is_smallint() {
        return x.smallint().to_string();
    }
    to_big(x).to_str_radix(10)
}

/// Write `x` in decimal and release it
pub fn fprint<W: Write>(out: &mut W, x: Integer, ctx: &Context) -> io::Result<()> {
    let s = to_decimal_string(&x);
    x.drop_in(ctx);
    out.write_all(s.as_bytes())
}

/// Print `x` to stdout and release it
pub fn print(x: Integer, ctx: &Context) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    fprint(&mut lock, x, ctx)
}
