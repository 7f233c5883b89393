//! C ABI
//!
//! Entry points for generated code. `Integer` and `Boxed` are
//! `#[repr(transparent)]` words, so they cross the boundary as `intptr_t`;
//! the context crosses as an opaque pointer created by
//! `tagword_context_new`.
//!
//! Integer arguments follow the ownership rules of `Integer`: they are
//! consumed unless the function says it borrows them.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::boxed::Boxed;
use crate::double::{box_double, unbox_double};
use crate::heap::Context;
use crate::integer::Integer;

/// Copy `s` into a caller buffer as a NUL-terminated string
///
/// Writes at most `cap - 1` bytes plus the NUL and returns `s.len()`, so a
/// caller can detect truncation. Interior NUL bytes become `?`.
///
/// # Safety
/// `buf` must be valid for writes of `cap` bytes (it may be null if `cap` is 0).
pub(crate) unsafe fn copy_to_c_buf(s: &str, buf: *mut c_char, cap: usize) -> usize {
    if cap > 0 && !buf.is_null() {
        let n = s.len().min(cap - 1);
        for (i, b) in s.bytes().take(n).enumerate() {
            let b = if b == 0 { b'?' } else { b };
            unsafe { *buf.add(i) = b as c_char };
        }
        unsafe { *buf.add(n) = 0 };
    }
    s.len()
}

// =============================================================================
// Context
// =============================================================================

/// Create a context; free it with `tagword_context_free`
#[unsafe(no_mangle)]
pub extern "C" fn tagword_context_new() -> *mut Context {
    Box::into_raw(Box::new(Context::new()))
}

/// # Safety
/// `ctx` must come from `tagword_context_new` and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_context_free(ctx: *mut Context) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// Blocks allocated through `ctx` and not yet freed
#[unsafe(no_mangle)]
pub extern "C" fn tagword_context_live_blocks(ctx: &Context) -> i64 {
    ctx.stats().live()
}

// =============================================================================
// Integer construction
// =============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn tagword_integer_from_i64(i: i64, ctx: &Context) -> Integer {
    Integer::from_i64(i, ctx)
}

#[unsafe(no_mangle)]
pub extern "C" fn tagword_integer_from_u64(u: u64, ctx: &Context) -> Integer {
    Integer::from_u64(u, ctx)
}

#[unsafe(no_mangle)]
pub extern "C" fn tagword_integer_from_double(d: f64, ctx: &Context) -> Integer {
    Integer::from_double(d, ctx)
}

/// Parse a decimal literal into `*out`
///
/// Returns false (leaving `*out` untouched) if the text is not a valid
/// integer or not UTF-8.
///
/// # Safety
/// `s` must be a NUL-terminated string and `out` valid for a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_parse(
    s: *const c_char,
    out: *mut Integer,
    ctx: &Context,
) -> bool {
    if s.is_null() || out.is_null() {
        return false;
    }
    let Ok(text) = unsafe { CStr::from_ptr(s) }.to_str() else {
        return false;
    };
    match Integer::parse(text, ctx) {
        Some(i) => {
            unsafe { out.write(i) };
            true
        }
        None => false,
    }
}

// =============================================================================
// Ownership
// =============================================================================

/// Duplicate an integer (borrows `x`)
///
/// # Safety
/// `x` must be a live integer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_dup(x: Integer, ctx: &Context) -> Integer {
    let d = x.dup(ctx);
    let _ = x.into_box();
    d
}

/// # Safety
/// `x` must be an integer owned by the caller.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_drop(x: Integer, ctx: &Context) {
    x.drop_in(ctx);
}

/// Whether `x` is a small int (borrows `x`)
#[unsafe(no_mangle)]
pub extern "C" fn tagword_integer_is_smallint(x: Boxed) -> bool {
    x.is_value_fast()
}

// =============================================================================
// Arithmetic
// =============================================================================

macro_rules! binary_ops {
    ($($name:ident => $method:ident),* $(,)?) => {$(
        /// # Safety
        /// `x` and `y` must be integers owned by the caller; both are consumed.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(x: Integer, y: Integer, ctx: &Context) -> Integer {
            x.$method(y, ctx)
        }
    )*};
}

binary_ops! {
    tagword_integer_add => add,
    tagword_integer_sub => sub,
    tagword_integer_mul => mul,
    tagword_integer_div => div,
    tagword_integer_mod => modulo,
    tagword_integer_pow => pow,
    tagword_integer_max => max,
    tagword_integer_min => min,
}

/// # Safety
/// `x` must be an integer owned by the caller; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_neg(x: Integer, ctx: &Context) -> Integer {
    x.neg(ctx)
}

/// # Safety
/// `x` must be an integer owned by the caller; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_abs(x: Integer, ctx: &Context) -> Integer {
    x.abs(ctx)
}

/// Truncating division with remainder; the remainder goes to `*rem`
///
/// # Safety
/// `x` and `y` must be integers owned by the caller; `rem` must be valid for
/// a write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_div_mod(
    x: Integer,
    y: Integer,
    rem: *mut Integer,
    ctx: &Context,
) -> Integer {
    let (q, r) = x.div_mod(y, ctx);
    unsafe { rem.write(r) };
    q
}

// =============================================================================
// Comparison and conversion
// =============================================================================

/// -1, 0 or 1
///
/// # Safety
/// `x` and `y` must be integers owned by the caller; both are consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_cmp(x: Integer, y: Integer, ctx: &Context) -> i32 {
    x.cmp(y, ctx) as i32
}

/// # Safety
/// `x` must be an integer owned by the caller; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_clamp64(x: Integer, ctx: &Context) -> i64 {
    x.clamp64(ctx)
}

/// # Safety
/// `x` must be an integer owned by the caller; it is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_as_double(x: Integer, ctx: &Context) -> f64 {
    x.as_double(ctx)
}

/// Write `x` in decimal to `buf` (borrows `x`)
///
/// Returns the full length of the decimal text; a result `>= cap` means the
/// output was truncated.
///
/// # Safety
/// `x` must be a live integer; `buf` must be valid for writes of `cap` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_integer_to_chars(
    x: Integer,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    let text = x.to_string();
    let _ = x.into_box();
    unsafe { copy_to_c_buf(&text, buf, cap) }
}

// =============================================================================
// Doubles
// =============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn tagword_box_double(d: f64, ctx: &Context) -> Boxed {
    box_double(d, ctx)
}

/// # Safety
/// `b` must come from `tagword_box_double` and is consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_unbox_double(b: Boxed, ctx: &Context) -> f64 {
    unsafe { unbox_double(b, ctx) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    struct OwnedContext(*mut Context);

    impl OwnedContext {
        fn new() -> Self {
            OwnedContext(tagword_context_new())
        }

        fn get(&self) -> &Context {
            unsafe { &*self.0 }
        }
    }

    impl Drop for OwnedContext {
        fn drop(&mut self) {
            unsafe { tagword_context_free(self.0) };
        }
    }

    fn render(x: &Integer) -> String {
        let mut buf = [0 as c_char; 64];
        let word = Integer::as_box(x);
        let borrowed = unsafe { Integer::from_box(word) };
        let len = unsafe { tagword_integer_to_chars(borrowed, buf.as_mut_ptr(), buf.len()) };
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap().to_owned();
        assert_eq!(len, text.len());
        text
    }

    fn parse(s: &str, ctx: &Context) -> Integer {
        let c = CString::new(s).unwrap();
        let mut out = Integer::zero();
        assert!(unsafe { tagword_integer_parse(c.as_ptr(), &mut out, ctx) });
        out
    }

    #[test]
    fn test_arithmetic_through_c_abi() {
        let owned = OwnedContext::new();
        let ctx = owned.get();
        unsafe {
            let x = tagword_integer_from_i64(i64::MAX, ctx);
            let y = tagword_integer_from_i64(1, ctx);
            let z = tagword_integer_add(x, y, ctx);
            assert_eq!(render(&z), "9223372036854775808");

            let back = tagword_integer_sub(z, tagword_integer_from_i64(1, ctx), ctx);
            assert_eq!(tagword_integer_clamp64(back, ctx), i64::MAX);

            let q = tagword_integer_div(
                tagword_integer_from_i64(-7, ctx),
                tagword_integer_from_i64(2, ctx),
                ctx,
            );
            assert_eq!(tagword_integer_clamp64(q, ctx), -3);
        }
        assert_eq!(tagword_context_live_blocks(ctx), 0);
    }

    #[test]
    fn test_parse_and_compare() {
        let owned = OwnedContext::new();
        let ctx = owned.get();
        let a = parse("123_456_789_012_345_678_901", ctx);
        let b = parse("-5", ctx);
        unsafe {
            let a2 = tagword_integer_dup(Integer::from_box(a.as_box()), ctx);
            assert_eq!(tagword_integer_cmp(a2, b, ctx), 1);
            assert_eq!(render(&a), "123456789012345678901");
            tagword_integer_drop(a, ctx);

            let c = CString::new("12x").unwrap();
            let mut out = Integer::zero();
            assert!(!tagword_integer_parse(c.as_ptr(), &mut out, ctx));
            assert!(tagword_integer_is_smallint(out.into_box()));
        }
        assert_eq!(tagword_context_live_blocks(ctx), 0);
    }

    #[test]
    fn test_div_mod_through_c_abi() {
        let owned = OwnedContext::new();
        let ctx = owned.get();
        unsafe {
            let mut rem = Integer::zero();
            let q = tagword_integer_div_mod(
                parse("100000000000000000007", ctx),
                tagword_integer_from_i64(10, ctx),
                &mut rem,
                ctx,
            );
            assert_eq!(render(&q), "10000000000000000000");
            assert_eq!(tagword_integer_clamp64(rem, ctx), 7);
            tagword_integer_drop(q, ctx);
        }
        assert_eq!(tagword_context_live_blocks(ctx), 0);
    }

    #[test]
    fn test_to_chars_truncates() {
        let mut buf = [0 as c_char; 4];
        let x = Integer::from_small(-1_234);
        let len = unsafe { tagword_integer_to_chars(x, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 5);
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap();
        assert_eq!(text, "-12");
    }

    #[test]
    fn test_doubles_through_c_abi() {
        let owned = OwnedContext::new();
        let ctx = owned.get();
        for d in [0.0, -0.0, 1.5, -1.5, f64::MAX, f64::MIN_POSITIVE, -1e300] {
            let b = tagword_box_double(d, ctx);
            let back = unsafe { tagword_unbox_double(b, ctx) };
            assert_eq!(back.to_bits(), d.to_bits());
        }
        assert_eq!(tagword_context_live_blocks(ctx), 0);
    }

    #[test]
    fn test_max_min_release_the_loser() {
        let owned = OwnedContext::new();
        let ctx = owned.get();
        unsafe {
            let m = tagword_integer_max(parse("1e30", ctx), parse("-1e30", ctx), ctx);
            assert_eq!(render(&m), format!("1{}", "0".repeat(30)));
            tagword_integer_drop(m, ctx);
            let m = tagword_integer_min(parse("1e30", ctx), tagword_integer_from_i64(3, ctx), ctx);
            assert_eq!(tagword_integer_clamp64(m, ctx), 3);
        }
        assert_eq!(tagword_context_live_blocks(ctx), 0);
    }

    #[test]
    fn test_free_null_context_is_noop() {
        unsafe { tagword_context_free(std::ptr::null_mut()) };
    }
}
