//! Runtime Error Channel
//!
//! The encode/decode and fast-path operations never fail. The only domain
//! errors in this crate come from the generic integer fallback (division or
//! modulo by zero), which must still return a value. Those routines record a
//! message here and return zero; callers that care check afterwards:
//!
//! ```ignore
//! let q = x.div(Integer::zero(), &ctx);
//! if has_runtime_error() {
//!     let msg = take_runtime_error();
//!     // ...
//! }
//! ```

use std::cell::RefCell;
use std::os::raw::c_char;

use crate::ffi::copy_to_c_buf;

thread_local! {
    /// Last runtime error raised on this thread
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record a runtime error, replacing any pending one
pub fn set_runtime_error(msg: impl Into<String>) {
    let msg = msg.into();
    tracing::debug!(error = %msg, "runtime error");
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

/// Take (and clear) the pending runtime error
pub fn take_runtime_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Check if there's a pending runtime error
pub fn has_runtime_error() -> bool {
    LAST_ERROR.with(|e| e.borrow().is_some())
}

/// Clear any pending runtime error
pub fn clear_runtime_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Check if there's a pending runtime error (FFI-safe)
#[unsafe(no_mangle)]
pub extern "C" fn tagword_has_error() -> bool {
    has_runtime_error()
}

/// Take the pending error into a caller-owned buffer (FFI-safe)
///
/// Copies at most `cap - 1` bytes of the message followed by a NUL and
/// returns the full message length, or 0 if nothing was pending. Interior
/// NUL bytes are replaced with `?`.
///
/// # Safety
/// `buf` must be valid for writes of `cap` bytes (it may be null if `cap` is 0).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tagword_take_error(buf: *mut c_char, cap: usize) -> usize {
    match take_runtime_error() {
        Some(msg) => unsafe { copy_to_c_buf(&msg, buf, cap) },
        None => 0,
    }
}
