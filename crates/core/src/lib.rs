//! Tagword Core: single-word value boxing for a compiled functional runtime
//!
//! Every runtime value is one machine word. Heap references, immediates,
//! doubles and arbitrary-precision integers all share that word, and the
//! common integer operations run inline on it without allocating.
//!
//! Key design principles:
//! - Boxed: the word itself (pointer when bit 0 is clear, value when set)
//! - Integer: a small int `4n+1`, or a pointer to a `BigInt` block
//! - Context: the handle every allocation and release goes through
//!
//! # Modules
//!
//! - `config`: Compile-time layout constants for the target and features
//! - `heap`: Reference-counted blocks with recursive release
//! - `boxed`: Pointer and immediate encodings, `BoxView`
//! - `double`: Double encoding strategies (heap-negative, NaN-box, heap-only)
//! - `overflow`: Half-word overflow detection strategies
//! - `integer`: Small-int fast paths
//! - `bigint`: Arbitrary-precision fallback on `num-bigint`
//! - `cptr`: Foreign pointers, function pointers and value types
//! - `error`: Thread-local error handling for FFI safety
//! - `ffi`: C ABI for generated code

pub mod bigint;
pub mod boxed;
pub mod config;
pub mod cptr;
pub mod double;
pub mod error;
pub mod ffi;
pub mod heap;
pub mod integer;
pub mod overflow;

// Re-export key types and functions
pub use boxed::{BoxView, Boxed, box_int32, unbox_int32};
pub use config::{BoxLayout, LAYOUT, SMALLINT_MAX, SMALLINT_MIN};
pub use double::{ActiveDouble, DoubleEncoding, DoubleKind, box_double, unbox_double};
pub use heap::{Block, Context, HeapStats, Tag};
pub use integer::Integer;
pub use overflow::{ActiveOverflow, OverflowKind, OverflowStrategy};

// Foreign pointers
pub use cptr::{
    CPtrRaw, FreeFun, FunPtr, box_cptr, box_cptr_raw, box_fun_ptr, box_value_type, free_fun_null,
    unbox_cptr, unbox_cptr_raw, unbox_fun_ptr, unbox_value_type,
};

// Error handling
pub use error::{
    clear_runtime_error, has_runtime_error, set_runtime_error, take_runtime_error,
    tagword_has_error as has_error, tagword_take_error as take_error,
};
