//! Foreign Pointers and Value Types
//!
//! C data pointers box as an immediate when their address fits the immediate
//! range; otherwise they go into a `CPtrRaw` block together with a free
//! function that runs when the block is released. Function pointers always
//! get a `CFunPtr` block, since their alignment is not guaranteed.
//!
//! `box_value_type` covers small `Copy` structs: the value is copied into a
//! `Box` block whose first `scan_fsize` words are owned `Boxed` fields.

use std::ffi::c_void;
use std::mem::size_of;

use crate::boxed::Boxed;
use crate::config::MAX_BOXED_UINT;
use crate::heap::{Block, Context, HeapCell, Tag};

/// Release function for a foreign pointer
pub type FreeFun = unsafe extern "C" fn(*mut c_void);

/// A function pointer of unknown signature
pub type FunPtr = unsafe extern "C" fn();

/// Free function that does nothing
pub extern "C" fn free_fun_null(_p: *mut c_void) {}

/// Payload of a `CPtrRaw` block
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CPtrRaw {
    pub free: FreeFun,
    pub cptr: *mut c_void,
}

// =============================================================================
// Data pointers
// =============================================================================

/// Box `p` in a block that calls `free(p)` once the last reference goes
pub fn box_cptr_raw(free: FreeFun, p: *mut c_void, ctx: &Context) -> Boxed {
    let cell = ctx.alloc_cell(CPtrRaw { free, cptr: p }, 0, Tag::CPtrRaw);
    Boxed::box_ptr(cell.cast())
}

/// The pointer inside a `CPtrRaw` block, without releasing it
///
/// # Safety
/// `b` must be a live `CPtrRaw` block reference.
pub unsafe fn unbox_cptr_raw(b: Boxed) -> *mut c_void {
    let block = unsafe { b.unbox_block(Tag::CPtrRaw) };
    unsafe { HeapCell::<CPtrRaw>::from_block(block) }.value.cptr
}

/// Box a data pointer the runtime does not own
pub fn box_cptr(p: *mut c_void, ctx: &Context) -> Boxed {
    let addr = p as usize;
    if addr <= MAX_BOXED_UINT {
        Boxed::box_enum(addr)
    } else {
        box_cptr_raw(free_fun_null, p, ctx)
    }
}

/// Unbox a data pointer, releasing its block if it had one
///
/// The block's free function runs if this was the last reference. For a
/// `box_cptr` block that is `free_fun_null`, so the pointer stays valid.
/// A `box_cptr_raw` block with a real free function hands back a pointer
/// that has already been freed; borrow it with [`unbox_cptr_raw`] instead.
///
/// # Safety
/// `b` is consumed. It must come from `box_cptr`, or be a `box_cptr_raw`
/// block whose pointer is not used after this call.
pub unsafe fn unbox_cptr(b: Boxed, ctx: &Context) -> *mut c_void {
    if b.is_value() {
        b.unbox_enum() as *mut c_void
    } else {
        let p = unsafe { unbox_cptr_raw(b) };
        unsafe { b.drop_in(ctx) };
        p
    }
}

// =============================================================================
// Function pointers
// =============================================================================

pub fn box_fun_ptr(f: FunPtr, ctx: &Context) -> Boxed {
    let cell = ctx.alloc_cell(f, 0, Tag::CFunPtr);
    Boxed::box_ptr(cell.cast())
}

/// # Safety
/// `b` must come from `box_fun_ptr` and is consumed.
pub unsafe fn unbox_fun_ptr(b: Boxed, ctx: &Context) -> FunPtr {
    let block = unsafe { b.unbox_block(Tag::CFunPtr) };
    let f = unsafe { HeapCell::<FunPtr>::from_block(block) }.value;
    unsafe { ctx.drop_block(block) };
    f
}

// =============================================================================
// Value types
// =============================================================================

/// Box a `Copy` value of at most one word
///
/// The first `scan_fsize` words of `v` must be owned `Boxed` fields; the
/// block takes them over.
pub fn box_value_type<T: Copy>(v: T, scan_fsize: u16, ctx: &Context) -> Boxed {
    debug_assert!(
        size_of::<T>() <= size_of::<usize>(),
        "box_value_type: value of {} bytes is larger than a word",
        size_of::<T>()
    );
    let cell = ctx.alloc_cell(v, scan_fsize, Tag::Box);
    Boxed::box_ptr(cell.cast())
}

/// Copy a value type out of its block and release the block
///
/// Scanned fields are duplicated first, so the returned copy owns them.
///
/// # Safety
/// `b` must come from `box_value_type::<T>` and is consumed.
pub unsafe fn unbox_value_type<T: Copy>(b: Boxed, ctx: &Context) -> T {
    let block = unsafe { b.unbox_block(Tag::Box) };
    let v = unsafe { HeapCell::<T>::from_block(block) }.value;
    let scan = unsafe { block.as_ref() }.scan_fsize() as usize;
    let fields = unsafe { Block::payload(block) }.cast::<Boxed>();
    for i in 0..scan {
        let _ = unsafe { fields.add(i).read().dup(ctx) };
    }
    unsafe { ctx.drop_block(block) };
    v
}
