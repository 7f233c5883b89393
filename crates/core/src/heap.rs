//! Reference-Counted Block Heap
//!
//! Every heap value a `Boxed` word can point at is a *block*: a 16-byte
//! header followed by its payload.
//!
//! ```text
//! ┌──────────┬──────────┬────────┬────────────┬─────────────────────────┐
//! │ rc (u32) │ size(u32)│ tag    │ scan_fsize │ payload ...             │
//! │          │          │ (u16)  │ (u16)      │ [scan fields][raw data] │
//! └──────────┴──────────┴────────┴────────────┴─────────────────────────┘
//!  ^ 16-byte aligned, so the low bits of a block address are always 0
//! ```
//!
//! The first `scan_fsize` payload words are `Boxed` fields owned by the
//! block. When the count of a block drops to zero those fields are released
//! too, iteratively, so freeing a long chain never recurses on the native
//! stack.
//!
//! Reference counts are atomic so a block can be shared between threads once
//! each holder has its own duplicate. The `Context` that performs an
//! allocation or a release records it in its `HeapStats`; the context itself
//! is single-threaded.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering, fence};

use num_bigint::BigInt;
use tracing::trace;

use crate::boxed::Boxed;
use crate::cptr::CPtrRaw;

/// Block tags this crate allocates
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Arbitrary-precision integer outside the small-int range
    BigInt = 1,
    /// A double that could not be encoded in the word
    Double = 2,
    /// An `i32` outside the immediate range (32-bit targets)
    Int32 = 3,
    /// Generic value type of at most one word
    Box = 4,
    /// Foreign data pointer plus its free function
    CPtrRaw = 5,
    /// Foreign function pointer
    CFunPtr = 6,
}

/// Block header
#[repr(C, align(16))]
pub struct Block {
    rc: AtomicU32,
    size: u32,
    tag: Tag,
    scan_fsize: u16,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<Block>();
pub const BLOCK_ALIGN: usize = std::mem::align_of::<Block>();

const _: () = assert!(HEADER_SIZE == 16, "block header must be 16 bytes");
const _: () = assert!(BLOCK_ALIGN >= 4, "block addresses need two zero low bits");

impl Block {
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Number of leading payload words that hold owned `Boxed` fields
    #[inline]
    pub fn scan_fsize(&self) -> u16 {
        self.scan_fsize
    }

    /// Current reference count (1 = unique)
    #[inline]
    pub fn refcount(&self) -> u32 {
        self.rc.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.refcount() == 1
    }

    /// Total allocation size including the header
    #[inline]
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Pointer to the first payload byte
    ///
    /// # Safety
    /// The block must be live.
    #[inline]
    pub unsafe fn payload(block: NonNull<Block>) -> NonNull<u8> {
        unsafe { block.cast::<u8>().add(HEADER_SIZE) }
    }

    #[inline]
    unsafe fn scan_field(block: NonNull<Block>, i: usize) -> Boxed {
        unsafe { *Self::payload(block).cast::<Boxed>().as_ptr().add(i) }
    }
}

/// A block with a typed payload
///
/// `#[repr(C)]` with the 16-aligned header first puts `value` at offset
/// `HEADER_SIZE` for every payload with alignment up to `BLOCK_ALIGN`.
#[repr(C)]
pub struct HeapCell<T> {
    pub block: Block,
    pub value: T,
}

impl<T> HeapCell<T> {
    /// Reinterpret a block as a typed cell
    ///
    /// # Safety
    /// The block must have been allocated with `Context::alloc_cell::<T>`.
    #[inline]
    pub unsafe fn from_block<'a>(block: NonNull<Block>) -> &'a HeapCell<T> {
        unsafe { block.cast::<HeapCell<T>>().as_ref() }
    }
}

/// Allocation counters for one context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Blocks allocated through this context
    pub allocated: u64,
    /// Blocks freed through this context
    pub freed: u64,
    /// Bytes currently held by blocks this context allocated minus those it freed
    pub live_bytes: i64,
}

impl HeapStats {
    /// Blocks allocated but not yet freed
    pub fn live(&self) -> i64 {
        self.allocated as i64 - self.freed as i64
    }
}

/// The runtime context threaded through every operation that may allocate
#[derive(Debug, Default)]
pub struct Context {
    allocated: Cell<u64>,
    freed: Cell<u64>,
    live_bytes: Cell<i64>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the allocation counters
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            allocated: self.allocated.get(),
            freed: self.freed.get(),
            live_bytes: self.live_bytes.get(),
        }
    }

    /// Allocate a zeroed block with `payload_size` bytes after the header
    ///
    /// The block starts with a reference count of 1.
    pub fn alloc_block(&self, payload_size: usize, scan_fsize: u16, tag: Tag) -> NonNull<Block> {
        debug_assert!(
            scan_fsize as usize * std::mem::size_of::<Boxed>() <= payload_size,
            "alloc_block: {} scan fields do not fit a {} byte payload",
            scan_fsize,
            payload_size
        );
        let size = (HEADER_SIZE + payload_size).next_multiple_of(BLOCK_ALIGN);
        let layout = match Layout::from_size_align(size, BLOCK_ALIGN) {
            Ok(layout) if size <= u32::MAX as usize => layout,
            _ => panic!("alloc_block: block of {} bytes is too large", size),
        };
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(block) = NonNull::new(ptr.cast::<Block>()) else {
            handle_alloc_error(layout);
        };
        unsafe {
            block.as_ptr().write(Block {
                rc: AtomicU32::new(1),
                size: size as u32,
                tag,
                scan_fsize,
            });
        }
        self.allocated.set(self.allocated.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + size as i64);
        trace!(?tag, size, scan_fsize, "alloc block");
        block
    }

    /// Allocate a block holding `value`
    pub fn alloc_cell<T>(&self, value: T, scan_fsize: u16, tag: Tag) -> NonNull<HeapCell<T>> {
        debug_assert!(
            std::mem::align_of::<T>() <= BLOCK_ALIGN,
            "alloc_cell: payload alignment exceeds block alignment"
        );
        let block = self.alloc_block(std::mem::size_of::<T>(), scan_fsize, tag);
        let cell = block.cast::<HeapCell<T>>();
        unsafe { std::ptr::addr_of_mut!((*cell.as_ptr()).value).write(value) };
        cell
    }

    /// Take an additional reference to a block
    ///
    /// # Safety
    /// The block must be live.
    #[inline]
    pub unsafe fn dup_block(&self, block: NonNull<Block>) {
        let old = unsafe { block.as_ref() }.rc.fetch_add(1, Ordering::Relaxed);
        debug_assert!(old > 0, "dup_block: block already freed");
    }

    /// Release one reference, freeing the block (and its scanned fields) at zero
    ///
    /// # Safety
    /// The caller must own the reference being released.
    #[inline]
    pub unsafe fn drop_block(&self, block: NonNull<Block>) {
        if unsafe { release(block) } {
            unsafe { self.free_chain(block) };
        }
    }

    /// Free a block whose count reached zero, then everything it owned
    unsafe fn free_chain(&self, first: NonNull<Block>) {
        let mut pending = vec![first];
        while let Some(block) = pending.pop() {
            let header = unsafe { block.as_ref() };
            for i in 0..header.scan_fsize() as usize {
                let field = unsafe { Block::scan_field(block, i) };
                if field.is_ptr() {
                    let child = field.unbox_ptr();
                    if unsafe { release(child) } {
                        pending.push(child);
                    }
                }
            }
            unsafe { self.free_block(block) };
        }
    }

    unsafe fn free_block(&self, block: NonNull<Block>) {
        let (tag, size) = {
            let header = unsafe { block.as_ref() };
            (header.tag(), header.size())
        };
        let payload = unsafe { Block::payload(block) };
        match tag {
            Tag::BigInt => unsafe { std::ptr::drop_in_place(payload.cast::<BigInt>().as_ptr()) },
            Tag::CPtrRaw => unsafe {
                let raw = payload.cast::<CPtrRaw>().as_ref();
                (raw.free)(raw.cptr);
            },
            Tag::Double | Tag::Int32 | Tag::Box | Tag::CFunPtr => {}
        }
        trace!(?tag, size, "free block");
        let layout = unsafe { Layout::from_size_align_unchecked(size, BLOCK_ALIGN) };
        unsafe { dealloc(block.as_ptr().cast::<u8>(), layout) };
        self.freed.set(self.freed.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - size as i64);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let stats = self.stats();
        if stats.live() != 0 {
            tracing::debug!(
                live = stats.live(),
                live_bytes = stats.live_bytes,
                "context dropped with blocks outstanding"
            );
        }
    }
}

/// Decrement a count; true if this released the last reference
#[inline]
unsafe fn release(block: NonNull<Block>) -> bool {
    let old = unsafe { block.as_ref() }.rc.fetch_sub(1, Ordering::Release);
    debug_assert!(old > 0, "drop_block: block already freed");
    if old == 1 {
        fence(Ordering::Acquire);
        true
    } else {
        false
    }
}
