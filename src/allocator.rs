//! The global allocator.
//!
//! This contains primitives for the cross-thread allocator: one arena, backed by the program
//! break, behind one lock.

use core::alloc::{GlobalAlloc, Layout};
use core::{cmp, ptr};

use crate::arena::Arena;
use crate::brk::Brk;
use crate::fail::Result;
use crate::ptr::Pointer;
use crate::stats::Stats;
use crate::sync::{Mutex, MutexGuard};
use crate::tag::GRANULARITY;
use crate::write;

/// The global arena.
///
/// It lives in a static, so it never moves.
static ARENA: Mutex<Arena<Brk>> = Mutex::new(Arena::new(Brk));

/// Lock the global arena.
///
/// Any other allocation from this allocator (on any thread) blocks until the guard is dropped, so
/// do not allocate from the system allocator while holding it.
pub fn lock() -> MutexGuard<'static, Arena<Brk>> {
    ARENA.lock()
}

/// Allocate a block of memory.
pub fn alloc(size: usize) -> Result<Pointer<u8>> {
    lock().alloc(size)
}

/// Free a block of memory.
///
/// Freeing null is a no-op.
///
/// # Safety
///
/// `ptr` must be null, or a live pointer returned by this allocator.
pub unsafe fn free(ptr: *mut u8) {
    lock().free(ptr);
}

/// Reallocate memory.
///
/// Reallocate the buffer starting at `ptr` to a buffer of `size` bytes, copying the contents. If
/// this fails, the old buffer is still valid.
///
/// # Safety
///
/// `ptr` must be null, or a live pointer returned by this allocator.
pub unsafe fn realloc(ptr: *mut u8, size: usize) -> Result<Pointer<u8>> {
    lock().realloc(ptr, size)
}

/// Allocate `count` zeroed elements of `size` bytes.
pub fn calloc(count: usize, size: usize) -> Result<Pointer<u8>> {
    lock().calloc(count, size)
}

/// Get the number of usable bytes of a buffer.
///
/// # Safety
///
/// `ptr` must be null, or a live pointer returned by this allocator.
pub unsafe fn usable_size(ptr: *mut u8) -> usize {
    lock().usable_size(ptr)
}

/// Get the statistics of the global arena.
pub fn stats() -> Stats {
    lock().stats()
}

/// Print the statistics block to standard output.
pub fn print_stats() {
    let stats = stats();
    write::report(format_args!("{}", stats));
}

/// Print the free list to standard output.
pub fn print_free_list() {
    let arena = lock();
    write::report(format_args!("{}\n", arena.dump()));
}

/// The global allocator.
///
/// Install it with `#[global_allocator]`. Layouts aligned to more than 8 bytes are served by
/// allocating `size + align` bytes and stashing the address of the real block in the word right
/// before the aligned pointer.
#[derive(Clone, Copy, Default, Debug)]
pub struct Allocator;

/// The word size.
const WORD: usize = core::mem::size_of::<usize>();

impl Allocator {
    /// Allocate for a layout aligned to more than the arena guarantees.
    unsafe fn alloc_aligned(&self, layout: Layout) -> *mut u8 {
        let size = match layout.size().checked_add(layout.align()) {
            Some(size) => size,
            None => return ptr::null_mut(),
        };

        match lock().alloc(size) {
            Ok(raw) => {
                // Leave room for at least the stash word.
                let aligned = (raw.addr() + WORD + layout.align() - 1) & !(layout.align() - 1);
                let res = raw.get().add(aligned - raw.addr());
                ptr::write((res as *mut usize).sub(1), raw.addr());

                res
            }
            Err(_) => ptr::null_mut(),
        }
    }

    /// Get the real block of an over-aligned allocation.
    unsafe fn unstash(ptr: *mut u8) -> *mut u8 {
        let raw = ptr::read((ptr as *mut usize).sub(1));
        ptr.sub(ptr as usize - raw)
    }
}

unsafe impl GlobalAlloc for Allocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= GRANULARITY {
            lock()
                .alloc(cmp::max(layout.size(), 1))
                .map_or(ptr::null_mut(), |ptr| ptr.get())
        } else {
            self.alloc_aligned(layout)
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.align() <= GRANULARITY {
            lock().free(ptr);
        } else {
            lock().free(Allocator::unstash(ptr));
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= GRANULARITY {
            lock()
                .calloc(1, cmp::max(layout.size(), 1))
                .map_or(ptr::null_mut(), |ptr| ptr.get())
        } else {
            let ptr = self.alloc_aligned(layout);
            if !ptr.is_null() {
                ptr::write_bytes(ptr, 0, layout.size());
            }

            ptr
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() <= GRANULARITY {
            lock()
                .realloc(ptr, cmp::max(new_size, 1))
                .map_or(ptr::null_mut(), |ptr| ptr.get())
        } else {
            let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
            let new = self.alloc_aligned(new_layout);
            if !new.is_null() {
                ptr::copy_nonoverlapping(ptr, new, cmp::min(layout.size(), new_size));
                self.dealloc(ptr, layout);
            }

            new
        }
    }
}
