//! C allocation symbols.
//!
//! With the `symbols` feature, the crate exports `malloc` and friends, so linking it into a
//! program replaces the libc allocator. Failures return null and set `errno` to `ENOMEM`.

use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::fail::Result;
use crate::ptr::Pointer;
use crate::{allocator, sys};

/// Has the exit hook been registered?
static HOOKED: AtomicBool = AtomicBool::new(false);

/// Print the statistics at exit.
extern "C" fn exit_hook() {
    allocator::print_stats();
}

/// Register the exit hook, once.
///
/// This must be called before the arena is locked: `atexit` may allocate.
#[inline]
fn hook() {
    if !HOOKED.swap(true, Ordering::Relaxed) && sys::at_exit(exit_hook).is_err() {
        log!(WARNING, "Unable to register the exit hook.");
    }
}

/// Convert a result to a C pointer, setting `errno` on failure.
#[inline]
fn to_c(res: Result<Pointer<u8>>) -> *mut u8 {
    match res {
        Ok(ptr) => ptr.get(),
        Err(err) => {
            log!(WARNING, "Allocation failed: {}.", err);
            sys::set_enomem();

            ptr::null_mut()
        }
    }
}

/// C allocation symbol.
#[no_mangle]
pub extern "C" fn malloc(size: usize) -> *mut u8 {
    hook();
    to_c(allocator::alloc(size))
}

/// C deallocation symbol.
#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut u8) {
    hook();
    allocator::free(ptr);
}

/// C reallocation symbol.
#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut u8, size: usize) -> *mut u8 {
    hook();
    to_c(allocator::realloc(ptr, size))
}

/// C zeroed allocation symbol.
#[no_mangle]
pub extern "C" fn calloc(count: usize, size: usize) -> *mut u8 {
    hook();
    to_c(allocator::calloc(count, size))
}

/// Get the usable size of a buffer.
#[no_mangle]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut u8) -> usize {
    allocator::usable_size(ptr)
}
