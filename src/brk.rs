//! BRK abstractions.
//!
//! This module provides safe abstractions over BRK, and the program break memory source used by
//! the global arena.

use crate::chunk::Source;
use crate::ptr::Pointer;
use crate::tag::TAG_SIZE;
use crate::{sync, sys};

/// The BRK mutex.
///
/// This is used for avoiding data races in multiple allocator.
static BRK_MUTEX: sync::Mutex<()> = sync::Mutex::new(());

/// A BRK lock.
///
/// The break is not cached: libc (or anything else in the process) may move it behind our back,
/// so it is always asked for.
pub struct BrkLock {
    /// The inner lock.
    #[cfg(not(feature = "unsafe_no_brk_lock"))]
    _guard: sync::MutexGuard<'static, ()>,
}

impl BrkLock {
    /// Extend the program break, and return the old one.
    ///
    /// # Safety
    ///
    /// Due to being able shrink the program break, this method is unsafe.
    pub unsafe fn sbrk(&mut self, size: isize) -> Result<Pointer<u8>, ()> {
        log!(NOTE, "Incrementing the program break by {} bytes.", size);

        let old_brk = sys::sbrk(size)?;
        Pointer::from_raw(old_brk).ok_or(())
    }

    /// Get the current program break.
    pub fn current_brk(&mut self) -> Result<Pointer<u8>, ()> {
        unsafe { self.sbrk(0) }
    }

    /// Extend the program break by `size` bytes, aligned to the boundary tag alignment.
    ///
    /// If the break is unaligned, the padding needed to align it is requested as well and simply
    /// wasted. The returned pointer is the start of `size` fresh, aligned bytes.
    pub fn extend(&mut self, size: usize) -> Result<Pointer<u8>, ()> {
        let cur = self.current_brk()?.addr();
        let pad = cur.wrapping_neg() % TAG_SIZE;
        let total = size.checked_add(pad).ok_or(())?;
        if total > isize::MAX as usize {
            return Err(());
        }

        // Nothing is ever released, so growing cannot invalidate memory in use.
        let start = unsafe { self.sbrk(total as isize)? };

        // The break might have been moved in between (by libc, which does not take our lock),
        // in which case our padding may no longer be the right amount.
        let aligned = start.addr() + start.addr().wrapping_neg() % TAG_SIZE;
        if aligned + size > start.addr() + total {
            log!(WARNING, "The program break moved while extending it; wasted {} bytes.", total);
            return Err(());
        }

        unsafe { Ok(start.offset((aligned - start.addr()) as isize)) }
    }
}

/// Lock the BRK lock to allow manipulating the program break.
pub fn lock() -> BrkLock {
    BrkLock {
        #[cfg(not(feature = "unsafe_no_brk_lock"))]
        _guard: BRK_MUTEX.lock(),
    }
}

/// `SBRK` symbol which can coexist with the allocator.
///
/// `SBRK`-ing directly (from the `BRK` syscall or libc) might race with the allocator growing the
/// heap. This function takes the same lock as the allocator does.
///
/// With the exception of being able to coexist, it follows the same rules. Refer to the relevant
/// documentation.
///
/// # Failure
///
/// On failure the maximum pointer (`!0 as *mut u8`) is returned.
///
/// # Safety
///
/// Shrinking the break must not release memory which is still in use, in particular no memory
/// handed out by the allocator.
pub unsafe fn sbrk(size: isize) -> *mut u8 {
    lock().sbrk(size).map_or(!0 as *mut u8, |brk| brk.get())
}

/// The program break memory source.
///
/// This is the source of the global arena. Every chunk is a fresh extension of the data segment.
#[derive(Clone, Copy, Default, Debug)]
pub struct Brk;

unsafe impl Source for Brk {
    fn grow(&mut self, size: usize) -> Result<Pointer<u8>, ()> {
        lock().extend(size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_brk_grow_up() {
        unsafe {
            let brk1 = lock().sbrk(5).unwrap();
            let brk2 = lock().sbrk(100).unwrap();

            assert!(brk1.get() < brk2.get());
        }
    }

    #[test]
    fn test_extend_aligned() {
        let mut brk = lock();

        // Misalign the break on purpose.
        unsafe {
            brk.sbrk(3).unwrap();
        }

        let a = brk.extend(64).unwrap();
        let b = brk.extend(64).unwrap();
        assert!(a.aligned_to(TAG_SIZE));
        assert!(b.aligned_to(TAG_SIZE));
        assert!(b.addr() >= a.addr() + 64);
    }

    #[test]
    fn test_oom() {
        assert!(Brk.grow(usize::MAX / 4).is_err());
    }
}
