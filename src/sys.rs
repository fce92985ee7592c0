//! System primitives.
//!
//! Thin, safe(r) wrappers around the shim. Nothing else in the crate talks to the shim's syscall
//! module directly.

use tagalloc_shim::syscalls;

/// Increment data segment of this process by some, _n_, return a pointer to the new data segment
/// start.
///
/// This uses the system call BRK as backend. Callers must hold the BRK lock (see `brk::lock`).
///
/// # Safety
///
/// This is safe unless you have negative or overflowing `n`.
#[inline]
pub unsafe fn sbrk(n: isize) -> Result<*mut u8, ()> {
    let brk = syscalls::sbrk(n);
    if brk as usize == !0 {
        Err(())
    } else {
        Ok(brk)
    }
}

/// Cooperatively gives up a timeslice to the OS scheduler.
#[inline]
pub fn yield_now() {
    // A failing `sched_yield` simply means we spin once more.
    let _ = syscalls::sched_yield();
}

/// Write text to standard output.
///
/// Used for the statistics and free-list reports, which are meant for the user rather than the
/// log.
pub fn print(s: &str) -> Result<(), ()> {
    let mut buf = s.as_bytes();

    while !buf.is_empty() {
        let res = syscalls::write(1, buf);
        if res <= 0 {
            return Err(());
        }
        buf = &buf[res as usize..];
    }

    Ok(())
}

/// Report an out-of-memory condition to C callers.
#[cfg(feature = "symbols")]
#[inline]
pub fn set_enomem() {
    syscalls::set_errno(syscalls::ENOMEM);
}

/// Register a function to run when the process exits.
#[cfg(feature = "symbols")]
#[inline]
pub fn at_exit(hook: extern "C" fn()) -> Result<(), ()> {
    syscalls::atexit(hook)
}
