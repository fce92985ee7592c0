//! System calls.

/// Move the program break by `n` bytes. See `man sbrk`.
///
/// On success, the old program break (the start of the new segment) is returned. On failure,
/// `!0` is returned, as the libc function does.
///
/// # Safety
///
/// Shrinking the break below memory that is still in use invalidates it.
pub unsafe fn sbrk(n: isize) -> *mut u8 {
    libc::sbrk(n as libc::intptr_t) as *mut u8
}

/// Voluntarily give a time slice to the scheduler.
pub fn sched_yield() -> i32 {
    unsafe { libc::sched_yield() }
}

/// Write a buffer to a file descriptor.
///
/// Returns the number of bytes written, or `-1` on failure.
pub fn write(fd: i32, buf: &[u8]) -> isize {
    unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) as isize }
}

/// Set the calling thread's `errno`.
pub fn set_errno(code: i32) {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe {
        *libc::__errno_location() = code;
    }
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    unsafe {
        *libc::__error() = code;
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    )))]
    let _ = code;
}

/// The "out of memory" error code.
pub const ENOMEM: i32 = libc::ENOMEM;

/// Register a function to be run at process exit. See `man atexit`.
///
/// Returns `Err(())` if the hook could not be registered.
pub fn atexit(hook: extern "C" fn()) -> Result<(), ()> {
    if unsafe { libc::atexit(hook) } == 0 {
        Ok(())
    } else {
        Err(())
    }
}
