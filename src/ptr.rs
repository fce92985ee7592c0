//! Pointer wrappers.

use core::ptr::NonNull;
use core::{cmp, fmt, marker};

/// A pointer wrapper type.
///
/// A wrapper around a raw non-null `*mut T` into arena memory. All the address arithmetic of the
/// allocator goes through this type, so offsets are always computed in bytes, never in units of
/// `T`.
pub struct Pointer<T> {
    /// The internal pointer.
    ptr: NonNull<T>,
    /// Associated phantom data.
    ///
    /// This indicates that we _own_ T.
    _phantom: marker::PhantomData<T>,
}

impl<T> Pointer<T> {
    /// Create a new `Pointer` from a raw pointer.
    ///
    /// # Safety
    ///
    /// This function is unsafe since a null pointer can cause UB, due to `Pointer` being
    /// non-nullable.
    #[inline]
    pub unsafe fn new(ptr: *mut T) -> Pointer<T> {
        // For the sake of nice debugging, make some assertions.
        debug_assert!(!ptr.is_null(), "Null pointer!");

        Pointer {
            ptr: NonNull::new_unchecked(ptr),
            _phantom: marker::PhantomData,
        }
    }

    /// Create a `Pointer` from a raw pointer, returning `None` if it is null.
    #[inline]
    pub fn from_raw(ptr: *mut T) -> Option<Pointer<T>> {
        NonNull::new(ptr).map(|ptr| Pointer {
            ptr,
            _phantom: marker::PhantomData,
        })
    }

    /// Cast this pointer into a pointer to another type.
    ///
    /// This will simply reinterpret the pointer, leaving the actual data unmodified.
    #[inline]
    pub fn cast<U>(self) -> Pointer<U> {
        Pointer {
            ptr: self.ptr.cast(),
            _phantom: marker::PhantomData,
        }
    }

    /// Offset this pointer by `diff` **bytes**.
    ///
    /// # Safety
    ///
    /// This is unsafe, due to OOB offsets being undefined behavior. Both the pointer and the result
    /// must be in (or one past) the same memory segment.
    #[inline]
    pub unsafe fn offset(self, diff: isize) -> Pointer<T> {
        Pointer::new((self.ptr.as_ptr() as *mut u8).offset(diff) as *mut T)
    }

    /// Get the inner raw pointer.
    #[inline]
    pub fn get(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The address of this pointer.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Is this pointer aligned to `align`?
    #[inline]
    pub fn aligned_to(&self, align: usize) -> bool {
        self.addr() % align == 0
    }
}

impl<T> Clone for Pointer<T> {
    #[inline]
    fn clone(&self) -> Pointer<T> {
        *self
    }
}

impl<T> Copy for Pointer<T> {}

impl<T> PartialEq for Pointer<T> {
    #[inline]
    fn eq(&self, other: &Pointer<T>) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Pointer<T> {}

impl<T> PartialOrd for Pointer<T> {
    #[inline]
    fn partial_cmp(&self, other: &Pointer<T>) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare the addresses.
impl<T> Ord for Pointer<T> {
    #[inline]
    fn cmp(&self, other: &Pointer<T>) -> cmp::Ordering {
        self.addr().cmp(&other.addr())
    }
}

unsafe impl<T: Send> Send for Pointer<T> {}
unsafe impl<T: Sync> Sync for Pointer<T> {}

impl<T> fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.addr())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pointer() {
        let mut x = [b'a', b'b'];

        unsafe {
            let ptr = Pointer::new(&mut x[0] as *mut u8);
            assert_eq!(*ptr.get(), b'a');
            assert_eq!(*ptr.cast::<[u8; 1]>().get(), [b'a']);
            assert_eq!(*ptr.offset(1).get(), b'b');
        }

        let mut y = [7u64, 9u64];

        unsafe {
            let ptr = Pointer::new(&mut y[0] as *mut u64);
            // Offsets are in bytes, not elements.
            assert_eq!(*ptr.offset(8).get(), 9);
            assert_eq!(ptr.offset(8).offset(-8), ptr);
            assert!(ptr.aligned_to(8));
        }
    }

    #[test]
    fn test_null() {
        assert!(Pointer::<u8>::from_raw(core::ptr::null_mut()).is_none());
    }
}
