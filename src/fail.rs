//! General error handling.
//!
//! Every failure of the allocator is, in the end, an out-of-memory condition: C callers see a
//! null pointer and `ENOMEM`. The variants only tell _why_ the memory could not be provided.

use core::fmt;

/// An allocation error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Error {
    /// A request for zero bytes.
    ZeroSized,
    /// A request (of the given number of bytes) which does not fit in a single chunk.
    TooLarge(usize),
    /// The byte count of a zeroed allocation overflowed.
    Overflow,
    /// The memory source refused to provide another chunk.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ZeroSized => write!(f, "zero-sized allocation"),
            Error::TooLarge(size) => write!(f, "allocation of {} bytes exceeds the chunk size", size),
            Error::Overflow => write!(f, "allocation size overflows"),
            Error::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// A specialized `Result` for allocator operations.
pub type Result<T> = core::result::Result<T, Error>;
