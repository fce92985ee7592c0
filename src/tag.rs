//! Boundary tags.
//!
//! Every block in the arena, free or allocated, is preceded by a boundary tag. The tag records
//! the size of the block's payload, whether it is allocated, and the payload size of the block
//! immediately to its left in memory. The latter is what makes it possible to find the left
//! neighbour in constant time when coalescing.

use core::mem;

/// The size of a boundary tag, in bytes.
pub const TAG_SIZE: usize = mem::size_of::<BoundaryTag>();

/// The granularity of block sizes.
///
/// All payload sizes are multiples of this, which frees the low bits of the size word for flags.
pub const GRANULARITY: usize = 8;

/// The "allocated" bit of the size word.
const ALLOCATED: usize = 1;

/// Round `size` up to the block granularity.
///
/// Returns `None` on overflow.
#[inline]
pub fn round_up(size: usize) -> Option<usize> {
    size.checked_add(GRANULARITY - 1).map(|x| x & !(GRANULARITY - 1))
}

/// An in-band block header.
///
/// The allocation flag is packed into the lowest bit of the size word; since sizes are always
/// multiples of `GRANULARITY` the bit is otherwise unused.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(C)]
pub struct BoundaryTag {
    /// The payload size, with the allocation flag in bit 0.
    size_and_alloc: usize,
    /// The payload size of the block to the left.
    left_size: usize,
}

impl BoundaryTag {
    /// Create a fence post.
    ///
    /// Fence posts are zero-sized, permanently allocated tags at both ends of a chunk.
    #[inline]
    pub const fn fence() -> BoundaryTag {
        BoundaryTag {
            size_and_alloc: ALLOCATED,
            left_size: 0,
        }
    }

    /// Get the payload size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size_and_alloc & !ALLOCATED
    }

    /// Set the payload size, leaving the allocation flag untouched.
    #[inline]
    pub fn set_size(&mut self, size: usize) {
        debug_assert!(size % GRANULARITY == 0, "Unaligned block size {}.", size);

        self.size_and_alloc = size | (self.size_and_alloc & ALLOCATED);
    }

    /// Is the block allocated?
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.size_and_alloc & ALLOCATED != 0
    }

    /// Set the allocation flag, leaving the size untouched.
    #[inline]
    pub fn set_allocated(&mut self, allocated: bool) {
        if allocated {
            self.size_and_alloc |= ALLOCATED;
        } else {
            self.size_and_alloc &= !ALLOCATED;
        }
    }

    /// Get the payload size of the left neighbour.
    #[inline]
    pub fn left_size(&self) -> usize {
        self.left_size
    }

    /// Set the payload size of the left neighbour.
    #[inline]
    pub fn set_left_size(&mut self, size: usize) {
        self.left_size = size;
    }

    /// Is this a fence post?
    #[inline]
    pub fn is_fence(&self) -> bool {
        self.size() == 0 && self.is_allocated()
    }
}
