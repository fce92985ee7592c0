//! Memory blocks.
//!
//! Blocks are the main unit of the memory bookkeeping. A `Block` is a handle to a boundary tag
//! living in arena memory; the block's payload follows the tag directly. All neighbour lookups
//! (the pointer arithmetic which makes boundary tags work) are confined to this module.
//!
//! ```text
//!    left             self                         right
//!   ...--+-----+-----------+-----+----------------+-----+--...
//!        | tag | left.size | tag |   self.size    | tag |
//!   ...--+-----+-----------+-----+----------------+-----+--...
//!                          ^     ^
//!                          |     payload()
//!                          self
//! ```

use core::{fmt, ptr};

use crate::ptr::Pointer;
use crate::tag::{BoundaryTag, TAG_SIZE};

/// A handle to a block in the arena.
///
/// Copying the handle does not copy the block. The handle makes the following assumptions, which
/// are upheld by its (unsafe) constructors:
///
/// 1. The tag pointer is valid for reads and writes, and aligned.
/// 2. Whoever holds the handle has exclusive access to the arena (i.e. holds the arena lock).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block {
    /// The boundary tag of this block.
    tag: Pointer<BoundaryTag>,
}

impl Block {
    /// Construct a block handle from a tag pointer.
    ///
    /// # Safety
    ///
    /// `tag` must point to an initialized boundary tag in arena memory.
    #[inline]
    pub unsafe fn from_raw(tag: Pointer<BoundaryTag>) -> Block {
        debug_assert!(
            tag.aligned_to(core::mem::align_of::<BoundaryTag>()),
            "Unaligned tag at {:?}.",
            tag
        );

        Block { tag }
    }

    /// Write a fresh boundary tag at `ptr` and return its handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writing a boundary tag, and the bytes must not belong to a live
    /// block.
    #[inline]
    pub unsafe fn write(ptr: Pointer<u8>, tag: BoundaryTag) -> Block {
        let tag_ptr = ptr.cast::<BoundaryTag>();
        ptr::write(tag_ptr.get(), tag);

        Block::from_raw(tag_ptr)
    }

    /// Get the block owning the payload at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by the allocator, and not be freed yet.
    #[inline]
    pub unsafe fn from_payload(ptr: Pointer<u8>) -> Block {
        Block::from_raw(ptr.offset(-(TAG_SIZE as isize)).cast())
    }

    /// The pointer to the boundary tag.
    #[inline]
    pub fn as_ptr(&self) -> Pointer<BoundaryTag> {
        self.tag
    }

    /// The address of the boundary tag.
    #[inline]
    pub fn addr(&self) -> usize {
        self.tag.addr()
    }

    /// Read the boundary tag.
    #[inline]
    pub fn tag(&self) -> BoundaryTag {
        unsafe { ptr::read(self.tag.get()) }
    }

    /// The payload size of the block.
    #[inline]
    pub fn size(&self) -> usize {
        self.tag().size()
    }

    /// Set the payload size of the block.
    #[inline]
    pub fn set_size(&self, size: usize) {
        unsafe { (*self.tag.get()).set_size(size) }
    }

    /// Is this block allocated?
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.tag().is_allocated()
    }

    /// Mark the block allocated or free.
    #[inline]
    pub fn set_allocated(&self, allocated: bool) {
        unsafe { (*self.tag.get()).set_allocated(allocated) }
    }

    /// The payload size of the left neighbour.
    #[inline]
    pub fn left_size(&self) -> usize {
        self.tag().left_size()
    }

    /// Set the payload size of the left neighbour.
    #[inline]
    pub fn set_left_size(&self, size: usize) {
        unsafe { (*self.tag.get()).set_left_size(size) }
    }

    /// Is this a fence post?
    #[inline]
    pub fn is_fence(&self) -> bool {
        self.tag().is_fence()
    }

    /// The number of bytes this block occupies, tag included.
    #[inline]
    pub fn span(&self) -> usize {
        TAG_SIZE + self.size()
    }

    /// The first byte of the payload.
    #[inline]
    pub fn payload(&self) -> Pointer<u8> {
        unsafe { self.tag.cast::<u8>().offset(TAG_SIZE as isize) }
    }

    /// The block directly to the right of this one.
    ///
    /// # Safety
    ///
    /// This must not be the trailing fence post of a chunk.
    #[inline]
    pub unsafe fn right(&self) -> Block {
        Block::from_raw(self.tag.cast::<u8>().offset(self.span() as isize).cast())
    }

    /// The block directly to the left of this one.
    ///
    /// # Safety
    ///
    /// This must not be the leading fence post of a chunk.
    #[inline]
    pub unsafe fn left(&self) -> Block {
        Block::from_raw(
            self.tag
                .cast::<u8>()
                .offset(-((TAG_SIZE + self.left_size()) as isize))
                .cast(),
        )
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = self.tag();
        write!(
            f,
            "0x{:x}[0x{:x}{}]",
            self.addr(),
            tag.size(),
            if tag.is_allocated() { "" } else { ", free" }
        )
    }
}
