//! Chunk acquisition.
//!
//! The arena grows in fixed-size chunks obtained from a memory `Source`. Every chunk is framed by
//! two fence posts, zero-sized blocks which are permanently allocated, so coalescing never walks
//! off either end of the chunk:
//!
//! ```text
//! +-------+--------------------------------------------+-------+
//! | fence | interior (free, size = CHUNK_SIZE - 3 tag) | fence |
//! +-------+--------------------------------------------+-------+
//! ^ start                                              ^ start + CHUNK_SIZE - tag
//! ```

use core::{cmp, mem};

use tagalloc_shim::config;

use crate::block::Block;
use crate::fail::{Error, Result};
use crate::free_list::MIN_BLOCK_SIZE;
use crate::ptr::Pointer;
use crate::tag::{BoundaryTag, GRANULARITY, TAG_SIZE};

/// A source of raw memory.
///
/// # Safety
///
/// Memory returned by `grow` must be valid for reads and writes for as long as the source lives,
/// aligned to `TAG_SIZE`, and not handed out to anybody else, ever.
pub unsafe trait Source {
    /// The number of bytes the arena asks for at a time.
    ///
    /// This must be a multiple of the block granularity, and big enough to hold two fence posts
    /// and a minimal block.
    const CHUNK_SIZE: usize = config::ARENA_SIZE;

    /// Get `size` fresh bytes of memory.
    fn grow(&mut self, size: usize) -> core::result::Result<Pointer<u8>, ()>;
}

/// The payload size of a fresh chunk's interior.
#[inline]
pub const fn interior_size(chunk_size: usize) -> usize {
    chunk_size - 3 * TAG_SIZE
}

/// A freshly acquired chunk.
#[derive(Debug)]
pub struct Chunk {
    /// The first byte of the chunk (the leading fence post).
    pub start: Pointer<u8>,
    /// The interior block, free and not linked into any list.
    pub interior: Block,
}

impl Chunk {
    /// The address one past the last byte of a chunk of `chunk_size` bytes.
    #[inline]
    pub fn end(&self, chunk_size: usize) -> usize {
        self.start.addr() + chunk_size
    }
}

/// Acquire a new chunk from `source` and lay out its fence posts.
///
/// The interior is returned as a single free block. It is _not_ linked into a free list.
pub fn acquire<S: Source>(source: &mut S) -> Result<Chunk> {
    debug_assert!(
        S::CHUNK_SIZE % GRANULARITY == 0 && S::CHUNK_SIZE >= 2 * TAG_SIZE + MIN_BLOCK_SIZE,
        "Invalid chunk size {}.",
        S::CHUNK_SIZE
    );

    let start = source.grow(S::CHUNK_SIZE).map_err(|()| {
        log!(ERROR, "The memory source refused to provide {} bytes.", S::CHUNK_SIZE);
        Error::OutOfMemory
    })?;
    debug_assert!(start.aligned_to(TAG_SIZE), "Unaligned chunk at {:?}.", start);

    let chunk = unsafe {
        // The leading fence post.
        Block::write(start, BoundaryTag::fence());

        // The interior. Its left neighbour is the (zero-sized) fence post.
        let interior = Block::write(start.offset(TAG_SIZE as isize), BoundaryTag::fence());
        interior.set_size(interior_size(S::CHUNK_SIZE));
        interior.set_allocated(false);

        // The trailing fence post.
        let tail = Block::write(
            start.offset((S::CHUNK_SIZE - TAG_SIZE) as isize),
            BoundaryTag::fence(),
        );
        tail.set_left_size(interior.size());
        debug_assert!(interior.right() == tail, "Misplaced trailing fence post.");

        Chunk { start, interior }
    };

    log!(DEBUG, "Acquired chunk at {:?}, interior {:?}.", start, chunk.interior);

    Ok(chunk)
}

/// A memory source bumping through a fixed region of memory.
///
/// This is mostly useful for independent, bounded arenas (and tests), where the program break is
/// not wanted. `CHUNK` is the chunk size the arena will ask for.
pub struct Region<const CHUNK: usize = { config::ARENA_SIZE }> {
    /// The (aligned) start of the region.
    start: *mut u8,
    /// The usable length of the region.
    len: usize,
    /// The number of bytes handed out so far.
    used: usize,
}

impl<const CHUNK: usize> Region<CHUNK> {
    /// Create a source over `len` bytes starting at `start`.
    ///
    /// The start is aligned up to the tag alignment; bytes lost to that are not used.
    ///
    /// # Safety
    ///
    /// The memory must be valid for reads and writes, and unused by anything else, for as long as
    /// the source (and any arena built on it) lives.
    pub unsafe fn new(start: *mut u8, len: usize) -> Region<CHUNK> {
        let pad = cmp::min(start.align_offset(TAG_SIZE), len);

        Region {
            start: start.add(pad),
            len: len - pad,
            used: 0,
        }
    }

    /// Create a source over a leaked or static buffer.
    pub fn from_static(buf: &'static mut [u64]) -> Region<CHUNK> {
        let len = buf.len() * mem::size_of::<u64>();
        unsafe { Region::new(buf.as_mut_ptr() as *mut u8, len) }
    }

    /// The number of bytes not yet handed out.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.used
    }
}

unsafe impl<const CHUNK: usize> Source for Region<CHUNK> {
    const CHUNK_SIZE: usize = CHUNK;

    fn grow(&mut self, size: usize) -> core::result::Result<Pointer<u8>, ()> {
        if self.remaining() < size {
            return Err(());
        }

        let res = unsafe { self.start.add(self.used) };
        self.used += size;

        Pointer::from_raw(res).ok_or(())
    }
}

unsafe impl<const CHUNK: usize> Send for Region<CHUNK> {}
