//! The arena.
//!
//! This is the main component of tagalloc: the allocation and release engines. An arena owns a
//! memory source, the chunks it got from it, and the free list threading through them.

use core::{cmp, fmt, marker, ptr};

use crate::block::Block;
use crate::chunk::{self, Source};
use crate::fail::{Error, Result};
use crate::free_list::{self, FreeList, MIN_BLOCK_SIZE};
use crate::ptr::Pointer;
use crate::stats::{BlockInfo, Census, FreeListDump, Stats};
use crate::tag::{self, BoundaryTag, TAG_SIZE};

/// A memory arena.
///
/// Guarantees
/// ==========
///
/// Certain guarantees are made, assuming that only the public methods are used (and used
/// correctly, i.e. no double frees or foreign pointers):
///
/// 1. For every two address-adjacent blocks A and B (A first), `B.left_size == A.size`.
/// 2. No two address-adjacent blocks are both free.
/// 3. Every free block is in the free list exactly once, and nothing else is.
/// 4. Allocated payload, free payload and tags add up to the bytes obtained from the source.
///
/// # Moving
///
/// The free list is anchored in the arena itself. Once the arena has served its first
/// allocation, it must not be moved anymore (put it in a `static`, a `Box` or similar).
pub struct Arena<S: Source> {
    /// The free list.
    free_list: FreeList,
    /// The memory source.
    source: S,
    /// The start of the first chunk.
    ///
    /// Offsets in reports are relative to this.
    mem_start: Option<Pointer<u8>>,
    /// The lowest address of any chunk.
    low: usize,
    /// One past the highest address of any chunk.
    high: usize,
    /// The end of the run of contiguous chunks starting at `mem_start`.
    ///
    /// Chunks outside this run (when something else moved the program break in between) are not
    /// walked by `walk` and `check`.
    run_end: usize,
    /// The statistics.
    stats: Stats,
}

impl<S: Source> Arena<S> {
    /// Create a new, empty arena.
    ///
    /// This will not touch the memory source.
    pub const fn new(source: S) -> Arena<S> {
        Arena {
            free_list: FreeList::new(),
            source,
            mem_start: None,
            low: 0,
            high: 0,
            run_end: 0,
            stats: Stats::new(),
        }
    }

    /// Allocate `size` bytes.
    ///
    /// The returned pointer is aligned to 8 bytes and points to at least `size` usable bytes.
    pub fn alloc(&mut self, size: usize) -> Result<Pointer<u8>> {
        self.stats.mallocs += 1;
        log!(CALL, "Allocating {} bytes.", size);

        let res = self.alloc_block(size).map(|block| block.payload());
        self.debug_check();

        res
    }

    /// Free the block at `ptr`.
    ///
    /// Freeing null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or a live pointer returned by this arena.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        self.stats.frees += 1;
        log!(CALL, "Freeing {:?}.", ptr);

        if let Some(ptr) = Pointer::from_raw(ptr) {
            self.free_block(Block::from_payload(ptr));
            self.debug_check();
        }
    }

    /// Reallocate the block at `ptr` to `size` bytes.
    ///
    /// The contents are copied up to the smaller of the two sizes. A null `ptr` is a plain
    /// allocation. On failure, the old block is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or a live pointer returned by this arena.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> Result<Pointer<u8>> {
        self.stats.reallocs += 1;
        log!(CALL, "Reallocating {:?} to {} bytes.", ptr, size);

        let res = match Pointer::from_raw(ptr) {
            Some(ptr) => self.realloc_block(Block::from_payload(ptr), size),
            None => self.alloc_block(size),
        };
        self.debug_check();

        res.map(|block| block.payload())
    }

    /// Allocate `count * size` zeroed bytes.
    pub fn calloc(&mut self, count: usize, size: usize) -> Result<Pointer<u8>> {
        self.stats.callocs += 1;
        log!(CALL, "Allocating {} zeroed elements of {} bytes.", count, size);

        let res = count
            .checked_mul(size)
            .ok_or(Error::Overflow)
            .and_then(|bytes| {
                let block = self.alloc_block(bytes)?;
                unsafe { ptr::write_bytes(block.payload().get(), 0, bytes) };

                Ok(block.payload())
            });
        self.debug_check();

        res
    }

    /// The number of usable bytes of the block at `ptr`.
    ///
    /// This is at least the requested size. Null yields 0.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or a live pointer returned by this arena.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        Pointer::from_raw(ptr).map_or(0, |ptr| {
            let block = Block::from_payload(ptr);
            self.debug_owned(block);

            block.size()
        })
    }

    /// The statistics.
    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The memory source.
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Iterate over the free blocks, in list order.
    pub fn free_blocks(&self) -> FreeBlocks {
        FreeBlocks {
            iter: self.free_list.iter(),
            base: self.base(),
        }
    }

    /// A displayable dump of the free list.
    pub fn dump(&self) -> FreeListDump<FreeBlocks> {
        FreeListDump {
            blocks: self.free_blocks(),
        }
    }

    /// Walk all the blocks (fence posts excluded) in address order.
    ///
    /// Only the run of contiguous chunks starting at the first one is walked.
    pub fn walk(&self) -> Walk {
        Walk {
            chunk: self.mem_start,
            run_end: self.run_end,
            chunk_size: S::CHUNK_SIZE,
            cur: None,
            base: self.base(),
            _phantom: marker::PhantomData,
        }
    }

    /// Perform consistency checks.
    ///
    /// This will check for the following conditions, panicking on the first violation:
    ///
    /// 1. Every chunk is framed by fence posts.
    /// 2. The `left_size` of every block matches the size of its left neighbour.
    /// 3. No two adjacent blocks are free.
    /// 4. The free list links are consistent, and every listed block is free.
    /// 5. Tags and payloads add up to the heap size (if the chunks are contiguous), and the free
    ///    list holds exactly the free blocks walked.
    ///
    /// Returns the census of the walked blocks.
    pub fn check(&self) -> Census {
        let listed = self.free_list.check();
        assert_eq!(listed == 0, self.free_list.is_empty(), "Miscounted free list.");
        let mut census = Census::default();

        let start = match self.mem_start {
            Some(start) => start,
            None => {
                assert_eq!(self.stats.heap_size, 0, "Heap without chunks.");
                assert_eq!(listed, 0, "Free blocks without chunks.");
                return census;
            }
        };

        for block in self.free_list.iter() {
            assert!(
                self.low <= block.addr() && block.addr() < self.high,
                "Foreign block {:?} in the free list.",
                block
            );
        }

        let mut chunk = start;
        while chunk.addr() < self.run_end {
            unsafe {
                let head = Block::from_raw(chunk.cast());
                assert!(head.is_fence(), "Missing leading fence post at {:?}.", head);
                census.chunks += 1;
                census.tag_bytes += 2 * TAG_SIZE;

                let mut prev = head;
                let mut cur = head.right();
                loop {
                    assert_eq!(
                        cur.left_size(),
                        prev.size(),
                        "Broken left size at {:?} (left neighbour {:?}).",
                        cur,
                        prev
                    );
                    if cur.is_fence() {
                        break;
                    }
                    assert!(
                        prev.is_allocated() || cur.is_allocated(),
                        "Adjacent free blocks {:?} and {:?}.",
                        prev,
                        cur
                    );

                    census.tag_bytes += TAG_SIZE;
                    if cur.is_allocated() {
                        census.allocated_blocks += 1;
                        census.allocated_bytes += cur.size();
                    } else {
                        census.free_blocks += 1;
                        census.free_bytes += cur.size();
                    }

                    prev = cur;
                    cur = cur.right();
                }

                let end = chunk.offset(S::CHUNK_SIZE as isize);
                assert_eq!(
                    cur.addr() + TAG_SIZE,
                    end.addr(),
                    "Trailing fence post {:?} is misplaced.",
                    cur
                );

                chunk = end;
            }
        }

        if self.run_end - start.addr() == self.stats.heap_size {
            assert_eq!(census.total(), self.stats.heap_size, "Leaked or duplicated bytes.");
            assert_eq!(census.free_blocks, listed, "Free blocks missing from the free list.");
        }

        census
    }

    /// Run the consistency check, if the `debug_tools` feature is enabled.
    #[inline]
    fn debug_check(&self) {
        #[cfg(feature = "debug_tools")]
        self.check();
    }

    /// Assert (in debug mode) that `block` is an allocated block of this arena.
    #[inline]
    fn debug_owned(&self, block: Block) {
        debug_assert!(
            self.low <= block.addr() && block.addr() < self.high,
            "Pointer {:?} was not allocated by this arena.",
            block.payload()
        );
        debug_assert!(block.is_allocated(), "{:?} is not allocated (double free?).", block);
    }

    /// The address offsets are reported relative to.
    #[inline]
    fn base(&self) -> usize {
        self.mem_start.map_or(0, |start| start.addr())
    }

    /// Get a new chunk from the memory source and push its interior to the free list.
    fn grow(&mut self) -> Result<()> {
        let chunk = chunk::acquire(&mut self.source)?;
        let start = chunk.start.addr();
        let end = chunk.end(S::CHUNK_SIZE);

        if self.mem_start.is_none() {
            self.mem_start = Some(chunk.start);
            self.low = start;
            self.high = end;
            self.run_end = end;
        } else {
            if start == self.run_end {
                self.run_end = end;
            } else {
                log!(NOTE, "Chunk at {:?} is not contiguous with the previous ones.", chunk.start);
            }
            self.low = cmp::min(self.low, start);
            self.high = cmp::max(self.high, end);
        }
        self.stats.heap_size += S::CHUNK_SIZE;

        unsafe { self.free_list.push_front(chunk.interior) };

        Ok(())
    }

    /// The span of the block needed for a request of `size` bytes.
    fn span_for(size: usize) -> Result<usize> {
        if size == 0 {
            return Err(Error::ZeroSized);
        }
        if size >= S::CHUNK_SIZE {
            return Err(Error::TooLarge(size));
        }

        let span = cmp::max(tag::round_up(size + TAG_SIZE).ok_or(Error::TooLarge(size))?, MIN_BLOCK_SIZE);

        // A fresh chunk could not hold it either.
        if span > S::CHUNK_SIZE - 2 * TAG_SIZE {
            return Err(Error::TooLarge(size));
        }

        Ok(span)
    }

    /// Find the first free block of at least `span` bytes.
    fn first_fit(&self, span: usize) -> Option<Block> {
        self.free_list.iter().find(|block| block.span() >= span)
    }

    /// Allocate a block for `size` bytes.
    fn alloc_block(&mut self, size: usize) -> Result<Block> {
        let span = Self::span_for(size)?;

        if !self.free_list.is_initialized() {
            log!(DEBUG, "Initializing the free list.");
            self.free_list.init();
        }

        let block = match self.first_fit(span) {
            Some(block) => block,
            None => {
                log!(DEBUG, "No fit for a span of {} bytes, growing the arena.", span);
                self.grow()?;
                self.first_fit(span).ok_or(Error::TooLarge(size))?
            }
        };

        let res = unsafe { self.take(block, span) };
        log!(DEBUG, "Allocated {:?} for {} bytes.", res, size);

        Ok(res)
    }

    /// Take `span` bytes from the free block `block`, and return the allocated block.
    ///
    /// If the remainder is big enough to stand alone, the allocated block is carved from the high
    /// end of `block`, and `block` (shrunk) stays where it is in the free list:
    ///
    /// ```notrust
    ///   before:  |tag|            block            |tag| right
    ///   after:   |tag|   block   |tag|    res      |tag| right
    ///                             ^ left_size = block.size
    /// ```
    ///
    /// Otherwise the whole block is taken.
    unsafe fn take(&mut self, block: Block, span: usize) -> Block {
        debug_assert!(block.span() >= span, "{:?} is too small for a span of {}.", block, span);

        if block.span() - span >= MIN_BLOCK_SIZE {
            let right = block.right();

            block.set_size(block.size() - span);

            let res = Block::write(block.right().as_ptr().cast(), BoundaryTag::fence());
            res.set_size(span - TAG_SIZE);
            res.set_left_size(block.size());
            right.set_left_size(res.size());

            debug_assert!(res.right() == right, "Split overran into {:?}.", right);

            res
        } else {
            FreeList::unlink(block);
            block.set_allocated(true);

            block
        }
    }

    /// Release an allocated block, coalescing it with its free neighbours.
    ///
    /// ```notrust
    ///   left  alloc, right alloc:  mark free, push to the free list
    ///   left  free,  right alloc:  left absorbs the block
    ///   left  alloc, right free:   the block absorbs right, taking its list position
    ///   left  free,  right free:   left absorbs the block and right, right is unlinked
    /// ```
    unsafe fn free_block(&mut self, block: Block) {
        self.debug_owned(block);

        let left = block.left();
        let right = block.right();

        match (left.is_allocated(), right.is_allocated()) {
            (true, true) => {
                block.set_allocated(false);
                self.free_list.push_front(block);
            }
            (false, true) => {
                left.set_size(left.size() + block.span());
                right.set_left_size(left.size());
            }
            (true, false) => {
                let far = right.right();

                block.set_size(block.size() + right.span());
                block.set_allocated(false);
                FreeList::replace(right, block);
                far.set_left_size(block.size());
            }
            (false, false) => {
                let far = right.right();

                FreeList::unlink(right);
                left.set_size(left.size() + block.span() + right.span());
                far.set_left_size(left.size());
            }
        }

        log!(DEBUG, "Freed {:?}.", block);
    }

    /// Move the contents of `old` to a new block of `size` bytes, and free `old`.
    unsafe fn realloc_block(&mut self, old: Block, size: usize) -> Result<Block> {
        self.debug_owned(old);

        let new = self.alloc_block(size)?;
        ptr::copy_nonoverlapping(
            old.payload().get(),
            new.payload().get(),
            cmp::min(old.size(), size),
        );
        self.free_block(old);

        Ok(new)
    }
}

unsafe impl<S: Source + Send> Send for Arena<S> {}

impl<S: Source> fmt::Debug for Arena<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Arena")
            .field("mem_start", &self.mem_start)
            .field("stats", &self.stats)
            .finish()
    }
}

/// An iterator over the free blocks of an arena.
#[derive(Clone)]
pub struct FreeBlocks<'a> {
    /// The free list iterator.
    iter: free_list::Iter<'a>,
    /// The address offsets are relative to.
    base: usize,
}

impl<'a> Iterator for FreeBlocks<'a> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        self.iter.next().map(|block| info(block, self.base))
    }
}

/// An address-order walk over the blocks of an arena.
pub struct Walk<'a> {
    /// The start of the next chunk to walk.
    chunk: Option<Pointer<u8>>,
    /// The end of the contiguous run of chunks.
    run_end: usize,
    /// The chunk size.
    chunk_size: usize,
    /// The next block in the current chunk.
    cur: Option<Block>,
    /// The address offsets are relative to.
    base: usize,
    /// The borrowed arena.
    _phantom: marker::PhantomData<&'a ()>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        loop {
            let block = match self.cur {
                Some(block) => block,
                None => {
                    let chunk = self.chunk.filter(|chunk| chunk.addr() < self.run_end)?;
                    unsafe {
                        self.chunk = Some(chunk.offset(self.chunk_size as isize));
                        Block::from_raw(chunk.cast()).right()
                    }
                }
            };

            if block.is_fence() {
                self.cur = None;
            } else {
                self.cur = Some(unsafe { block.right() });
                return Some(info(block, self.base));
            }
        }
    }
}

/// Describe `block` relative to `base`.
fn info(block: Block, base: usize) -> BlockInfo {
    BlockInfo {
        offset: block.addr().wrapping_sub(base) as isize,
        size: block.size(),
        allocated: block.is_allocated(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::boxed::Box;
    use std::string::ToString;
    use std::vec::Vec;

    use crate::chunk::Region;

    /// The chunk size of the test arenas.
    const CHUNK: usize = 4096;
    /// The payload size of a fresh chunk.
    const INTERIOR: usize = CHUNK - 3 * TAG_SIZE;

    type TestArena = Arena<Region<CHUNK>>;

    /// An arena with room for `chunks` chunks.
    fn arena(chunks: usize) -> Box<TestArena> {
        // One extra word pair for aligning the start.
        let buf = vec![0u64; chunks * CHUNK / 8 + 2].into_boxed_slice();
        Box::new(Arena::new(Region::from_static(Box::leak(buf))))
    }

    /// The offset of a payload pointer's tag.
    fn offset(arena: &TestArena, ptr: Pointer<u8>) -> usize {
        ptr.addr() - TAG_SIZE - arena.base()
    }

    fn free_list(arena: &TestArena) -> Vec<(isize, usize)> {
        arena.free_blocks().map(|b| (b.offset, b.size)).collect()
    }

    #[test]
    fn test_empty() {
        let arena = arena(1);
        assert_eq!(arena.stats(), Stats::new());
        assert_eq!(arena.free_blocks().count(), 0);
        assert_eq!(arena.walk().count(), 0);
        assert_eq!(arena.check(), Census::default());
    }

    #[test]
    fn test_first_alloc() {
        let mut arena = arena(1);
        let ptr = arena.alloc(8).unwrap();

        // The allocation is carved from the high end of the interior.
        assert_eq!(offset(&arena, ptr), CHUNK - TAG_SIZE - MIN_BLOCK_SIZE);
        assert_eq!(free_list(&arena), [(TAG_SIZE as isize, INTERIOR - MIN_BLOCK_SIZE)]);
        assert!(ptr.aligned_to(8));
        assert_eq!(unsafe { arena.usable_size(ptr.get()) }, MIN_BLOCK_SIZE - TAG_SIZE);

        let census = arena.check();
        assert_eq!(census.allocated_blocks, 1);
        assert_eq!(census.free_blocks, 1);
        assert_eq!(census.total(), CHUNK);
        assert_eq!(arena.stats().heap_size, CHUNK);
    }

    #[test]
    fn test_span_rounding() {
        let mut arena = arena(1);

        for &(size, usable) in &[(1, 16), (16, 16), (17, 24), (24, 24), (25, 32), (100, 104)] {
            let ptr = arena.alloc(size).unwrap();
            assert_eq!(unsafe { arena.usable_size(ptr.get()) }, usable, "size {}", size);
        }

        arena.check();
    }

    #[test]
    fn test_round_trip() {
        let mut arena = arena(1);
        let keep = arena.alloc(100).unwrap();
        let before = free_list(&arena);

        for &size in &[1, 8, 24, 200, 1000] {
            let ptr = arena.alloc(size).unwrap();
            unsafe { arena.free(ptr.get()) };
            assert_eq!(free_list(&arena), before);

            let again = arena.alloc(size).unwrap();
            assert_eq!(again, ptr);
            unsafe { arena.free(again.get()) };
        }

        unsafe { arena.free(keep.get()) };
        assert_eq!(free_list(&arena), [(TAG_SIZE as isize, INTERIOR)]);
        arena.check();
    }

    /// Build the free list `[x1: 48, x2: 112, x3: 16, rest]`, separated by allocated blocks.
    fn fragmented(arena: &mut TestArena) -> [Pointer<u8>; 3] {
        let x1 = arena.alloc(48).unwrap();
        let _s1 = arena.alloc(8).unwrap();
        let x2 = arena.alloc(112).unwrap();
        let _s2 = arena.alloc(8).unwrap();
        let x3 = arena.alloc(16).unwrap();
        let _s3 = arena.alloc(8).unwrap();

        unsafe {
            arena.free(x3.get());
            arena.free(x2.get());
            arena.free(x1.get());
        }

        [x1, x2, x3]
    }

    #[test]
    fn test_first_fit() {
        let mut arena = arena(1);
        let [x1, x2, x3] = fragmented(&mut arena);

        let sizes: Vec<usize> = arena.free_blocks().map(|b| b.size).collect();
        assert_eq!(sizes[..3], [48, 112, 16]);

        // x1 is the first block big enough, and too small to split.
        assert_eq!(arena.alloc(40).unwrap(), x1);
        // x2 is big enough to split, and is split from the high end.
        let y = arena.alloc(40).unwrap();
        assert_eq!(y.addr(), x2.addr() + 128 - 56);
        // Neither what is left of x2, nor x3 is big enough.
        let z = arena.alloc(64).unwrap();
        assert!(z < x3);
        // x2 is first again.
        assert_eq!(arena.alloc(32).unwrap(), x2);
        assert_eq!(arena.alloc(8).unwrap(), x3);

        arena.check();
    }

    #[test]
    fn test_first_fit_follows_list_order() {
        let mut arena = arena(1);
        let [x1, x2, _] = fragmented(&mut arena);

        // Reorder the list to `[x2, x1, ...]`.
        let a = arena.alloc(40).unwrap();
        assert_eq!(a, x1);
        let b = arena.alloc(104).unwrap();
        assert_eq!(b, x2);
        unsafe {
            arena.free(a.get());
            arena.free(b.get());
        }

        // x1 would fit, but x2 comes first, and is split.
        let y = arena.alloc(40).unwrap();
        assert_eq!(y.addr(), x2.addr() + 128 - 56);
        assert_eq!(free_list(&arena)[0].1, 112 - 56);

        arena.check();
    }

    #[test]
    fn test_split_threshold() {
        let mut arena = arena(1);
        let [x1, x2, _] = fragmented(&mut arena);

        // x1 has a span of 64; a span of 40 leaves 24, which is less than a minimal block.
        assert_eq!(arena.alloc(24).unwrap(), x1);
        assert_eq!(unsafe { arena.usable_size(x1.get()) }, 48);

        // x2 has a span of 128; a span of 96 leaves exactly a minimal block.
        let y = arena.alloc(80).unwrap();
        assert_eq!(y.addr(), x2.addr() + 128 - 96);
        assert_eq!(free_list(&arena)[0], (offset(&arena, x2) as isize, MIN_BLOCK_SIZE - TAG_SIZE));

        arena.check();
    }

    /// Allocate `[a, b, c, guard]`, all of 32 bytes.
    fn row(arena: &mut TestArena) -> [Pointer<u8>; 3] {
        // Allocations come from the high end, so later ones are lower in memory.
        let c = arena.alloc(32).unwrap();
        let b = arena.alloc(32).unwrap();
        let a = arena.alloc(32).unwrap();
        let _guard = arena.alloc(32).unwrap();

        assert!(a < b && b < c);
        [a, b, c]
    }

    #[test]
    fn test_coalesce_none() {
        let mut arena = arena(1);
        let [_, b, _] = row(&mut arena);
        let blocks = arena.free_blocks().count();

        unsafe { arena.free(b.get()) };
        assert_eq!(arena.free_blocks().count(), blocks + 1);
        assert_eq!(arena.free_blocks().next().unwrap().offset, offset(&arena, b) as isize);

        let census = arena.check();
        assert_eq!(census.allocated_blocks, 3);
    }

    #[test]
    fn test_coalesce_left() {
        let mut arena = arena(1);
        let [a, b, _] = row(&mut arena);

        unsafe {
            arena.free(a.get());
            let blocks = arena.free_blocks().count();
            arena.free(b.get());
            assert_eq!(arena.free_blocks().count(), blocks);
        }

        let merged = arena.free_blocks().next().unwrap();
        assert_eq!(merged.offset, offset(&arena, a) as isize);
        assert_eq!(merged.size, 32 + TAG_SIZE + 32);
        arena.check();
    }

    #[test]
    fn test_coalesce_right() {
        let mut arena = arena(1);
        let [_, b, c] = row(&mut arena);

        unsafe {
            arena.free(c.get());
            let blocks = arena.free_blocks().count();
            // c is at the head of the list; b takes over its position.
            arena.free(b.get());
            assert_eq!(arena.free_blocks().count(), blocks);
        }

        let merged = arena.free_blocks().next().unwrap();
        assert_eq!(merged.offset, offset(&arena, b) as isize);
        assert_eq!(merged.size, 32 + TAG_SIZE + 32);
        arena.check();
    }

    #[test]
    fn test_coalesce_both() {
        let mut arena = arena(1);
        let [a, b, c] = row(&mut arena);

        unsafe {
            arena.free(c.get());
            arena.free(a.get());
            assert_eq!(arena.free_blocks().nth(1).unwrap().offset, offset(&arena, c) as isize);

            arena.free(b.get());
        }

        // a absorbed b and c, and c left the list.
        let first = arena.free_blocks().next().unwrap();
        assert_eq!(first.offset, offset(&arena, a) as isize);
        assert_eq!(first.size, 32 + TAG_SIZE + 32 + TAG_SIZE + 32);
        assert!(arena.free_blocks().all(|block| block.offset != offset(&arena, c) as isize));
        assert_eq!(arena.free_blocks().count(), 2);
        arena.check();
    }

    #[test]
    fn test_coalesce_into_remainder() {
        let mut arena = arena(1);
        let ptr = arena.alloc(64).unwrap();

        // The only right neighbour is the trailing fence post; the left one is the remainder.
        unsafe { arena.free(ptr.get()) };
        assert_eq!(free_list(&arena), [(TAG_SIZE as isize, INTERIOR)]);
        assert_eq!(arena.check().free_blocks, 1);
    }

    #[test]
    fn test_coalesce_splice() {
        let mut arena = arena(1);
        // Take the whole chunk in three pieces: low (remainder-sized), mid and high.
        let high = arena.alloc(64).unwrap();
        let mid = arena.alloc(64).unwrap();
        let low = arena.alloc(INTERIOR - 2 * (64 + TAG_SIZE) - TAG_SIZE).unwrap();
        assert!(arena.free_blocks().next().is_none());

        unsafe {
            arena.free(high.get());
            // The right neighbour is free: mid splices into its place.
            arena.free(mid.get());
        }
        assert_eq!(free_list(&arena), [(offset(&arena, mid) as isize, 64 + TAG_SIZE + 64)]);

        // The left neighbour of low is the leading fence post.
        unsafe { arena.free(low.get()) };
        assert_eq!(free_list(&arena), [(TAG_SIZE as isize, INTERIOR)]);
        arena.check();
    }

    #[test]
    fn test_grow() {
        let mut arena = arena(2);
        let a = arena.alloc(3000).unwrap();
        let b = arena.alloc(3000).unwrap();

        assert_eq!(arena.stats().heap_size, 2 * CHUNK);
        assert_ne!(a, b);

        let census = arena.check();
        assert_eq!(census.chunks, 2);
        assert_eq!(census.total(), 2 * CHUNK);

        // The new chunk's remainder is at the head of the list.
        assert!(arena.free_blocks().next().unwrap().offset >= CHUNK as isize);

        unsafe {
            arena.free(a.get());
            arena.free(b.get());
        }
        assert_eq!(
            free_list(&arena),
            [(CHUNK as isize + TAG_SIZE as isize, INTERIOR), (TAG_SIZE as isize, INTERIOR)]
        );
        arena.check();
    }

    #[test]
    fn test_out_of_memory() {
        let mut arena = arena(1);
        assert_eq!(arena.alloc(0), Err(Error::ZeroSized));
        assert_eq!(arena.alloc(CHUNK), Err(Error::TooLarge(CHUNK)));
        assert_eq!(arena.alloc(CHUNK - 1), Err(Error::TooLarge(CHUNK - 1)));
        assert_eq!(arena.alloc(usize::MAX), Err(Error::TooLarge(usize::MAX)));
        assert_eq!(arena.stats().heap_size, 0);

        // The largest request fills a whole chunk.
        let big = arena.alloc(INTERIOR).unwrap();
        assert!(arena.free_blocks().next().is_none());
        assert_eq!(arena.alloc(8), Err(Error::OutOfMemory));

        unsafe { arena.free(big.get()) };
        assert!(arena.alloc(8).is_ok());
        assert_eq!(arena.stats().mallocs, 7);
        arena.check();
    }

    #[test]
    fn test_free_null() {
        let mut arena = arena(1);
        unsafe { arena.free(ptr::null_mut()) };

        assert_eq!(arena.stats().frees, 1);
        assert_eq!(arena.stats().heap_size, 0);
    }

    #[test]
    fn test_calloc() {
        let mut arena = arena(1);

        // Dirty some memory, and free it again.
        let dirty = arena.alloc(256).unwrap();
        unsafe {
            ptr::write_bytes(dirty.get(), 0xAB, 256);
            arena.free(dirty.get());
        }

        let ptr = arena.calloc(16, 16).unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(ptr.get(), 256) };
        assert!(bytes.iter().all(|&b| b == 0));

        assert_eq!(arena.calloc(usize::MAX, 2), Err(Error::Overflow));
        assert_eq!(arena.calloc(0, 8), Err(Error::ZeroSized));
        assert_eq!(arena.stats().callocs, 3);
        arena.check();
    }

    #[test]
    fn test_realloc() {
        let mut arena = arena(1);

        unsafe {
            let ptr = arena.realloc(ptr::null_mut(), 16).unwrap();
            for i in 0..16 {
                *ptr.get().add(i) = i as u8;
            }

            let grown = arena.realloc(ptr.get(), 200).unwrap();
            assert_ne!(grown, ptr);
            for i in 0..16 {
                assert_eq!(*grown.get().add(i), i as u8);
            }

            let shrunk = arena.realloc(grown.get(), 4).unwrap();
            for i in 0..4 {
                assert_eq!(*shrunk.get().add(i), i as u8);
            }

            // A failing reallocation leaves the block alone.
            assert_eq!(arena.realloc(shrunk.get(), CHUNK), Err(Error::TooLarge(CHUNK)));
            assert_eq!(*shrunk.get().add(3), 3);
            assert!(arena.walk().any(|b| b.allocated && b.offset == offset(&arena, shrunk) as isize));

            arena.free(shrunk.get());
        }

        assert_eq!(arena.stats().reallocs, 4);
        assert_eq!(arena.stats().mallocs, 0);
        assert_eq!(free_list(&arena), [(TAG_SIZE as isize, INTERIOR)]);
        arena.check();
    }

    #[test]
    fn test_walk() {
        let mut arena = arena(1);
        let a = arena.alloc(8).unwrap();
        let b = arena.alloc(8).unwrap();
        unsafe { arena.free(a.get()) };

        let blocks: Vec<_> = arena.walk().collect();
        assert_eq!(
            blocks,
            [
                BlockInfo { offset: TAG_SIZE as isize, size: INTERIOR - 2 * MIN_BLOCK_SIZE, allocated: false },
                BlockInfo { offset: offset(&arena, b) as isize, size: 16, allocated: true },
                BlockInfo { offset: offset(&arena, a) as isize, size: 16, allocated: false },
            ]
        );
    }

    #[test]
    fn test_dump() {
        let mut arena = arena(1);
        assert_eq!(arena.dump().to_string(), "FreeList: ");

        let a = arena.alloc(8).unwrap();
        let _b = arena.alloc(8).unwrap();
        unsafe { arena.free(a.get()) };

        assert_eq!(
            arena.dump().to_string(),
            format!(
                "FreeList: [offset:{},size:16]->[offset:16,size:{}]",
                CHUNK - TAG_SIZE - MIN_BLOCK_SIZE,
                INTERIOR - 2 * MIN_BLOCK_SIZE
            )
        );
    }

    #[test]
    fn test_conservation_under_churn() {
        let mut arena = arena(4);
        let mut live = Vec::new();
        let mut state = 0x2545F4914F6CDD1Du64;

        for _ in 0..2000 {
            // xorshift
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            if live.len() < 32 && state % 3 != 0 {
                let size = (state >> 8) as usize % 512 + 1;
                if let Ok(ptr) = arena.alloc(size) {
                    unsafe { ptr::write_bytes(ptr.get(), size as u8, size) };
                    live.push((ptr, size));
                }
            } else if !live.is_empty() {
                let (ptr, size) = live.swap_remove((state >> 16) as usize % live.len());
                unsafe {
                    assert!(core::slice::from_raw_parts(ptr.get(), size).iter().all(|&b| b == size as u8));
                    arena.free(ptr.get());
                }
            }

            let census = arena.check();
            assert_eq!(census.allocated_blocks, live.len());
            assert_eq!(census.total(), arena.stats().heap_size);
        }
    }
}
