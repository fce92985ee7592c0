//! Statistics and diagnostics.
//!
//! Nothing in here allocates: the reports are `Display` implementations, formatted straight into
//! whatever writer they are handed (usually `write::ReportWriter`).

use core::fmt;

/// Allocator statistics.
///
/// The call counters count calls, not successful ones: a failed allocation or a `free` of null is
/// counted all the same.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Stats {
    /// The number of bytes obtained from the memory source.
    pub heap_size: usize,
    /// The number of `malloc` calls.
    pub mallocs: usize,
    /// The number of `realloc` calls.
    pub reallocs: usize,
    /// The number of `calloc` calls.
    pub callocs: usize,
    /// The number of `free` calls.
    pub frees: usize,
}

impl Stats {
    /// All zeros.
    pub const fn new() -> Stats {
        Stats {
            heap_size: 0,
            mallocs: 0,
            reallocs: 0,
            callocs: 0,
            frees: 0,
        }
    }
}

/// The statistics block, as printed at exit.
impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\n-------------------")?;
        writeln!(f, "HeapSize:\t{} bytes", self.heap_size)?;
        writeln!(f, "# mallocs:\t{}", self.mallocs)?;
        writeln!(f, "# reallocs:\t{}", self.reallocs)?;
        writeln!(f, "# callocs:\t{}", self.callocs)?;
        writeln!(f, "# frees:\t{}", self.frees)?;
        writeln!(f, "\n-------------------")
    }
}

/// A block, as seen from the outside.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockInfo {
    /// The address of the block's tag, relative to the start of the first chunk.
    pub offset: isize,
    /// The payload size.
    pub size: usize,
    /// Is the block allocated?
    pub allocated: bool,
}

/// A free-list dump.
///
/// Formats as `FreeList: [offset:o,size:s]->[offset:o,size:s]...`, in list order.
pub struct FreeListDump<I> {
    /// The free blocks, in list order.
    pub(crate) blocks: I,
}

impl<I: Iterator<Item = BlockInfo> + Clone> fmt::Display for FreeListDump<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FreeList: ")?;

        for (n, block) in self.blocks.clone().enumerate() {
            if n != 0 {
                write!(f, "->")?;
            }
            write!(f, "[offset:{},size:{}]", block.offset, block.size)?;
        }

        Ok(())
    }
}

/// The outcome of a successful consistency check.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Census {
    /// The number of chunks walked.
    pub chunks: usize,
    /// The number of allocated blocks.
    pub allocated_blocks: usize,
    /// The number of free blocks.
    pub free_blocks: usize,
    /// The payload bytes of allocated blocks.
    pub allocated_bytes: usize,
    /// The payload bytes of free blocks.
    pub free_bytes: usize,
    /// The bytes taken by boundary tags, fence posts included.
    pub tag_bytes: usize,
}

impl Census {
    /// The total number of bytes accounted for.
    #[inline]
    pub fn total(&self) -> usize {
        self.allocated_bytes + self.free_bytes + self.tag_bytes
    }
}
