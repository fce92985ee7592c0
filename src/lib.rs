//! **tagalloc:** A boundary-tag allocator.
//!
//! This crate defines a user space allocator which serves allocations from an in-process arena
//! instead of asking the OS every time. The arena grows in 2 MiB chunks taken from the program
//! break. Every block carries a boundary tag (its size, whether it is allocated, and the size of
//! its left neighbour), free blocks are kept in a circular free list searched first fit, and
//! freed blocks are coalesced with their free neighbours right away.
//!
//! The global arena sits behind one lock, and can be used through the free functions of this
//! crate, as a `#[global_allocator]` (`Allocator`), or, with the `symbols` feature, as the C
//! `malloc`. Independent arenas can be built over any memory `Source`.

#![no_std]
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod log;

mod allocator;
mod arena;
mod block;
mod brk;
mod chunk;
mod free_list;
mod ptr;
mod stats;
mod sync;
mod sys;
mod tag;
mod write;

#[cfg(feature = "symbols")]
pub mod symbols;

pub mod fail;

pub use crate::allocator::{
    alloc, calloc, free, lock, print_free_list, print_stats, realloc, stats, usable_size,
    Allocator,
};
pub use crate::arena::{Arena, FreeBlocks, Walk};
pub use crate::brk::{sbrk, Brk};
pub use crate::chunk::{Region, Source};
pub use crate::fail::Error;
pub use crate::free_list::MIN_BLOCK_SIZE;
pub use crate::ptr::Pointer;
pub use crate::stats::{BlockInfo, Census, FreeListDump, Stats};
pub use crate::sync::{Mutex, MutexGuard};
pub use crate::tag::TAG_SIZE;
