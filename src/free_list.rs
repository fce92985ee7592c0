//! The free list.
//!
//! Free blocks are kept in an intrusive, circular, doubly linked list. The links live in the first
//! bytes of the free block's payload, so a free block costs no memory beyond its own. The list is
//! anchored by a sentinel node, which is embedded in the list itself and never handed out.

use core::cell::UnsafeCell;
use core::{marker, mem, ptr};

use crate::block::Block;
use crate::ptr::Pointer;
use crate::tag::{BoundaryTag, TAG_SIZE};

/// The smallest number of bytes a block can occupy, tag included.
///
/// Anything smaller could not be linked into the free list once released.
pub const MIN_BLOCK_SIZE: usize = mem::size_of::<Node>();

/// The in-memory layout of a free block.
#[repr(C)]
struct Node {
    /// The boundary tag. This must be the first field, so a node pointer is also a tag pointer.
    tag: BoundaryTag,
    /// The previous node.
    prev: *mut Node,
    /// The next node.
    next: *mut Node,
}

/// Get the node of a free block.
#[inline]
fn node(block: Block) -> *mut Node {
    block.as_ptr().cast::<Node>().get()
}

/// Get the block of a (non-sentinel) node.
#[inline]
unsafe fn block(node: *mut Node) -> Block {
    Block::from_raw(Pointer::new(node).cast())
}

/// A circular free list.
///
/// # Moving
///
/// Once initialized, the nodes of the list point back at the sentinel, so the list must stay put
/// in memory for as long as it is used.
pub struct FreeList {
    /// The sentinel.
    ///
    /// It looks like a zero-sized, allocated block, so it can never be matched by an allocation.
    /// Its links are null until the list is initialized. Nodes of the list write to it, hence the
    /// cell.
    sentinel: UnsafeCell<Node>,
}

impl FreeList {
    /// Create a new, uninitialized free list.
    pub const fn new() -> FreeList {
        FreeList {
            sentinel: UnsafeCell::new(Node {
                tag: BoundaryTag::fence(),
                prev: ptr::null_mut(),
                next: ptr::null_mut(),
            }),
        }
    }

    /// The address of the sentinel.
    #[inline]
    fn sentinel(&self) -> *mut Node {
        self.sentinel.get()
    }

    /// The first node (the sentinel itself if the list is empty).
    #[inline]
    fn first(&self) -> *mut Node {
        unsafe { (*self.sentinel()).next }
    }

    /// Is the list initialized?
    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.first().is_null()
    }

    /// Initialize the list to the empty list.
    ///
    /// After this call, the list must no longer be moved.
    pub fn init(&mut self) {
        let sentinel = self.sentinel();
        unsafe {
            (*sentinel).prev = sentinel;
            (*sentinel).next = sentinel;
        }
    }

    /// Is the list empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.is_initialized() || self.first() == self.sentinel()
    }

    /// Insert a free block at the head of the list.
    ///
    /// # Safety
    ///
    /// The list must be initialized, and `block` must be free, at least `MIN_BLOCK_SIZE` bytes,
    /// and not already in the list.
    pub unsafe fn push_front(&mut self, block: Block) {
        debug_assert!(self.is_initialized(), "Pushing to an uninitialized free list.");
        debug_assert!(!block.is_allocated(), "Pushing allocated block {:?}.", block);
        debug_assert!(block.span() >= MIN_BLOCK_SIZE, "Pushing undersized block {:?}.", block);

        let sentinel = self.sentinel();
        let new = node(block);
        let first = (*sentinel).next;

        (*new).prev = sentinel;
        (*new).next = first;
        (*first).prev = new;
        (*sentinel).next = new;
    }

    /// Remove a block from whichever list it is in.
    ///
    /// # Safety
    ///
    /// `block` must be linked into a free list.
    pub unsafe fn unlink(block: Block) {
        let node = node(block);
        let prev = (*node).prev;
        let next = (*node).next;

        (*prev).next = next;
        (*next).prev = prev;
    }

    /// Put `new` in the list position of `old`, removing `old`.
    ///
    /// # Safety
    ///
    /// `old` must be linked into a free list, `new` must not be. Their link fields must not
    /// overlap.
    pub unsafe fn replace(old: Block, new: Block) {
        let old = node(old);
        let new = node(new);
        let prev = (*old).prev;
        let next = (*old).next;

        (*new).prev = prev;
        (*new).next = next;
        (*prev).next = new;
        (*next).prev = new;
    }

    /// Iterate over the free blocks, head first.
    pub fn iter(&self) -> Iter {
        Iter {
            sentinel: self.sentinel(),
            cur: if self.is_initialized() {
                self.first()
            } else {
                self.sentinel()
            },
            _phantom: marker::PhantomData,
        }
    }

    /// Check the link structure of the list.
    ///
    /// Returns the number of nodes. Panics if the links are inconsistent or a node is allocated.
    pub fn check(&self) -> usize {
        let mut count = 0;

        unsafe {
            let sentinel = self.sentinel();
            if !self.is_initialized() {
                assert!((*sentinel).prev.is_null(), "Half initialized free list.");
                return 0;
            }

            let mut cur = sentinel;
            loop {
                let next = (*cur).next;
                assert_eq!((*next).prev, cur, "Broken back link at {:?}.", next);
                if next == sentinel {
                    break;
                }

                let free = block(next);
                assert!(!free.is_allocated(), "Allocated block {:?} in the free list.", free);
                assert!(free.span() >= MIN_BLOCK_SIZE, "Undersized free block {:?}.", free);

                count += 1;
                cur = next;
            }
        }

        count
    }
}

/// An iterator over the free list.
#[derive(Clone)]
pub struct Iter<'a> {
    /// The sentinel, where iteration ends.
    sentinel: *mut Node,
    /// The next node to visit.
    cur: *mut Node,
    /// The borrowed list.
    _phantom: marker::PhantomData<&'a FreeList>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.cur == self.sentinel {
            None
        } else {
            unsafe {
                let res = block(self.cur);
                self.cur = (*self.cur).next;
                Some(res)
            }
        }
    }
}

const _: () = assert!(MIN_BLOCK_SIZE == TAG_SIZE + 2 * mem::size_of::<usize>());
