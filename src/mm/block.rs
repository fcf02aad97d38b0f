//! Block Headers
//!
//! A [`Block`] is a view of the header at a block address. It holds no
//! data of its own; every read and write goes through the [`Arena`].
//!
//! The next-link word stores the successor's offset from the arena start,
//! with [`NIL`] marking the end of the free list.

use super::address::HeapAddr;
use super::arena::Arena;
use crate::config::{ALIGN_MASK, HEADER_SIZE};

/// End-of-list marker in the next-link word.
const NIL: u32 = u32::MAX;

/// Header view at a block address.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Block {
    addr: HeapAddr,
}

impl Block {
    /// View the block whose header starts at `addr`.
    #[inline]
    pub(crate) const fn at(addr: HeapAddr) -> Self {
        Self { addr }
    }

    /// View the block owning the payload at `ptr`.
    ///
    /// Returns `None` if `ptr` is too low to have a header in front of it.
    #[inline]
    pub(crate) const fn from_payload(ptr: HeapAddr) -> Option<Self> {
        match ptr.checked_sub(HEADER_SIZE) {
            Some(addr) => Some(Self::at(addr)),
            None => None,
        }
    }

    /// Address of the header.
    #[inline]
    pub(crate) const fn addr(self) -> HeapAddr {
        self.addr
    }

    /// Address handed to the caller for an allocated block.
    #[inline]
    pub(crate) const fn payload(self) -> HeapAddr {
        self.addr.add(HEADER_SIZE)
    }

    /// Total block size, header included.
    #[inline]
    pub(crate) fn size(self, arena: &Arena<'_>) -> usize {
        arena.read_word(self.addr) as usize
    }

    /// One past the last byte of the block.
    #[inline]
    pub(crate) fn end(self, arena: &Arena<'_>) -> HeapAddr {
        self.addr.add(self.size(arena))
    }

    /// Overwrite the size tag.
    #[inline]
    pub(crate) fn set_size(self, arena: &mut Arena<'_>, size: usize) {
        debug_assert!(size & ALIGN_MASK == 0);
        debug_assert!(size <= u32::MAX as usize);
        arena.write_word(self.addr, size as u32);
    }

    /// Successor in the free list. Only meaningful for free blocks.
    pub(crate) fn next(self, arena: &Arena<'_>) -> Option<Block> {
        match arena.read_word(self.link_addr()) {
            NIL => None,
            offset => Some(Block::at(arena.start().add(offset as usize))),
        }
    }

    /// Overwrite the next-link word.
    pub(crate) fn set_next(self, arena: &mut Arena<'_>, next: Option<Block>) {
        let link = match next {
            Some(block) => arena.offset_of(block.addr) as u32,
            None => NIL,
        };
        arena.write_word(self.link_addr(), link);
    }

    /// Write a complete free-block header.
    pub(crate) fn make_free(self, arena: &mut Arena<'_>, size: usize, next: Option<Block>) {
        self.set_size(arena, size);
        self.set_next(arena, next);
    }

    #[inline]
    const fn link_addr(self) -> HeapAddr {
        self.addr.add(HEADER_SIZE)
    }
}

/// Block size needed to satisfy a request for `requested` payload bytes.
///
/// Adds the size tag and rounds up to `ALIGNMENT`. Returns `None` on
/// overflow.
#[inline]
pub(crate) const fn block_size_for(requested: usize) -> Option<usize> {
    match requested.checked_add(HEADER_SIZE + ALIGN_MASK) {
        Some(padded) => Some(padded & !ALIGN_MASK),
        None => None,
    }
}
