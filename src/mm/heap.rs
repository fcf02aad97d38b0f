//! First-Fit Free-List Heap
//!
//! # Algorithm
//! - **Free list**: singly linked through the headers of free blocks,
//!   kept sorted by ascending address
//! - **Allocation**: first fit; the winning block is split when the
//!   remainder can still hold a free-block header, otherwise handed out whole
//! - **Deallocation**: the block is validated, placed at its sorted
//!   position and merged with whichever neighbours touch it
//!
//! # Invariants
//! - Free-list addresses are strictly increasing
//! - No two free blocks are address-adjacent
//! - Every block's size tag is its total size, header included
//!
//! # Memory Layout
//! ```text
//!  start                                                start + usable
//!  | free 8 |  alloc 8  | free 20  |  alloc 8  |   free ...        |
//!    head ──────────────────▶ ─────────────────────▶ end of list
//! ```

use log::{debug, trace, warn};

use super::address::HeapAddr;
use super::arena::Arena;
use super::block::{block_size_for, Block};
use super::error::{DeallocError, InitError};
use crate::config::{HeapConfig, ALIGN_MASK, HEADER_SIZE, MIN_BLOCK_SIZE};

/// A free block as seen from outside the heap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FreeBlock {
    /// Header address.
    pub addr: HeapAddr,
    /// Total size in bytes, header included.
    pub size: usize,
}

/// A heap over one fixed arena.
///
/// The heap owns its arena for `'a`. All operations take `&mut self` or
/// `&self`, so sharing across execution contexts needs an outer lock
/// such as [`LockedHeap`](super::LockedHeap).
pub struct Heap<'a> {
    pub(super) arena: Arena<'a>,
    pub(super) head: Option<Block>,
    /// Size of the sentinel block laid down by `init`.
    pub(super) usable: usize,
    config: HeapConfig,
}

/// Where a freed block goes in the free list.
struct Placement {
    block: Block,
    size: usize,
    prev: Option<Block>,
    next: Option<Block>,
}

impl<'a> Heap<'a> {
    /// Create and initialize a heap over a borrowed region.
    pub fn new(region: &'a mut [u8], config: HeapConfig) -> Result<Self, InitError> {
        Self::with_arena(Arena::new(region)?, config)
    }

    /// Create and initialize a heap over `[start, limit)`.
    ///
    /// This is the boot path: `start` is typically the end of the kernel
    /// image and `limit` the top of RAM set aside for the heap.
    ///
    /// # Safety
    /// - The range must be valid for reads and writes for `'a`
    /// - Nothing else may touch the range while the heap exists, except
    ///   through payloads the heap hands out
    pub unsafe fn from_raw_parts(
        start: *mut u8,
        limit: *mut u8,
        config: HeapConfig,
    ) -> Result<Self, InitError> {
        // SAFETY: forwarded from the caller
        let arena = unsafe { Arena::from_raw_parts(start, limit)? };
        Self::with_arena(arena, config)
    }

    fn with_arena(arena: Arena<'a>, config: HeapConfig) -> Result<Self, InitError> {
        let mut heap = Self {
            arena,
            head: None,
            usable: 0,
            config,
        };
        heap.init()?;
        Ok(heap)
    }

    /// Seed the free list with one block spanning the arena.
    ///
    /// Calling this again re-initializes the heap. Every outstanding
    /// allocation becomes invalid.
    pub fn init(&mut self) -> Result<(), InitError> {
        let usable = self
            .arena
            .len()
            .checked_sub(HEADER_SIZE)
            .filter(|&usable| usable >= MIN_BLOCK_SIZE)
            .ok_or(InitError::RegionTooSmall)?;

        let sentinel = Block::at(self.arena.start());
        sentinel.make_free(&mut self.arena, usable, None);
        self.head = Some(sentinel);
        self.usable = usable;

        debug!(
            "heap: arena {}..{}, first free block {} bytes at {}",
            self.arena.start(),
            self.arena.limit(),
            usable,
            sentinel.addr()
        );
        Ok(())
    }

    /// Allocate `size` payload bytes.
    ///
    /// Returns the payload address, or `None` if `size` is zero or no free
    /// block is large enough. A failed allocation changes nothing.
    pub fn alloc(&mut self, size: usize) -> Option<HeapAddr> {
        if size == 0 {
            return None;
        }
        let needed = block_size_for(size)?;
        if needed > self.usable {
            trace!("alloc: {} bytes can never fit in {} usable", needed, self.usable);
            return None;
        }

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(block) = cursor {
            let available = block.size(&self.arena);
            if available >= needed {
                let ptr = self.carve(prev, block, available, needed);
                trace!("alloc: {} bytes -> {}", size, ptr);
                return Some(ptr);
            }
            prev = Some(block);
            cursor = block.next(&self.arena);
        }

        trace!("alloc: no free block holds {} bytes", needed);
        None
    }

    /// Take `needed` bytes from the front of the free `block`.
    fn carve(
        &mut self,
        prev: Option<Block>,
        block: Block,
        available: usize,
        needed: usize,
    ) -> HeapAddr {
        let next = block.next(&self.arena);
        let remainder = available - needed;

        let taken = if remainder >= MIN_BLOCK_SIZE {
            let rest = Block::at(block.addr().add(needed));
            rest.make_free(&mut self.arena, remainder, next);
            self.relink(prev, Some(rest));
            needed
        } else {
            // A remainder this small cannot hold a free header, so the
            // caller gets it as slack and the tag covers the whole block.
            self.relink(prev, next);
            available
        };

        block.set_size(&mut self.arena, taken);
        block.payload()
    }

    /// Return the block at `ptr` to the heap.
    ///
    /// `ptr` must come from [`alloc`](Self::alloc) on this heap. Invalid
    /// pointers and double frees are detected where possible and rejected
    /// without touching the heap.
    pub fn dealloc(&mut self, ptr: HeapAddr) -> Result<(), DeallocError> {
        let placement = self.place(ptr).map_err(|err| {
            warn!("dealloc: rejected {}: {}", ptr, err);
            err
        })?;
        self.insert(placement);
        trace!("dealloc: {} released", ptr);
        Ok(())
    }

    /// Validate `ptr` and find its neighbours in the free list.
    fn place(&self, ptr: HeapAddr) -> Result<Placement, DeallocError> {
        if ptr.is_null() {
            return Err(DeallocError::NullPointer);
        }
        let block = Block::from_payload(ptr).ok_or(DeallocError::OutOfBounds)?;
        if !self.arena.contains(block.addr()) {
            return Err(DeallocError::OutOfBounds);
        }
        if !block.addr().is_aligned() {
            trace!("dealloc: misaligned tag at {}", block.addr());
            return Err(DeallocError::DoubleFreeOrCorruption);
        }

        let size = block.size(&self.arena);
        let room = self.heap_end().as_usize().saturating_sub(block.addr().as_usize());
        if size < MIN_BLOCK_SIZE || size & ALIGN_MASK != 0 || size > room {
            trace!("dealloc: implausible tag {} at {}", size, block.addr());
            return Err(DeallocError::DoubleFreeOrCorruption);
        }

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            if node.addr() == block.addr() {
                trace!("dealloc: {} is already a free block", block.addr());
                return Err(DeallocError::DoubleFreeOrCorruption);
            }
            if node.addr() > block.addr() {
                break;
            }
            if block.addr() < node.end(&self.arena) {
                trace!("dealloc: {} lies inside free block {}", block.addr(), node.addr());
                return Err(DeallocError::DoubleFreeOrCorruption);
            }
            prev = Some(node);
            cursor = node.next(&self.arena);
        }

        if let Some(next) = cursor {
            if block.addr().add(size) > next.addr() {
                trace!("dealloc: {} overlaps free block {}", block.addr(), next.addr());
                return Err(DeallocError::DoubleFreeOrCorruption);
            }
        }

        Ok(Placement {
            block,
            size,
            prev,
            next: cursor,
        })
    }

    /// Link a validated block into the free list, merging with neighbours.
    fn insert(&mut self, placement: Placement) {
        let Placement {
            block,
            size,
            prev,
            next,
        } = placement;

        let joins_prev = prev.is_some_and(|prev| prev.end(&self.arena) == block.addr());
        let joins_next = next.is_some_and(|next| block.addr().add(size) == next.addr());

        if self.config.scrub_on_free {
            self.arena.scrub(block.addr(), size);
        }

        match (prev, next) {
            (Some(prev), Some(next)) if joins_prev && joins_next => {
                let merged = prev.size(&self.arena) + size + next.size(&self.arena);
                let after = next.next(&self.arena);
                prev.make_free(&mut self.arena, merged, after);
                self.scrub_header(next);
                trace!("dealloc: {} merged with both neighbours into {}", block.addr(), prev.addr());
            }
            (Some(prev), _) if joins_prev => {
                let merged = prev.size(&self.arena) + size;
                prev.set_size(&mut self.arena, merged);
                trace!("dealloc: {} merged into left neighbour {}", block.addr(), prev.addr());
            }
            (_, Some(next)) if joins_next => {
                let merged = size + next.size(&self.arena);
                let after = next.next(&self.arena);
                block.make_free(&mut self.arena, merged, after);
                self.scrub_header(next);
                self.relink(prev, Some(block));
                trace!("dealloc: {} absorbed right neighbour {}", block.addr(), next.addr());
            }
            _ => {
                block.make_free(&mut self.arena, size, next);
                self.relink(prev, Some(block));
            }
        }
    }

    /// Count free blocks strictly smaller than `threshold` bytes.
    pub fn count_extfrag(&self, threshold: usize) -> usize {
        self.free_blocks()
            .filter(|block| block.size < threshold)
            .count()
    }

    /// Iterate over the free list in address order.
    pub fn free_blocks(&self) -> FreeBlocks<'_, 'a> {
        FreeBlocks {
            arena: &self.arena,
            cursor: self.head,
            budget: self.max_free_blocks(),
        }
    }

    /// Total size of the block owning `ptr`, header included.
    ///
    /// Only meaningful for live allocations; returns `None` if `ptr` cannot
    /// have come from this heap.
    pub fn allocation_size(&self, ptr: HeapAddr) -> Option<usize> {
        let block = Block::from_payload(ptr)?;
        if !block.addr().is_aligned() || !self.arena.contains(block.addr()) {
            return None;
        }
        Some(block.size(&self.arena))
    }

    /// Writable pointer to the payload at `ptr`.
    ///
    /// The pointer is derived from the arena, so it is valid for the
    /// allocation's payload as long as the allocation is live.
    pub fn payload_ptr(&self, ptr: HeapAddr) -> Option<*mut u8> {
        self.arena.ptr_at(ptr).map(|ptr| ptr.as_ptr())
    }

    /// Bytes available to allocations, headers included.
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.usable
    }

    /// One past the last byte any block may cover.
    #[inline]
    pub(super) fn heap_end(&self) -> HeapAddr {
        self.arena.start().add(self.usable)
    }

    /// Upper bound on free-list length, used to stop walks over a
    /// corrupted (cyclic) list.
    #[inline]
    pub(super) fn max_free_blocks(&self) -> usize {
        self.usable / MIN_BLOCK_SIZE + 1
    }

    fn relink(&mut self, prev: Option<Block>, next: Option<Block>) {
        match prev {
            Some(prev) => prev.set_next(&mut self.arena, next),
            None => self.head = next,
        }
    }

    fn scrub_header(&mut self, absorbed: Block) {
        if self.config.scrub_on_free {
            self.arena.scrub(absorbed.addr(), MIN_BLOCK_SIZE);
        }
    }
}

/// Iterator over free blocks, see [`Heap::free_blocks`].
pub struct FreeBlocks<'h, 'a> {
    arena: &'h Arena<'a>,
    cursor: Option<Block>,
    budget: usize,
}

impl Iterator for FreeBlocks<'_, '_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let block = self.cursor?;
        if self.budget == 0 {
            self.cursor = None;
            return None;
        }
        self.budget -= 1;
        self.cursor = block.next(self.arena);
        Some(FreeBlock {
            addr: block.addr(),
            size: block.size(self.arena),
        })
    }
}
