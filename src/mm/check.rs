//! Heap Consistency Checks
//!
//! Walks the free list without trusting it and reports every broken
//! invariant it sees. Used by tests after each mutation and by kernel
//! diagnostics.

use bitflags::bitflags;
use log::trace;

use super::address::HeapAddr;
use super::block::Block;
use super::heap::Heap;
use crate::config::{ALIGN_MASK, MIN_BLOCK_SIZE};

bitflags! {
    /// Free-list invariants found broken by [`Heap::check`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Violations: u32 {
        /// A free block does not come after its predecessor.
        const UNSORTED = 1 << 0;
        /// Two free blocks touch and were never merged.
        const ADJACENT = 1 << 1;
        /// A free block starts or ends outside the usable span.
        const OUT_OF_BOUNDS = 1 << 2;
        /// A free block is too small to hold its own header.
        const UNDERSIZED = 1 << 3;
        /// A free block address or size is not a multiple of `ALIGNMENT`.
        const MISALIGNED = 1 << 4;
        /// The walk did not terminate.
        const CYCLE = 1 << 5;
    }
}

/// Snapshot of heap usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Bytes available to allocations, headers included.
    pub usable: usize,
    /// Sum of free block sizes.
    pub free_bytes: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Size of the largest free block, 0 if none.
    pub largest_free: usize,
}

impl HeapStats {
    /// Bytes currently held by allocations, headers included.
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.usable - self.free_bytes
    }
}

impl Heap<'_> {
    /// Verify the free-list invariants.
    ///
    /// Returns the empty set for a healthy heap. The walk stops at the
    /// first block it cannot safely read.
    pub fn check(&self) -> Violations {
        let mut found = Violations::empty();
        let start = self.arena.start();
        let end = self.heap_end();
        let mut prev: Option<(HeapAddr, HeapAddr)> = None;
        let mut cursor = self.head;
        let mut steps = 0;

        while let Some(block) = cursor {
            steps += 1;
            if steps > self.max_free_blocks() {
                found |= Violations::CYCLE;
                break;
            }

            let addr = block.addr();
            if addr < start || addr >= end {
                found |= Violations::OUT_OF_BOUNDS;
                break;
            }
            if !addr.is_aligned() {
                found |= Violations::MISALIGNED;
                break;
            }

            let size = block.size(&self.arena);
            if size < MIN_BLOCK_SIZE {
                found |= Violations::UNDERSIZED;
            }
            if size & ALIGN_MASK != 0 {
                found |= Violations::MISALIGNED;
            }
            if size > end.offset_from(addr) {
                found |= Violations::OUT_OF_BOUNDS;
            }

            if let Some((prev_addr, prev_end)) = prev {
                if addr <= prev_addr {
                    found |= Violations::UNSORTED;
                    // a backwards link is how a cycle starts; stop here
                    break;
                }
                if addr == prev_end {
                    found |= Violations::ADJACENT;
                }
            }

            if size < MIN_BLOCK_SIZE {
                // the link word is not trustworthy
                break;
            }
            prev = Some((addr, addr.add(size)));
            cursor = block.next(&self.arena);
        }

        if !found.is_empty() {
            trace!("check: free list violations {:?}", found);
        }
        found
    }

    /// Usage snapshot.
    pub fn stats(&self) -> HeapStats {
        self.free_blocks().fold(
            HeapStats {
                usable: self.usable,
                ..HeapStats::default()
            },
            |mut stats, block| {
                stats.free_bytes += block.size;
                stats.free_blocks += 1;
                stats.largest_free = stats.largest_free.max(block.size);
                stats
            },
        )
    }

    /// Log the free list at trace level.
    pub fn dump(&self) {
        trace!(
            "heap dump: head {:?}, usable {}",
            self.head.map(Block::addr),
            self.usable
        );
        for (index, block) in self.free_blocks().enumerate() {
            trace!(
                "  [{}] {}..{} ({} bytes)",
                index,
                block.addr,
                block.addr.add(block.size),
                block.size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeapConfig, HEADER_SIZE};

    const REGION_SIZE: usize = 128;
    const USABLE: usize = REGION_SIZE - HEADER_SIZE;

    #[repr(C, align(8))]
    struct Region([u8; REGION_SIZE]);

    #[test]
    fn test_fresh_heap_is_healthy() {
        let mut region = Region([0; REGION_SIZE]);
        let heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        assert_eq!(heap.check(), Violations::empty());
        assert_eq!(
            heap.stats(),
            HeapStats {
                usable: USABLE,
                free_bytes: USABLE,
                free_blocks: 1,
                largest_free: USABLE,
            }
        );
        heap.dump();
    }

    #[test]
    fn test_stats_track_usage() {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let a = heap.alloc(4).unwrap();
        let _b = heap.alloc(4).unwrap();
        heap.dealloc(a).unwrap();

        let stats = heap.stats();
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.used_bytes(), 8);
        assert_eq!(stats.largest_free, USABLE - 16);
        assert_eq!(heap.check(), Violations::empty());
    }

    #[test]
    fn test_detects_adjacent_blocks() {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let start = heap.arena.start();
        let first = Block::at(start);
        let second = Block::at(start.add(16));
        first.make_free(&mut heap.arena, 16, Some(second));
        second.make_free(&mut heap.arena, USABLE - 16, None);

        assert_eq!(heap.check(), Violations::ADJACENT);
    }

    #[test]
    fn test_detects_unsorted_and_cycle() {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let start = heap.arena.start();
        let first = Block::at(start);
        let second = Block::at(start.add(32));
        first.make_free(&mut heap.arena, 8, Some(second));
        second.make_free(&mut heap.arena, 8, Some(first));

        assert!(heap.check().contains(Violations::UNSORTED));
        // the iterator still terminates on a cyclic list
        assert!(heap.free_blocks().count() <= heap.max_free_blocks());
    }

    #[test]
    fn test_detects_bad_sizes() {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let first = Block::at(heap.arena.start());

        heap.arena.write_word(first.addr(), 6);
        let found = heap.check();
        assert!(found.contains(Violations::UNDERSIZED | Violations::MISALIGNED));

        first.make_free(&mut heap.arena, USABLE + 8, None);
        assert_eq!(heap.check(), Violations::OUT_OF_BOUNDS);
    }
}
