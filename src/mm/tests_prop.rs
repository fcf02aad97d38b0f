#![cfg(test)]
//! Property-based tests for the heap.
//!
//! Random alloc/free sequences are replayed against a heap and the
//! free-list invariants are re-checked after every step:
//!   - conservation: free bytes + live block sizes == usable size
//!   - the free list stays sorted with no adjacent blocks
//!   - an alloc followed by its dealloc restores the free list exactly
//!   - live payloads never overlap

use proptest::prelude::*;
use proptest::sample::Index;

use super::{FreeBlock, Heap, HeapAddr, Violations};
use crate::config::HeapConfig;

const REGION_SIZE: usize = 2048;

#[repr(C, align(8))]
struct Region([u8; REGION_SIZE]);

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    Free(Index),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..160).prop_map(Op::Alloc),
        2 => any::<Index>().prop_map(Op::Free),
    ]
}

fn snapshot(heap: &Heap<'_>) -> Vec<FreeBlock> {
    heap.free_blocks().collect()
}

fn live_bytes(heap: &Heap<'_>, live: &[HeapAddr]) -> usize {
    live.iter()
        .map(|&ptr| heap.allocation_size(ptr).unwrap())
        .sum()
}

proptest! {
    #[test]
    fn invariants_hold_across_random_sequences(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let usable = heap.usable_size();
        let mut live: Vec<HeapAddr> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let before = snapshot(&heap);
                    match heap.alloc(size) {
                        Some(ptr) => {
                            prop_assert!(heap.allocation_size(ptr).unwrap() >= size);
                            live.push(ptr);
                        }
                        None => prop_assert_eq!(snapshot(&heap), before),
                    }
                }
                Op::Free(index) if !live.is_empty() => {
                    let ptr = live.swap_remove(index.index(live.len()));
                    prop_assert_eq!(heap.dealloc(ptr), Ok(()));
                }
                Op::Free(_) => {}
            }

            prop_assert_eq!(heap.check(), Violations::empty());
            prop_assert_eq!(heap.stats().free_bytes + live_bytes(&heap, &live), usable);
        }

        for ptr in live.drain(..) {
            prop_assert_eq!(heap.dealloc(ptr), Ok(()));
        }
        prop_assert_eq!(heap.count_extfrag(usize::MAX), 1);
        prop_assert_eq!(heap.stats().free_bytes, usable);
    }

    #[test]
    fn alloc_then_free_restores_free_list(
        setup in prop::collection::vec((1usize..96, any::<bool>()), 0..24),
        size in 1usize..256,
    ) {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();

        // build a fragmented heap: keep some allocations, free the rest
        let mut freed = Vec::new();
        for (n, keep) in setup {
            if let Some(ptr) = heap.alloc(n) {
                if !keep {
                    freed.push(ptr);
                }
            }
        }
        for ptr in freed {
            heap.dealloc(ptr).unwrap();
        }

        let before = snapshot(&heap);
        if let Some(ptr) = heap.alloc(size) {
            prop_assert_eq!(heap.dealloc(ptr), Ok(()));
        }
        prop_assert_eq!(snapshot(&heap), before);
    }

    #[test]
    fn double_free_is_always_rejected(sizes in prop::collection::vec(1usize..64, 1..16), victim in any::<Index>()) {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::kernel()).unwrap();
        let ptrs: Vec<HeapAddr> = sizes.iter().filter_map(|&n| heap.alloc(n)).collect();
        prop_assume!(!ptrs.is_empty());

        let ptr = ptrs[victim.index(ptrs.len())];
        heap.dealloc(ptr).unwrap();
        let before = snapshot(&heap);
        prop_assert!(heap.dealloc(ptr).is_err());
        prop_assert_eq!(snapshot(&heap), before);
    }

    #[test]
    fn live_payloads_are_disjoint(sizes in prop::collection::vec(1usize..96, 1..24)) {
        let mut region = Region([0; REGION_SIZE]);
        let mut heap = Heap::new(&mut region.0, HeapConfig::new()).unwrap();
        let mut spans: Vec<(usize, usize)> = sizes
            .iter()
            .filter_map(|&n| heap.alloc(n).map(|ptr| (ptr.as_usize(), ptr.as_usize() + n)))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0);
        }
    }
}
