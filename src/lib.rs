//! kheap - First-Fit Kernel Heap
//!
//! A dynamic-memory allocator for single-address-space kernels: a heap
//! carved out of one fixed memory region, managed by an explicit free list.
//!
//! # Features
//! - First-fit allocation with in-place splitting
//! - Deallocation with left/right/both-sides coalescing
//! - Double-free and wild-pointer rejection without state changes
//! - External-fragmentation counting and free-list consistency checks
//! - Optional volatile scrubbing of freed memory
//!
//! # Example
//! ```
//! use kheap::{Heap, HeapConfig};
//!
//! let mut region = [0u8; 256];
//! let mut heap = Heap::new(&mut region, HeapConfig::new()).unwrap();
//!
//! let ptr = heap.alloc(24).unwrap();
//! assert_eq!(heap.count_extfrag(usize::MAX), 1);
//! heap.dealloc(ptr).unwrap();
//! assert!(heap.check().is_empty());
//! ```
//!
//! # Concurrency
//! A [`Heap`] is single-owner. Code that shares one heap between execution
//! contexts goes through [`LockedHeap`] or the `heap_*` functions.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod mm;
pub mod security;

pub use config::HeapConfig;
pub use mm::{
    heap_alloc, heap_count_extfrag, heap_dealloc, heap_init, DeallocError, FreeBlock, Heap,
    HeapAddr, HeapStats, InitError, LockedHeap, Violations,
};
