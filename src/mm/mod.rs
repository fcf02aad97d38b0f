//! Memory management module
//!
//! Provides:
//! - A first-fit, address-ordered free-list heap over a fixed arena
//! - Block-header bookkeeping with bounds-checked accessors
//! - Fragmentation and consistency introspection
//! - A spinlock-protected kernel heap instance
//!
//! # Security Principles
//! - All header accesses are bounds-checked
//! - Invalid frees are rejected before any state changes
//! - Unsafe code is minimal and audited

mod address;
mod allocator;
mod arena;
mod block;
mod check;
mod error;
mod heap;

#[cfg(test)]
mod tests_prop;

pub use address::HeapAddr;
pub use allocator::{
    heap_alloc, heap_count_extfrag, heap_dealloc, heap_init, heap_size, LockedHeap,
};
pub use check::{HeapStats, Violations};
pub use error::{DeallocError, InitError};
pub use heap::{FreeBlock, FreeBlocks, Heap};
