//! Kernel Heap
//!
//! A spinlock-protected [`Heap`] over a static region, exposing the four
//! entry points kernel code calls: [`heap_init`], [`heap_alloc`],
//! [`heap_dealloc`] and [`heap_count_extfrag`].
//!
//! # Memory Layout
//! The heap lives in `KERNEL_HEAP_MEMORY`, a static array of
//! `KERNEL_HEAP_SIZE` bytes. This avoids relying on linker symbols; boards
//! that do export `__heap_start`/`__heap_end` can build their own
//! [`LockedHeap`] with [`Heap::from_raw_parts`].
//!
//! # Security Considerations
//! - The region is handed to the heap exactly once, under the lock
//! - Freed blocks are scrubbed (`HeapConfig::kernel`)
//! - Every operation before `heap_init` fails closed

use spin::{Mutex, MutexGuard};

use super::address::HeapAddr;
use super::error::{DeallocError, InitError};
use super::heap::Heap;
use crate::config::{HeapConfig, KERNEL_HEAP_SIZE};

/// A heap shared between execution contexts.
///
/// Empty until initialized. Operations on an empty heap behave as if the
/// heap had no free memory.
pub struct LockedHeap {
    inner: Mutex<Option<Heap<'static>>>,
}

impl LockedHeap {
    /// Create an uninitialized heap.
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Install a heap over `region`, replacing any previous one.
    pub fn init(&self, region: &'static mut [u8], config: HeapConfig) -> Result<(), InitError> {
        let heap = Heap::new(region, config)?;
        *self.inner.lock() = Some(heap);
        Ok(())
    }

    /// Check whether a heap has been installed.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Lock the heap for a sequence of operations that must appear atomic.
    pub fn lock(&self) -> MutexGuard<'_, Option<Heap<'static>>> {
        self.inner.lock()
    }

    /// See [`Heap::alloc`].
    pub fn alloc(&self, size: usize) -> Option<HeapAddr> {
        self.inner.lock().as_mut()?.alloc(size)
    }

    /// See [`Heap::dealloc`].
    pub fn dealloc(&self, ptr: HeapAddr) -> Result<(), DeallocError> {
        self.inner
            .lock()
            .as_mut()
            .ok_or(DeallocError::Uninitialized)?
            .dealloc(ptr)
    }

    /// See [`Heap::count_extfrag`].
    pub fn count_extfrag(&self, threshold: usize) -> usize {
        self.inner
            .lock()
            .as_ref()
            .map_or(0, |heap| heap.count_extfrag(threshold))
    }
}

impl Default for LockedHeap {
    fn default() -> Self {
        Self::empty()
    }
}

/// Kernel heap instance.
static KERNEL_HEAP: LockedHeap = LockedHeap::empty();

/// Static kernel heap memory.
static mut KERNEL_HEAP_MEMORY: [u8; KERNEL_HEAP_SIZE] = [0; KERNEL_HEAP_SIZE];

/// Initialize the kernel heap.
///
/// The first call hands `KERNEL_HEAP_MEMORY` to the heap. Later calls
/// re-seed the same heap; every outstanding allocation becomes invalid,
/// so this is not a runtime reset mechanism.
pub fn heap_init() -> Result<(), InitError> {
    let mut guard = KERNEL_HEAP.lock();
    if let Some(heap) = guard.as_mut() {
        return heap.init();
    }

    // SAFETY:
    // - KERNEL_HEAP_MEMORY is a valid static array
    // - It is only borrowed here, under the heap lock, while no heap
    //   owns it; afterwards the heap holds the only reference
    let region: &'static mut [u8] = unsafe { &mut *core::ptr::addr_of_mut!(KERNEL_HEAP_MEMORY) };
    *guard = Some(Heap::new(region, HeapConfig::kernel())?);
    Ok(())
}

/// Allocate `size` bytes from the kernel heap.
pub fn heap_alloc(size: usize) -> Option<HeapAddr> {
    KERNEL_HEAP.alloc(size)
}

/// Return an allocation to the kernel heap.
pub fn heap_dealloc(ptr: HeapAddr) -> Result<(), DeallocError> {
    KERNEL_HEAP.dealloc(ptr)
}

/// Count kernel heap free blocks smaller than `threshold` bytes.
pub fn heap_count_extfrag(threshold: usize) -> usize {
    KERNEL_HEAP.count_extfrag(threshold)
}

/// Get the size of the kernel heap region.
pub fn heap_size() -> usize {
    KERNEL_HEAP_SIZE
}
