//! Heap Configuration
//!
//! Layout constants shared by every heap instance, plus the small
//! runtime knob set carried by each [`Heap`](crate::mm::Heap).
//!
//! # Block Layout
//! ```text
//! allocated:  | size: u32 | payload ...                 |
//! free:       | size: u32 | next: u32 | unused ...      |
//!             ^ block address          ^ block address + size
//! ```
//! The size word always holds the total block size, header included.

/// Size of the in-band size tag that precedes every block.
pub const HEADER_SIZE: usize = core::mem::size_of::<u32>();

/// Size of the next-link word stored after the size tag of a free block.
pub const LINK_SIZE: usize = core::mem::size_of::<u32>();

/// Block sizes and block addresses are multiples of this.
pub const ALIGNMENT: usize = 4;

/// Mask for alignment arithmetic.
pub const ALIGN_MASK: usize = ALIGNMENT - 1;

/// Smallest block that can be linked into the free list.
pub const MIN_BLOCK_SIZE: usize = HEADER_SIZE + LINK_SIZE;

/// Largest arena a heap can manage.
///
/// Header words are `u32`, and `u32::MAX` is reserved as the
/// end-of-list marker in the link word.
pub const MAX_ARENA_SIZE: usize = (u32::MAX as usize) & !ALIGN_MASK;

/// Size of the static region behind the kernel heap (64 KiB).
pub const KERNEL_HEAP_SIZE: usize = 64 * 1024;

const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(MIN_BLOCK_SIZE % ALIGNMENT == 0);

/// Runtime options for a heap instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapConfig {
    /// Zero every freed block with volatile writes before it is
    /// returned to the free list.
    pub scrub_on_free: bool,
}

impl HeapConfig {
    /// Default options: no scrubbing.
    #[inline]
    pub const fn new() -> Self {
        Self {
            scrub_on_free: false,
        }
    }

    /// Options used by the kernel heap.
    ///
    /// Freed memory is scrubbed so stale payloads (keys, buffers) never
    /// leak to the next owner of the block.
    #[inline]
    pub const fn kernel() -> Self {
        Self::new().with_scrub_on_free(true)
    }

    /// Enable or disable scrubbing on free.
    #[inline]
    pub const fn with_scrub_on_free(mut self, enabled: bool) -> Self {
        self.scrub_on_free = enabled;
        self
    }
}
