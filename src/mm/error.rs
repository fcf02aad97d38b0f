//! Heap error types.
//!
//! Allocation failure is not an error: [`Heap::alloc`](super::Heap::alloc)
//! returns `None` when no free block is large enough.

use core::fmt;

/// Error type for heap initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The region is empty, inverted, or cannot hold a single free block.
    RegionTooSmall,
    /// The region is larger than a `u32` header word can describe.
    RegionTooLarge,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionTooSmall => write!(f, "heap region too small"),
            Self::RegionTooLarge => write!(f, "heap region too large"),
        }
    }
}

/// Error type for deallocation.
///
/// A rejected deallocation leaves the heap untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeallocError {
    /// The pointer is null.
    NullPointer,
    /// The size tag in front of the pointer lies outside the arena.
    OutOfBounds,
    /// The pointer names memory that is already free, sits inside a free
    /// block, is misaligned, or carries a size tag that cannot be right.
    DoubleFreeOrCorruption,
    /// The heap has not been initialized.
    Uninitialized,
}

impl fmt::Display for DeallocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullPointer => write!(f, "null pointer"),
            Self::OutOfBounds => write!(f, "pointer outside heap arena"),
            Self::DoubleFreeOrCorruption => write!(f, "double free or heap corruption"),
            Self::Uninitialized => write!(f, "heap not initialized"),
        }
    }
}
