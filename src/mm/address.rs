//! Heap Address Type
//!
//! A type-safe wrapper for addresses handed out by the heap, so that
//! block addresses and payload pointers are never mixed up with plain
//! byte counts.
//!
//! # Security Properties
//! - Heap addresses cannot be dereferenced directly
//! - Conversion to a raw pointer requires an explicit unsafe call
//! - Alignment helpers use the heap's block alignment

use core::fmt;

use crate::config::ALIGN_MASK;

/// An address inside (or claimed to be inside) a heap arena.
///
/// This is what [`Heap::alloc`](super::Heap::alloc) returns and what
/// [`Heap::dealloc`](super::Heap::dealloc) takes back. Callers treat it as
/// an opaque token and must hand it back unmodified.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct HeapAddr(usize);

impl HeapAddr {
    /// The null address. Never returned by a successful allocation.
    pub const NULL: Self = Self(0);

    /// Create a heap address from a raw value.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Create a heap address from a pointer.
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if this is the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address is block-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & ALIGN_MASK == 0
    }

    /// Align the address down to the block alignment.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !ALIGN_MASK)
    }

    /// Align the address up to the block alignment.
    ///
    /// Returns `None` if rounding up would overflow.
    #[inline]
    pub const fn align_up(self) -> Option<Self> {
        match self.0.checked_add(ALIGN_MASK) {
            Some(addr) => Some(Self(addr & !ALIGN_MASK)),
            None => None,
        }
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Add an offset that is known to stay inside the arena.
    #[inline]
    pub(crate) const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }

    /// Subtract an offset, returning `None` on underflow.
    #[inline]
    pub const fn checked_sub(self, offset: usize) -> Option<Self> {
        match self.0.checked_sub(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Distance in bytes from `base` up to this address.
    ///
    /// The caller must ensure `base <= self`.
    #[inline]
    pub(crate) const fn offset_from(self, base: Self) -> usize {
        debug_assert!(base.0 <= self.0);
        self.0 - base.0
    }

    /// Convert to a raw pointer.
    ///
    /// # Safety
    /// The caller must ensure the address belongs to a live allocation.
    #[inline]
    pub const unsafe fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// Convert to a mutable raw pointer.
    ///
    /// # Safety
    /// The caller must ensure the address belongs to a live allocation
    /// that it owns.
    #[inline]
    pub const unsafe fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapAddr({:#x})", self.0)
    }
}

impl fmt::Display for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
