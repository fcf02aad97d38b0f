//! Heap Arena
//!
//! The fixed byte range `[start, limit)` a heap is allowed to manage.
//!
//! Every header read and write in the crate goes through
//! [`Arena::read_word`] / [`Arena::write_word`]. Those two accessors check
//! bounds and alignment, and derive the access pointer from the arena's
//! base pointer so no address is ever turned back into a pointer by cast.
//!
//! # Safety Audit
//! - The arena is built either from an exclusive slice borrow or from
//!   raw bounds the caller vouches for (`from_raw_parts`)
//! - Word accesses are aligned: `start`, `limit` and every header
//!   address are multiples of `ALIGNMENT`, which equals the word size

use core::marker::PhantomData;
use core::ptr::NonNull;
use core::slice;

use super::address::HeapAddr;
use super::error::InitError;
use crate::config::{ALIGNMENT, MAX_ARENA_SIZE};
use crate::security::Zeroize;

const WORD_SIZE: usize = core::mem::size_of::<u32>();

const _: () = assert!(WORD_SIZE == ALIGNMENT);

/// A bounded, exclusively owned memory region.
pub(crate) struct Arena<'a> {
    /// Pointer to `start`, with provenance over the whole arena.
    base: NonNull<u8>,
    start: HeapAddr,
    limit: HeapAddr,
    _region: PhantomData<&'a mut [u8]>,
}

// SAFETY: The arena has exclusive access to its region, like `&mut [u8]`.
unsafe impl Send for Arena<'_> {}

impl<'a> Arena<'a> {
    /// Create an arena over a borrowed byte region.
    ///
    /// The start is rounded up and the end rounded down to `ALIGNMENT`.
    pub(crate) fn new(region: &'a mut [u8]) -> Result<Self, InitError> {
        let range = region.as_mut_ptr_range();
        // SAFETY: The range comes from a live exclusive borrow that
        // outlives 'a.
        unsafe { Self::from_raw_parts(range.start, range.end) }
    }

    /// Create an arena over `[start, limit)`.
    ///
    /// # Safety
    /// - The whole range must be valid for reads and writes for `'a`
    /// - Nothing else may access the range while the arena exists,
    ///   except through payload pointers the heap hands out
    pub(crate) unsafe fn from_raw_parts(start: *mut u8, limit: *mut u8) -> Result<Self, InitError> {
        let raw_start = HeapAddr::from_ptr(start);
        let aligned_start = raw_start.align_up().ok_or(InitError::RegionTooSmall)?;
        let aligned_limit = HeapAddr::from_ptr(limit).align_down();

        if raw_start.is_null() || aligned_start >= aligned_limit {
            return Err(InitError::RegionTooSmall);
        }
        if aligned_limit.offset_from(aligned_start) > MAX_ARENA_SIZE {
            return Err(InitError::RegionTooLarge);
        }

        // SAFETY: aligned_start < aligned_limit <= limit, so the adjusted
        // pointer stays inside the caller's region.
        let base = unsafe { start.add(aligned_start.offset_from(raw_start)) };

        Ok(Self {
            // SAFETY: base is derived from a non-null start by a forward offset
            base: unsafe { NonNull::new_unchecked(base) },
            start: aligned_start,
            limit: aligned_limit,
            _region: PhantomData,
        })
    }

    /// First managed address.
    #[inline]
    pub(crate) fn start(&self) -> HeapAddr {
        self.start
    }

    /// Exclusive upper bound.
    #[inline]
    pub(crate) fn limit(&self) -> HeapAddr {
        self.limit
    }

    /// Size of the arena in bytes.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.limit.offset_from(self.start)
    }

    /// Check whether `addr` lies in `[start, limit)`.
    #[inline]
    pub(crate) fn contains(&self, addr: HeapAddr) -> bool {
        self.start <= addr && addr < self.limit
    }

    /// Check whether `[addr, addr + len)` lies inside the arena.
    #[inline]
    pub(crate) fn contains_range(&self, addr: HeapAddr, len: usize) -> bool {
        self.contains(addr) && len <= self.limit.offset_from(addr)
    }

    /// Arena-relative offset of `addr`.
    #[inline]
    pub(crate) fn offset_of(&self, addr: HeapAddr) -> usize {
        addr.offset_from(self.start)
    }

    /// Read the header word at `addr`.
    ///
    /// # Panics
    /// Panics if `addr` is misaligned or the word does not fit in the arena.
    pub(crate) fn read_word(&self, addr: HeapAddr) -> u32 {
        let ptr = self.word_ptr(addr);
        // SAFETY: word_ptr checked bounds and alignment
        unsafe { ptr.read() }
    }

    /// Write the header word at `addr`.
    ///
    /// # Panics
    /// Panics if `addr` is misaligned or the word does not fit in the arena.
    pub(crate) fn write_word(&mut self, addr: HeapAddr, value: u32) {
        let ptr = self.word_ptr(addr);
        // SAFETY: word_ptr checked bounds and alignment
        unsafe { ptr.write(value) }
    }

    /// Pointer to `addr`, derived from the arena base.
    ///
    /// Returns `None` if `addr` is outside the arena.
    pub(crate) fn ptr_at(&self, addr: HeapAddr) -> Option<NonNull<u8>> {
        if !self.contains(addr) {
            return None;
        }
        // SAFETY: addr is inside the arena, so the offset stays in bounds
        let ptr = unsafe { self.base.as_ptr().add(self.offset_of(addr)) };
        NonNull::new(ptr)
    }

    /// Zero `[addr, addr + len)` with volatile writes.
    ///
    /// # Panics
    /// Panics if the range is not inside the arena.
    pub(crate) fn scrub(&mut self, addr: HeapAddr, len: usize) {
        assert!(self.contains_range(addr, len), "scrub outside arena");
        // SAFETY: The range is inside the arena, which we own exclusively
        let bytes = unsafe {
            slice::from_raw_parts_mut(self.base.as_ptr().add(self.offset_of(addr)), len)
        };
        bytes.zeroize();
    }

    fn word_ptr(&self, addr: HeapAddr) -> *mut u32 {
        assert!(
            addr.is_aligned() && self.contains_range(addr, WORD_SIZE),
            "header access at {} outside arena",
            addr
        );
        // SAFETY: bounds checked above; base is ALIGNMENT-aligned and the
        // offset is a multiple of ALIGNMENT, so the word pointer is aligned
        unsafe { self.base.as_ptr().add(self.offset_of(addr)).cast::<u32>() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(8))]
    struct Region([u8; 64]);

    #[test]
    fn test_aligns_bounds() {
        let mut region = Region([0; 64]);
        let base = HeapAddr::from_ptr(region.0.as_ptr());
        let arena = Arena::new(&mut region.0[1..63]).unwrap();
        assert_eq!(arena.start(), base.add(4));
        assert_eq!(arena.limit(), base.add(60));
        assert_eq!(arena.len(), 56);
    }

    #[test]
    fn test_rejects_empty_region() {
        let mut region = Region([0; 64]);
        assert_eq!(Arena::new(&mut region.0[..0]).err(), Some(InitError::RegionTooSmall));
        assert_eq!(Arena::new(&mut region.0[1..3]).err(), Some(InitError::RegionTooSmall));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rejects_region_past_link_range() {
        let start = 0x1000usize;
        let limit = start + (1usize << 32);
        // only the bounds are inspected before the size check fails
        let arena = unsafe { Arena::from_raw_parts(start as *mut u8, limit as *mut u8) };
        assert_eq!(arena.err(), Some(InitError::RegionTooLarge));

        let limit = start + MAX_ARENA_SIZE;
        let arena = unsafe { Arena::from_raw_parts(start as *mut u8, limit as *mut u8) };
        assert!(arena.is_ok());
    }

    #[test]
    fn test_word_roundtrip_is_in_place() {
        let mut region = Region([0; 64]);
        let start = HeapAddr::from_ptr(region.0.as_ptr());
        {
            let mut arena = Arena::new(&mut region.0).unwrap();
            arena.write_word(start.add(8), 0xDEAD_BEEF);
            assert_eq!(arena.read_word(start.add(8)), 0xDEAD_BEEF);
        }
        assert_eq!(&region.0[8..12], &0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    #[should_panic]
    fn test_misaligned_word_access_panics() {
        let mut region = Region([0; 64]);
        let start = HeapAddr::from_ptr(region.0.as_ptr());
        let arena = Arena::new(&mut region.0).unwrap();
        arena.read_word(start.add(2));
    }

    #[test]
    fn test_scrub_and_contains() {
        let mut region = Region([0xFF; 64]);
        let start = HeapAddr::from_ptr(region.0.as_ptr());
        {
            let mut arena = Arena::new(&mut region.0).unwrap();
            assert!(arena.contains(start));
            assert!(!arena.contains(start.add(64)));
            assert!(!arena.contains_range(start.add(60), 8));
            assert!(arena.ptr_at(start.add(64)).is_none());
            arena.scrub(start.add(16), 16);
        }
        assert!(region.0[16..32].iter().all(|&b| b == 0));
        assert_eq!(region.0[15], 0xFF);
        assert_eq!(region.0[32], 0xFF);
    }
}
