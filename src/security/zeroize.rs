//! Freed-Memory Zeroization
//!
//! Clears heap blocks as they are freed so that a later owner of the
//! same bytes never observes the previous owner's data.
//!
//! # Design
//! - `Zeroize` trait for buffers that can be securely cleared
//! - Volatile writes prevent the compiler from eliding the clear, even
//!   though nothing reads the bytes afterwards

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Trait for buffers that can be securely zeroed.
///
/// Implementations must overwrite every byte in a way that cannot be
/// optimized away.
pub trait Zeroize {
    /// Overwrite this value with zeros.
    fn zeroize(&mut self);
}

impl Zeroize for [u8] {
    fn zeroize(&mut self) {
        // SAFETY: We have a valid mutable reference to the slice
        unsafe {
            volatile_set_memory(self.as_mut_ptr(), 0, self.len());
        }
        compiler_fence(Ordering::SeqCst);
    }
}

/// Volatile memset that cannot be optimized away.
///
/// # Safety
/// - `dst` must be valid for writes of `count` bytes
#[inline]
unsafe fn volatile_set_memory(dst: *mut u8, val: u8, count: usize) {
    for i in 0..count {
        // SAFETY: Caller guarantees dst is valid for count bytes
        unsafe {
            ptr::write_volatile(dst.add(i), val);
        }
    }
}
