//! Security Primitives Module
//!
//! Provides the memory-hygiene helpers used by the heap:
//! - Volatile zeroization of freed blocks
//!
//! # Security Properties
//! - Scrubbed memory is cleared using volatile writes to prevent optimization

pub mod zeroize;

pub use zeroize::Zeroize;
