//! hpalloc: a small-object memory allocator
//!
//! This crate serves fixed-size blocks out of OS-reserved virtual memory,
//! featuring:
//! - Page arena: a bump-pointer reservoir over one anonymous mapping
//! - Fixed-block slab allocator with an intrusive LIFO free list
//! - Size-class router composing one arena and one slab per class
//!
//! None of the allocators are thread safe. Use one instance per thread or
//! wrap it in an external lock.

#![no_std]

#[cfg(test)]
extern crate alloc;

use core::fmt;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Page size assumed when the OS refuses to report one.
pub const DEFAULT_PAGE_SIZE: usize = 0x1000;

/// The error type used for allocation.
///
/// Running out of blocks or pages is not an error: those paths return
/// `None`. An `AllocError` always means the caller broke a contract or the
/// OS refused to map memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid size, alignment or size class.
    InvalidParam,
    /// The OS refused to reserve the requested region.
    NoMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::InvalidParam => f.write_str("invalid allocation parameter"),
            AllocError::NoMemory => f.write_str("failed to reserve memory from the OS"),
        }
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

mod vm;

pub mod arena;
pub use arena::{Arena, MAX_ARENA_BYTES};

pub mod slab;
pub use slab::{FixedBlock, DEFAULT_BLOCK_SIZE, MAX_SCALAR_ALIGN};

pub mod size_class;
pub use size_class::{SizeClass, SIZE_CLASSES};

pub mod size_class_allocator;
pub use size_class_allocator::{SizeClassAllocator, DEFAULT_ARENA_SIZE_PER_CLASS};
