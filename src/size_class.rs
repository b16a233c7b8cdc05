//! The static size-class ladder.

use core::alloc::Layout;

#[cfg(feature = "log")]
use log::warn;

/// Block sizes served by [`crate::SizeClassAllocator`], ascending.
///
/// Exposed so callers can round sizes up themselves.
pub const SIZE_CLASSES: [usize; SizeClass::COUNT] = [32, 64, 128, 256];

/// Size classes for slab allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum SizeClass {
    Bytes32 = 32,
    Bytes64 = 64,
    Bytes128 = 128,
    Bytes256 = 256,
}

impl SizeClass {
    pub const COUNT: usize = 4;
    pub const MAX_OBJ_SIZE: usize = 256;

    /// Every class, smallest first.
    pub const ALL: [SizeClass; Self::COUNT] = [
        SizeClass::Bytes32,
        SizeClass::Bytes64,
        SizeClass::Bytes128,
        SizeClass::Bytes256,
    ];

    /// Smallest class that holds `size` bytes, or `None` above
    /// [`SizeClass::MAX_OBJ_SIZE`].
    pub fn from_size(size: usize) -> Option<Self> {
        Some(match size {
            0..=32 => SizeClass::Bytes32,
            33..=64 => SizeClass::Bytes64,
            65..=128 => SizeClass::Bytes128,
            129..=256 => SizeClass::Bytes256,
            _ => {
                warn!("Unsupported allocation size {}", size);
                return None;
            }
        })
    }

    /// Select size class from memory layout
    ///
    /// Blocks are aligned to their own size, so the alignment just acts as a
    /// lower bound on the size.
    pub fn from_layout(layout: Layout) -> Option<Self> {
        Self::from_size(layout.size().max(layout.align()))
    }

    /// The class whose block size is exactly `bytes`.
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            32 => Some(SizeClass::Bytes32),
            64 => Some(SizeClass::Bytes64),
            128 => Some(SizeClass::Bytes128),
            256 => Some(SizeClass::Bytes256),
            _ => None,
        }
    }

    pub const fn size(&self) -> usize {
        *self as usize
    }

    pub const fn to_index(&self) -> usize {
        match self {
            SizeClass::Bytes32 => 0,
            SizeClass::Bytes64 => 1,
            SizeClass::Bytes128 => 2,
            SizeClass::Bytes256 => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}
