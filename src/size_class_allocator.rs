//! Size-class router.
//!
//! [`SizeClassAllocator`] owns one [`Arena`] and one slab per rung of the
//! size-class ladder and routes each request to the smallest class that fits.
//! Returned memory carries no class tag: the caller keeps the class size it
//! was given and passes it back on deallocation.

use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{debug, warn};

use crate::arena::Arena;
use crate::size_class::SizeClass;
use crate::slab::slab_cache::SlabCache;
use crate::{AllocError, AllocResult};

/// Arena size used by [`SizeClassAllocator::new`] (1 MiB per class).
pub const DEFAULT_ARENA_SIZE_PER_CLASS: usize = 1 << 20;

/// Small-object allocator over the static ladder in [`crate::SIZE_CLASSES`].
///
/// Slab `i` only ever draws pages from arena `i`. The slabs are stored as
/// bare caches next to the arenas and receive their arena on every call, so
/// there is no self-borrow to manage.
pub struct SizeClassAllocator {
    // Field order is drop order: the caches point into arena memory and must
    // go first.
    caches: [SlabCache; SizeClass::COUNT],
    arenas: [Arena; SizeClass::COUNT],
}

// SAFETY: every page and block reachable from the caches lives in the owned
// arenas, so the whole allocator can move between threads as one unit.
unsafe impl Send for SizeClassAllocator {}

impl SizeClassAllocator {
    /// Builds the allocator with [`DEFAULT_ARENA_SIZE_PER_CLASS`].
    pub fn new() -> AllocResult<Self> {
        Self::with_arena_size(DEFAULT_ARENA_SIZE_PER_CLASS)
    }

    /// Builds one arena of `arena_size_per_class` bytes and one slab for each
    /// class, smallest first.
    ///
    /// Fails with the first arena error. Arenas already mapped at that point
    /// are released again.
    pub fn with_arena_size(arena_size_per_class: usize) -> AllocResult<Self> {
        let arenas = [
            Arena::new(arena_size_per_class)?,
            Arena::new(arena_size_per_class)?,
            Arena::new(arena_size_per_class)?,
            Arena::new(arena_size_per_class)?,
        ];

        let mut caches = SizeClass::ALL.map(SlabCache::for_class);
        for (cache, arena) in caches.iter_mut().zip(arenas.iter()) {
            cache.refill(arena);
        }

        debug!(
            "size class allocator: {} classes, {:#x} bytes of arena each",
            SizeClass::COUNT,
            arena_size_per_class
        );

        Ok(Self { caches, arenas })
    }

    /// Allocates a block for `size` bytes.
    ///
    /// On success returns the block (or `None` if that class has run out of
    /// memory) together with the class size the caller must hand back to
    /// [`SizeClassAllocator::deallocate`]. Sizes above
    /// [`SizeClass::MAX_OBJ_SIZE`] fail with [`AllocError::InvalidParam`].
    pub fn allocate(&mut self, size: usize) -> AllocResult<(Option<NonNull<u8>>, usize)> {
        let size_class = SizeClass::from_size(size).ok_or(AllocError::InvalidParam)?;
        Ok((self.allocate_class(size_class), size_class.size()))
    }

    /// Allocates one block of `size_class` directly.
    pub fn allocate_class(&mut self, size_class: SizeClass) -> Option<NonNull<u8>> {
        let index = size_class.to_index();
        self.caches[index].alloc_object(&self.arenas[index])
    }

    /// Returns `ptr` to the slab for `class_size`.
    ///
    /// Fails with [`AllocError::InvalidParam`] if `class_size` is not on the
    /// ladder, or if `ptr` is not a block boundary inside that class's arena.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`SizeClassAllocator::allocate`] on this
    /// allocator with the same class size and must not already be free.
    /// Double frees are not detected and corrupt the class's free list.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, class_size: usize) -> AllocResult {
        let Some(size_class) = SizeClass::from_bytes(class_size) else {
            warn!("size class allocator: invalid size class {} on deallocate", class_size);
            return Err(AllocError::InvalidParam);
        };

        let index = size_class.to_index();
        let addr = ptr.as_ptr() as usize;
        match self.arenas[index].offset_of(addr) {
            Some(offset) if crate::is_aligned(offset, size_class.size()) => {}
            _ => {
                warn!(
                    "size class allocator: {:#x} is not a {}-byte block of this allocator",
                    addr, class_size
                );
                return Err(AllocError::InvalidParam);
            }
        }

        // SAFETY: the block lies in this class's arena; the rest of the
        // contract is on the caller.
        unsafe { self.caches[index].dealloc_object(ptr) };
        Ok(())
    }

    /// The arena backing `size_class`.
    pub fn arena(&self, size_class: SizeClass) -> &Arena {
        &self.arenas[size_class.to_index()]
    }
}
