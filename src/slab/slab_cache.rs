//! Slab cache for a single block size.
//!
//! A `SlabCache` owns the free list of one size class but not the arena its
//! pages come from. Every operation that may need a page takes the arena as
//! an argument, so the cache can sit next to its arena inside a larger
//! allocator without borrowing it.

use core::mem::{align_of, size_of};
use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{trace, warn};

use super::free_list::FreeList;
use crate::arena::Arena;
use crate::size_class::SizeClass;
use crate::{AllocError, AllocResult};

/// Largest alignment any scalar type needs on this platform.
pub const MAX_SCALAR_ALIGN: usize = align_of::<libc::max_align_t>();

/// Block size used by [`super::FixedBlock::with_default_block_size`].
pub const DEFAULT_BLOCK_SIZE: usize = 64;

pub(crate) struct SlabCache {
    free_list: FreeList,
    block_size: usize,
}

impl SlabCache {
    /// Creates an empty cache after checking `block_size` against the
    /// free-list link and the pages it will be carved from.
    pub fn new(block_size: usize, page_size: usize) -> AllocResult<Self> {
        if block_size < size_of::<*mut u8>() {
            warn!(
                "slab cache: block size {} too small for a free-list link",
                block_size
            );
            return Err(AllocError::InvalidParam);
        }
        if block_size % MAX_SCALAR_ALIGN != 0 {
            warn!(
                "slab cache: block size {} not a multiple of {}",
                block_size, MAX_SCALAR_ALIGN
            );
            return Err(AllocError::InvalidParam);
        }
        if block_size > page_size {
            warn!(
                "slab cache: block size {} exceeds page size {}",
                block_size, page_size
            );
            return Err(AllocError::InvalidParam);
        }

        Ok(Self {
            free_list: FreeList::new(),
            block_size,
        })
    }

    /// Creates an empty cache for one rung of the size-class ladder.
    ///
    /// Every ladder size is a power of two between 32 and 256, so it always
    /// passes the checks in [`SlabCache::new`] for any real page size.
    pub const fn for_class(size_class: SizeClass) -> Self {
        Self {
            free_list: FreeList::new(),
            block_size: size_class.size(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Takes one page from `arena` and pushes all of its blocks.
    ///
    /// Blocks are pushed in address order, so the highest block of the newest
    /// page is served first. Returns the number of blocks added, which is 0
    /// once the arena is exhausted.
    pub fn refill(&mut self, arena: &Arena) -> usize {
        let Some(page) = arena.alloc_page() else {
            trace!(
                "slab cache: arena exhausted, no refill for block size {}",
                self.block_size
            );
            return 0;
        };

        let blocks_per_page = arena.page_size() / self.block_size;
        for index in 0..blocks_per_page {
            // SAFETY: the page is fresh from the arena, so every block is
            // unused, inside the page and aligned to MAX_SCALAR_ALIGN.
            unsafe {
                let block = NonNull::new_unchecked(page.as_ptr().add(index * self.block_size));
                self.free_list.push(block);
            }
        }

        trace!(
            "slab cache: refilled {} blocks of {} bytes from page {:#x}",
            blocks_per_page,
            self.block_size,
            page.as_ptr() as usize
        );
        blocks_per_page
    }

    /// Pops a free block, refilling from `arena` at most once.
    pub fn alloc_object(&mut self, arena: &Arena) -> Option<NonNull<u8>> {
        if self.free_list.is_empty() {
            self.refill(arena);
        }
        self.free_list.pop()
    }

    /// Returns a block to the head of the free list.
    ///
    /// # Safety
    ///
    /// `block` must have come from `alloc_object` on this cache and must not
    /// already be free.
    pub unsafe fn dealloc_object(&mut self, block: NonNull<u8>) {
        // SAFETY: forwarded to the caller.
        unsafe { self.free_list.push(block) };
    }

    #[cfg(test)]
    pub fn free_blocks(&self) -> usize {
        self.free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_new_validates_block_size() {
        let page = 4096;
        assert_eq!(
            SlabCache::new(4, page).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            SlabCache::new(MAX_SCALAR_ALIGN + MAX_SCALAR_ALIGN / 2, page).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            SlabCache::new(page * 2, page).err(),
            Some(AllocError::InvalidParam)
        );
        assert!(SlabCache::new(MAX_SCALAR_ALIGN, page).is_ok());
        assert!(SlabCache::new(page, page).is_ok());
    }

    #[test]
    fn test_for_class_passes_validation() {
        for class in SizeClass::ALL {
            let cache = SlabCache::for_class(class);
            assert_eq!(cache.block_size(), class.size());
            assert!(SlabCache::new(class.size(), crate::DEFAULT_PAGE_SIZE).is_ok());
        }
    }

    #[test]
    fn test_refill_carves_whole_page() {
        let arena = Arena::new(crate::vm::page_size()).unwrap();
        let mut cache = SlabCache::new(64, arena.page_size()).unwrap();

        assert_eq!(cache.refill(&arena), arena.page_size() / 64);
        assert_eq!(cache.free_blocks(), arena.page_size() / 64);

        // Arena is spent; refilling again is a no-op.
        assert_eq!(cache.refill(&arena), 0);
        assert_eq!(arena.pages_allocated(), 1);
    }

    #[test]
    fn test_refill_serves_highest_block_first() {
        let arena = Arena::new(crate::vm::page_size()).unwrap();
        let mut cache = SlabCache::new(128, arena.page_size()).unwrap();

        let first = cache.alloc_object(&arena).unwrap().as_ptr() as usize;
        let second = cache.alloc_object(&arena).unwrap().as_ptr() as usize;
        assert_eq!(first - second, 128);
        assert!(crate::is_aligned(first + 128, arena.page_size()));
    }

    #[test]
    fn test_alloc_refills_lazily() {
        let arena = Arena::new(2 * crate::vm::page_size()).unwrap();
        let mut cache = SlabCache::new(256, arena.page_size()).unwrap();
        let per_page = arena.page_size() / 256;

        let mut blocks = Vec::new();
        for _ in 0..per_page {
            blocks.push(cache.alloc_object(&arena).unwrap());
        }
        assert_eq!(arena.pages_allocated(), 1);

        blocks.push(cache.alloc_object(&arena).unwrap());
        assert_eq!(arena.pages_allocated(), 2);

        for block in blocks {
            unsafe { cache.dealloc_object(block) };
        }
        assert_eq!(cache.free_blocks(), 2 * per_page);
    }
}
