//! Fixed-size block allocator bound to one arena.

use core::ptr::NonNull;

use super::slab_cache::{SlabCache, DEFAULT_BLOCK_SIZE};
use crate::arena::Arena;
use crate::AllocResult;

/// Serves blocks of one size from pages of a borrowed [`Arena`].
///
/// The arena is borrowed, not owned, so it always outlives the allocator.
/// Freed blocks are reused last-in first-out. When the arena runs dry and
/// every block is out, [`FixedBlock::allocate`] returns `None` until
/// something is handed back.
pub struct FixedBlock<'a> {
    cache: SlabCache,
    arena: &'a Arena,
}

impl<'a> FixedBlock<'a> {
    /// Creates an allocator for `block_size`-byte blocks and pulls its first
    /// page from `arena`.
    ///
    /// `block_size` must hold a pointer, be a multiple of
    /// [`MAX_SCALAR_ALIGN`](super::MAX_SCALAR_ALIGN) and fit in one page;
    /// otherwise this fails with [`AllocError::InvalidParam`](crate::AllocError::InvalidParam).
    pub fn new(arena: &'a Arena, block_size: usize) -> AllocResult<Self> {
        let mut cache = SlabCache::new(block_size, arena.page_size())?;
        cache.refill(arena);
        Ok(Self { cache, arena })
    }

    /// Same as [`FixedBlock::new`] with [`DEFAULT_BLOCK_SIZE`].
    pub fn with_default_block_size(arena: &'a Arena) -> AllocResult<Self> {
        Self::new(arena, DEFAULT_BLOCK_SIZE)
    }

    /// Returns a free block, or `None` if both the free list and the arena
    /// are exhausted.
    pub fn allocate(&mut self) -> Option<NonNull<u8>> {
        self.cache.alloc_object(self.arena)
    }

    /// Hands a block back. O(1).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`FixedBlock::allocate`] on this
    /// allocator and must not have been deallocated since. Neither condition
    /// is checked; breaking them corrupts the free list.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded to the caller.
        unsafe { self.cache.dealloc_object(ptr) };
    }

    pub fn block_size(&self) -> usize {
        self.cache.block_size()
    }

    pub fn blocks_per_page(&self) -> usize {
        self.arena.page_size() / self.cache.block_size()
    }

    /// The arena this allocator draws pages from.
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::MAX_SCALAR_ALIGN;
    use crate::AllocError;
    use alloc::collections::BTreeSet;
    use alloc::vec::Vec;

    const BLOCK_SIZE: usize = 64;

    fn page() -> usize {
        crate::vm::page_size()
    }

    #[test]
    fn test_alloc_and_dealloc_single_block() {
        let arena = Arena::new(page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();

        let block = allocator.allocate().unwrap();
        unsafe { allocator.deallocate(block) };
    }

    #[test]
    fn test_construction_refills_once() {
        let arena = Arena::new(4 * page()).unwrap();
        let allocator = FixedBlock::with_default_block_size(&arena).unwrap();
        assert_eq!(allocator.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(arena.pages_allocated(), 1);
    }

    #[test]
    fn test_rejects_bad_block_sizes() {
        let arena = Arena::new(page()).unwrap();
        assert_eq!(
            FixedBlock::new(&arena, 0).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            FixedBlock::new(&arena, 4).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            FixedBlock::new(&arena, MAX_SCALAR_ALIGN + MAX_SCALAR_ALIGN / 2).err(),
            Some(AllocError::InvalidParam)
        );
        // Rejected before any page is taken.
        assert_eq!(arena.pages_allocated(), 0);
    }

    #[test]
    fn test_allocate_multiple_blocks() {
        let arena = Arena::new(4 * page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();

        let mut blocks = BTreeSet::new();
        for _ in 0..200 {
            let ptr = allocator.allocate().unwrap();
            let addr = ptr.as_ptr() as usize;
            assert_eq!(addr % BLOCK_SIZE, 0);
            assert!(arena.contains(addr));
            assert!(blocks.insert(addr));
        }
    }

    #[test]
    fn test_exhaust_allocator_returns_none() {
        let arena = Arena::new(page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();
        assert_eq!(allocator.blocks_per_page(), page() / BLOCK_SIZE);

        for _ in 0..page() / BLOCK_SIZE {
            assert!(allocator.allocate().is_some());
        }
        assert!(allocator.allocate().is_none());
        assert!(allocator.allocate().is_none());
    }

    #[test]
    fn test_reuse_deallocated_block() {
        let arena = Arena::new(page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();

        let a = allocator.allocate().unwrap();
        unsafe { allocator.deallocate(a) };
        let b = allocator.allocate().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_exhaustion_recovers_after_free() {
        let arena = Arena::new(page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();

        let mut blocks = Vec::new();
        while let Some(block) = allocator.allocate() {
            blocks.push(block);
        }

        let last = blocks.pop().unwrap();
        unsafe { allocator.deallocate(last) };
        assert_eq!(allocator.allocate(), Some(last));
        assert!(allocator.allocate().is_none());
    }

    #[test]
    fn test_blocks_hold_caller_data() {
        let arena = Arena::new(page()).unwrap();
        let mut allocator = FixedBlock::new(&arena, BLOCK_SIZE).unwrap();

        let blocks: Vec<_> = (0..8).map(|_| allocator.allocate().unwrap()).collect();
        for (i, block) in blocks.iter().enumerate() {
            unsafe { core::ptr::write_bytes(block.as_ptr(), i as u8, BLOCK_SIZE) };
        }
        for (i, block) in blocks.iter().enumerate() {
            let bytes = unsafe { core::slice::from_raw_parts(block.as_ptr(), BLOCK_SIZE) };
            assert!(bytes.iter().all(|&b| b == i as u8));
        }
    }

    #[test]
    fn test_shared_arena() {
        let arena = Arena::new(4 * page()).unwrap();
        let mut small = FixedBlock::new(&arena, 32).unwrap();
        let mut large = FixedBlock::new(&arena, 256).unwrap();
        assert_eq!(arena.pages_allocated(), 2);

        let a = small.allocate().unwrap().as_ptr() as usize;
        let b = large.allocate().unwrap().as_ptr() as usize;
        // Each slab carves its own page.
        assert_ne!(a / page(), b / page());
    }
}
