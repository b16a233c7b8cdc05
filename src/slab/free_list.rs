//! Intrusive free list threaded through free blocks.
//!
//! While a block is free its first word holds the link to the next free
//! block. Once popped, the block is plain caller storage again. Nothing
//! outside the slab module ever sees a [`FreeBlock`].

use core::ptr::NonNull;

#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Singly linked LIFO list of free blocks.
pub(crate) struct FreeList {
    head: Option<NonNull<FreeBlock>>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes `block` onto the head of the list.
    ///
    /// # Safety
    ///
    /// `block` must be writable for at least one pointer, aligned for a
    /// pointer, not already on this (or any other) list, and not in use by
    /// a caller.
    pub unsafe fn push(&mut self, block: NonNull<u8>) {
        let node = block.cast::<FreeBlock>();
        // SAFETY: guaranteed by the caller.
        unsafe { node.as_ptr().write(FreeBlock { next: self.head }) };
        self.head = Some(node);
    }

    /// Pops the most recently pushed block.
    pub fn pop(&mut self) -> Option<NonNull<u8>> {
        let node = self.head?;
        // SAFETY: every node on the list was written by `push` and has not
        // been handed out since.
        self.head = unsafe { node.as_ref().next };
        Some(node.cast())
    }

    /// Walks the list. Only meant for tests; it is O(n).
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            count += 1;
            cursor = unsafe { node.as_ref().next };
        }
        count
    }
}
