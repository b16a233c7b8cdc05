//! Page arena backed by a single anonymous mapping.
//!
//! An [`Arena`] reserves one contiguous region up front and hands it out one
//! page at a time through a bump cursor. Pages are never returned
//! individually; the whole region goes back to the OS when the arena drops.

use core::cell::Cell;
use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{debug, error, warn};

use crate::{vm, AllocError, AllocResult};

/// Largest region a single arena may reserve (256 MiB).
pub const MAX_ARENA_BYTES: usize = 256 * 1024 * 1024;

/// Bump-pointer page reservoir.
///
/// The cursor lives in a [`Cell`] so that slabs can share one arena through
/// `&Arena`. That also makes the arena `!Sync`.
pub struct Arena {
    base: NonNull<u8>,
    total_bytes: usize,
    page_size: usize,
    total_pages: usize,
    next_page: Cell<usize>,
}

// SAFETY: the arena exclusively owns its mapping; moving it to another
// thread moves that ownership with it. It stays `!Sync` because of the cursor.
unsafe impl Send for Arena {}

impl Arena {
    /// Reserves `size_in_bytes` of read/write memory.
    ///
    /// Fails with [`AllocError::InvalidParam`] if the size is zero, larger
    /// than [`MAX_ARENA_BYTES`] or not a multiple of the OS page size, and
    /// with [`AllocError::NoMemory`] if the mapping itself fails.
    pub fn new(size_in_bytes: usize) -> AllocResult<Self> {
        let page_size = vm::page_size();

        if size_in_bytes == 0
            || size_in_bytes > MAX_ARENA_BYTES
            || size_in_bytes % page_size != 0
        {
            warn!(
                "arena: invalid size {:#x} (page size {:#x}, max {:#x})",
                size_in_bytes, page_size, MAX_ARENA_BYTES
            );
            return Err(AllocError::InvalidParam);
        }

        let base = vm::reserve(size_in_bytes).inspect_err(|_| {
            error!("arena: mmap of {:#x} bytes failed", size_in_bytes);
        })?;

        debug!(
            "arena: reserved {:#x} bytes at {:#x} ({} pages)",
            size_in_bytes,
            base.as_ptr() as usize,
            size_in_bytes / page_size
        );

        Ok(Self {
            base,
            total_bytes: size_in_bytes,
            page_size,
            total_pages: size_in_bytes / page_size,
            next_page: Cell::new(0),
        })
    }

    /// Hands out the next unused page, or `None` once every page is taken.
    pub fn alloc_page(&self) -> Option<NonNull<u8>> {
        let index = self.next_page.get();
        if index >= self.total_pages {
            return None;
        }

        // SAFETY: index < total_pages, so the offset stays inside the mapping.
        let page =
            unsafe { NonNull::new_unchecked(self.base.as_ptr().add(index * self.page_size)) };
        self.next_page.set(index + 1);

        if index + 1 == self.total_pages {
            debug!(
                "arena: last page handed out from region at {:#x}",
                self.base.as_ptr() as usize
            );
        }
        Some(page)
    }

    /// Number of pages handed out so far.
    pub fn pages_allocated(&self) -> usize {
        self.next_page.get()
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn remaining_pages(&self) -> usize {
        self.total_pages - self.next_page.get()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Whether `addr` falls inside a page this arena has already handed out.
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.base.as_ptr() as usize;
        let end = start + self.next_page.get() * self.page_size;
        addr >= start && addr < end
    }

    /// Offset of `addr` from the start of the region, if it lies in a handed
    /// out page.
    pub(crate) fn offset_of(&self, addr: usize) -> Option<usize> {
        if self.contains(addr) {
            Some(addr - self.base.as_ptr() as usize)
        } else {
            None
        }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: base/total_bytes describe the mapping made in `new`, and the
        // borrow checker guarantees no slab borrowing this arena is still alive.
        if !unsafe { vm::release(self.base, self.total_bytes) } {
            error!(
                "arena: munmap of {:#x} bytes at {:#x} failed",
                self.total_bytes,
                self.base.as_ptr() as usize
            );
        }
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("page_size", &self.page_size)
            .field("total_pages", &self.total_pages)
            .field("pages_allocated", &self.next_page.get())
            .finish()
    }
}
