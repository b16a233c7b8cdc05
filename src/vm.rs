//! Thin wrappers over the OS virtual memory calls used by [`crate::Arena`].

use core::ptr::{self, NonNull};

use crate::{AllocError, AllocResult, DEFAULT_PAGE_SIZE};

#[cfg(not(unix))]
compile_error!("hpalloc reserves memory with mmap and supports only unix targets.");

/// OS page size, falling back to [`DEFAULT_PAGE_SIZE`] if `sysconf` fails.
pub(crate) fn page_size() -> usize {
    // Safety: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        size as usize
    }
}

/// Maps `size` bytes of anonymous, private, read/write memory.
///
/// The returned region is page aligned and zero filled.
pub(crate) fn reserve(size: usize) -> AllocResult<NonNull<u8>> {
    // Safety: FFI call to mmap with a null hint and no backing file.
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };

    if addr == libc::MAP_FAILED {
        return Err(AllocError::NoMemory);
    }
    NonNull::new(addr as *mut u8).ok_or(AllocError::NoMemory)
}

/// Unmaps a region obtained from [`reserve`]. Returns `false` if the OS
/// rejected the call.
///
/// # Safety
///
/// `base` and `size` must describe exactly one live mapping returned by
/// [`reserve`], and nothing may touch that memory afterwards.
pub(crate) unsafe fn release(base: NonNull<u8>, size: usize) -> bool {
    // Safety: guaranteed by the caller.
    unsafe { libc::munmap(base.as_ptr() as *mut libc::c_void, size) == 0 }
}
