//! Virtual memory primitive used by the stack and arena allocators
//!
//! Two operations cross the OS boundary: reserve-and-commit a page-rounded
//! region, and release it. A denied request comes back as a null [`Block`];
//! nothing here panics on exhaustion.
//!
//! # Architecture
//!
//! - **direct.rs** - platform wrappers (mmap, VirtualAlloc, std::alloc fallback)

mod direct;

use std::io;
use std::sync::OnceLock;

#[cfg(feature = "logging")]
use ambit_log::{log_error, trace};

use crate::Block;
use crate::utils::checked_align_up;

/// OS page size, queried once per process
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(direct::system_page_size)
}

/// Round `size` up to a whole number of pages
///
/// `None` when the rounded value does not fit in `usize`.
pub fn round_to_pages(size: usize) -> Option<usize> {
    checked_align_up(size, page_size())
}

/// Reserve and commit at least `size` bytes of zeroed memory
///
/// The returned block is page-aligned and its size is `size` rounded up to the
/// page size. `hint` is a preferred start address the OS may ignore. Returns
/// [`Block::null`] when `size` is zero or the OS denies the request.
pub fn reserve_and_commit(hint: Option<*mut u8>, size: usize) -> Block {
    if size == 0 {
        return Block::null();
    }
    let Some(rounded) = round_to_pages(size) else {
        return Block::null();
    };

    // SAFETY: rounded is non-zero and page-aligned
    match unsafe { direct::map_anonymous(hint, rounded) } {
        Ok(ptr) => {
            #[cfg(feature = "logging")]
            trace!(size = rounded, ptr = ?ptr, "mapped virtual memory");
            Block::new(ptr, rounded)
        }
        Err(err) => {
            #[cfg(feature = "logging")]
            log_error!(err, size = rounded, "virtual memory reservation denied");
            #[cfg(not(feature = "logging"))]
            let _ = err;
            Block::null()
        }
    }
}

/// Give a region obtained from [`reserve_and_commit`] back to the OS
///
/// Releasing the null block is a no-op.
///
/// # Safety
///
/// `block` must be exactly a block returned by [`reserve_and_commit`] that has
/// not been released yet. No pointer into it may be used afterwards.
pub unsafe fn release(block: Block) -> io::Result<()> {
    if block.is_null() {
        return Ok(());
    }

    // SAFETY: caller guarantees block is one live mapping
    let result = unsafe { direct::unmap(block.ptr(), block.size()) };

    #[cfg(feature = "logging")]
    match &result {
        Ok(()) => trace!(size = block.size(), ptr = ?block.ptr(), "unmapped virtual memory"),
        Err(err) => {
            log_error!(err, size = block.size(), "virtual memory release failed");
        }
    }

    result
}
