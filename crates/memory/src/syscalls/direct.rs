//! Direct system call wrappers for anonymous memory mappings
//!
//! # Safety
//!
//! All functions in this module perform FFI calls to OS primitives:
//! - **Unix**: libc `mmap`, `munmap`, `sysconf`
//! - **Windows**: `VirtualAlloc`, `VirtualFree`, `GetSystemInfo`
//! - **Fallback**: `std::alloc` with page alignment for other targets
//!
//! Callers must unmap every region exactly once, with the size it was mapped
//! with, and must not touch it afterwards.

use std::io;

/// Query the OS page size
pub(super) fn system_page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no memory-safety preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 4096 }
    }

    #[cfg(windows)]
    {
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

        // SAFETY: GetSystemInfo fills the zeroed struct we hand it
        let info = unsafe {
            let mut info: SYSTEM_INFO = core::mem::zeroed();
            GetSystemInfo(&mut info);
            info
        };
        info.dwPageSize as usize
    }

    #[cfg(not(any(unix, windows)))]
    {
        4096
    }
}

/// Map `size` bytes of zeroed, readable and writable memory
///
/// `hint` is advisory: the OS may place the mapping elsewhere.
///
/// # Safety
///
/// `size` must be non-zero and a multiple of the page size. The returned
/// region must be released with [`unmap`] using the same size.
pub(super) unsafe fn map_anonymous(hint: Option<*mut u8>, size: usize) -> io::Result<*mut u8> {
    #[cfg(unix)]
    {
        use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, mmap};

        let addr = hint.unwrap_or(core::ptr::null_mut());

        // SAFETY: anonymous private mapping (fd = -1, offset = 0) without
        // MAP_FIXED, so the hint can never clobber an existing mapping.
        let ptr = unsafe {
            mmap(
                addr.cast::<libc::c_void>(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(ptr.cast::<u8>())
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::memoryapi::VirtualAlloc;
        use winapi::um::winnt::{MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

        let alloc = |addr: *mut u8| {
            // SAFETY: reserve+commit of fresh pages; the OS rejects
            // addresses that are already in use.
            unsafe {
                VirtualAlloc(
                    addr.cast::<winapi::ctypes::c_void>(),
                    size,
                    MEM_COMMIT | MEM_RESERVE,
                    PAGE_READWRITE,
                )
            }
        };

        let mut ptr = alloc(hint.unwrap_or(core::ptr::null_mut()));
        // VirtualAlloc treats the address as mandatory; fall back to any placement
        if ptr.is_null() && hint.is_some() {
            ptr = alloc(core::ptr::null_mut());
        }

        if ptr.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(ptr.cast::<u8>())
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = hint;
        let layout = std::alloc::Layout::from_size_align(size, system_page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: layout has non-zero size per the caller contract
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            Err(io::Error::from(io::ErrorKind::OutOfMemory))
        } else {
            Ok(ptr)
        }
    }
}

/// Unmap a region produced by [`map_anonymous`]
///
/// # Safety
///
/// `ptr` and `size` must describe exactly one live mapping.
pub(super) unsafe fn unmap(ptr: *mut u8, size: usize) -> io::Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: caller guarantees ptr/size come from a live mapping
        let result = unsafe { libc::munmap(ptr.cast::<libc::c_void>(), size) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::memoryapi::VirtualFree;
        use winapi::um::winnt::MEM_RELEASE;

        let _ = size;
        // SAFETY: MEM_RELEASE with size 0 frees the whole reservation that
        // starts at ptr
        let result = unsafe { VirtualFree(ptr.cast::<winapi::ctypes::c_void>(), 0, MEM_RELEASE) };
        if result == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let layout = std::alloc::Layout::from_size_align(size, system_page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: same layout as the matching map_anonymous call
        unsafe { std::alloc::dealloc(ptr, layout) };
        Ok(())
    }
}
