//! The unit every allocator hands out

use core::fmt;
use core::ptr::{self, NonNull};

/// A contiguous region returned by an allocator
///
/// A block is a plain `(address, size)` pair. It does not own its memory: it
/// must be given back to the allocator that produced it, with the size the
/// allocator reported.
///
/// The null block (`address == null`, `size == 0`) is how every allocator
/// reports failure. Zero-size requests produce a non-null dangling block of
/// size 0 instead, so that `is_null` always means "allocation failed".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    ptr: *mut u8,
    size: usize,
}

impl Block {
    /// The failure value
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: ptr::null_mut(),
            size: 0,
        }
    }

    /// Wrap a region. A null `ptr` always yields [`Block::null`].
    #[inline]
    pub fn new(ptr: *mut u8, size: usize) -> Self {
        if ptr.is_null() {
            Self::null()
        } else {
            Self { ptr, size }
        }
    }

    /// Zero-size block whose address is `align` itself
    #[inline]
    pub fn dangling(align: usize) -> Self {
        debug_assert!(align.is_power_of_two());
        Self {
            ptr: ptr::without_provenance_mut(align),
            size: 0,
        }
    }

    /// Start address
    #[inline]
    pub const fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Usable size in bytes
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Start address as an integer
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.addr()
    }

    /// One past the last byte
    #[inline]
    pub fn end(&self) -> *mut u8 {
        self.ptr.wrapping_add(self.size)
    }

    /// `true` when this block reports allocation failure
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// `true` for non-null blocks with no usable bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Non-null start address, or `None` for the null block
    #[inline]
    pub fn as_non_null(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.ptr)
    }

    /// Whether `addr` falls inside `[start, end)`
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.addr() && addr - self.addr() < self.size
    }

    /// The block's bytes
    ///
    /// # Safety
    /// The block must be live, non-null and fully initialized.
    #[inline]
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        // SAFETY: caller guarantees the region is live and initialized
        unsafe { core::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// The block's bytes, mutably
    ///
    /// # Safety
    /// The block must be live, non-null and not aliased for `'a`.
    #[inline]
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        // SAFETY: caller guarantees exclusive access to a live region
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Block(null)")
        } else {
            write!(f, "Block({:p}, {} bytes)", self.ptr, self.size)
        }
    }
}
