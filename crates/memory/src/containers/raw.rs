//! Typed storage shared by the containers
//!
//! `RawBuf<T>` owns one block from a captured [`Allocator`] and knows how many
//! `T` fit in it. It never tracks which slots are initialized; that is the
//! owning container's job.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};

use crate::allocator::{Allocator, RawAllocator};
use crate::error::{MemoryError, MemoryResult};
use crate::Block;

/// Smallest non-zero capacity a container grows to
pub(crate) const MIN_CAPACITY: usize = 8;

pub(crate) struct RawBuf<T> {
    block: Block,
    allocator: Allocator,
    _marker: PhantomData<T>,
}

impl<T> RawBuf<T> {
    const IS_ZST: bool = size_of::<T>() == 0;

    pub(crate) fn new_in(allocator: Allocator) -> Self {
        Self {
            block: Block::dangling(align_of::<T>()),
            allocator,
            _marker: PhantomData,
        }
    }

    pub(crate) fn try_with_capacity_in(capacity: usize, allocator: Allocator) -> MemoryResult<Self> {
        let mut raw = Self::new_in(allocator);
        if capacity > 0 {
            raw.try_grow_to(capacity)?;
        }
        Ok(raw)
    }

    pub(crate) fn with_capacity_in(capacity: usize, allocator: Allocator) -> Self {
        let mut raw = Self::new_in(allocator);
        if capacity > 0 {
            handle_reserve(raw.try_grow_to(capacity));
        }
        raw
    }

    #[inline]
    pub(crate) fn ptr(&self) -> *mut T {
        self.block.ptr().cast()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        if Self::IS_ZST {
            usize::MAX
        } else {
            self.block.size() / size_of::<T>()
        }
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Make room for `len + additional` elements, growing geometrically
    pub(crate) fn try_reserve(&mut self, len: usize, additional: usize) -> MemoryResult<()> {
        if self.capacity().wrapping_sub(len) >= additional {
            return Ok(());
        }
        let required = len
            .checked_add(additional)
            .ok_or_else(|| MemoryError::capacity_overflow(usize::MAX))?;
        let doubled = self.capacity().saturating_mul(2);
        self.try_grow_to(required.max(doubled).max(MIN_CAPACITY))
    }

    #[inline]
    pub(crate) fn reserve(&mut self, len: usize, additional: usize) {
        if self.capacity().wrapping_sub(len) < additional {
            handle_reserve(self.try_reserve(len, additional));
        }
    }

    /// Make room for exactly `len + additional` elements
    pub(crate) fn try_reserve_exact(&mut self, len: usize, additional: usize) -> MemoryResult<()> {
        if self.capacity().wrapping_sub(len) >= additional {
            return Ok(());
        }
        let required = len
            .checked_add(additional)
            .ok_or_else(|| MemoryError::capacity_overflow(usize::MAX))?;
        self.try_grow_to(required)
    }

    fn try_grow_to(&mut self, capacity: usize) -> MemoryResult<()> {
        if Self::IS_ZST {
            return Err(MemoryError::capacity_overflow(capacity));
        }
        let bytes = capacity
            .checked_mul(size_of::<T>())
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(|| MemoryError::capacity_overflow(capacity))?;
        let align = align_of::<T>();

        let block = if self.block.size() == 0 {
            self.allocator.allocate(bytes, align)
        } else {
            // SAFETY: `self.block` is the live block this allocator returned
            unsafe { self.allocator.reallocate(self.block, bytes, align) }
        };
        if block.is_null() {
            return Err(MemoryError::allocation_failed(bytes, align));
        }
        self.block = block;
        Ok(())
    }
}

impl<T> Drop for RawBuf<T> {
    fn drop(&mut self) {
        if self.block.size() > 0 {
            // SAFETY: the block is live and owned by this buffer
            unsafe { self.allocator.release(self.block) };
        }
    }
}

/// Turn a failed reservation into the standard allocation-failure path
#[inline]
#[track_caller]
pub(crate) fn handle_reserve(result: MemoryResult<()>) {
    match result {
        Ok(()) => {}
        Err(MemoryError::AllocationFailed { size, align }) => match Layout::from_size_align(size, align) {
            Ok(layout) => std::alloc::handle_alloc_error(layout),
            Err(_) => capacity_overflow(),
        },
        Err(_) => capacity_overflow(),
    }
}

#[cold]
#[track_caller]
fn capacity_overflow() -> ! {
    panic!("capacity overflow");
}
