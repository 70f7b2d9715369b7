//! The capability every allocator strategy implements
//!
//! # Safety
//!
//! `RawAllocator` hands out raw [`Block`]s. Implementors must return regions
//! that are at least the requested size, aligned as requested and disjoint
//! from every other live block they produced. Callers must only give a block
//! back to the allocator that produced it, exactly once, with the size the
//! allocator reported.

use core::ptr;

use crate::Block;

/// Allocation capability shared by every strategy
///
/// Failure is reported with [`Block::null`], never with a panic. Panics are
/// reserved for contract violations that a strategy can detect (out-of-order
/// release on a stack, a foreign address handed to a pool).
pub trait RawAllocator {
    /// Allocate at least `size` bytes aligned to `align`
    ///
    /// `align` must be a power of two. A zero `size` yields a dangling,
    /// non-null block of size 0.
    #[track_caller]
    fn allocate(&self, size: usize, align: usize) -> Block;

    /// Give a block back
    ///
    /// # Safety
    /// `block` must have been returned by this allocator and not released yet.
    unsafe fn release(&self, block: Block);

    /// Reset to the freshly constructed state
    ///
    /// # Safety
    /// Every block handed out so far becomes invalid.
    unsafe fn release_all(&self);

    /// Resize `block`, keeping the first `min(old, new)` bytes
    ///
    /// On failure the null block is returned and `block` stays valid.
    ///
    /// # Safety
    /// Same contract as [`RawAllocator::release`] for `block`. `align` must be
    /// the alignment `block` was allocated with.
    #[track_caller]
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        // SAFETY: forwarded caller contract
        unsafe { reallocate_by_copy(self, block, new_size, align) }
    }
}

/// Allocate-copy-release resize shared by strategies that cannot resize in place
///
/// # Safety
/// Same contract as [`RawAllocator::reallocate`].
#[track_caller]
pub(crate) unsafe fn reallocate_by_copy<A: RawAllocator + ?Sized>(
    allocator: &A,
    block: Block,
    new_size: usize,
    align: usize,
) -> Block {
    if block.is_null() || block.size() == 0 {
        return allocator.allocate(new_size, align);
    }
    if new_size == block.size() {
        return block;
    }

    let fresh = allocator.allocate(new_size, align);
    if fresh.is_null() {
        return fresh;
    }
    // SAFETY: both blocks are live and distinct; copy the common prefix
    unsafe {
        ptr::copy_nonoverlapping(block.ptr(), fresh.ptr(), block.size().min(new_size));
        allocator.release(block);
    }
    fresh
}

/// Memory usage reporting
pub trait MemoryUsage {
    /// Bytes currently handed out to callers
    fn used_memory(&self) -> usize;

    /// Bytes this allocator holds from its backing source
    ///
    /// `None` when the strategy does not hold memory of its own.
    fn total_memory(&self) -> Option<usize>;

    /// Bytes still available without asking the backing source
    fn available_memory(&self) -> Option<usize> {
        self.total_memory()
            .map(|total| total.saturating_sub(self.used_memory()))
    }

    /// Used share of the held memory, in percent
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

/// `align` must be a non-zero power of two
#[inline]
#[track_caller]
pub(crate) fn assert_align(align: usize) {
    assert!(
        align.is_power_of_two(),
        "alignment must be a power of two, got {align}"
    );
}
