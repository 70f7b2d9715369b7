//! Main stack allocator implementation
//!
//! # Safety
//!
//! The buffer is one virtual memory reservation owned by the allocator and
//! unmapped on drop. Every allocation is laid out as
//!
//! ```text
//! [prev cursor: usize][padding][user bytes ...]
//!                      ^ header sits directly below the user address
//! ```
//!
//! ## Invariants
//!
//! - `cursor <= capacity`, and `peak` is the largest value `cursor` has held
//! - the live blocks form a stack; the top block ends exactly at `cursor`
//! - the word below each live block holds the cursor from before it was
//!   allocated, so releasing restores the exact previous cursor
//! - headers are read and written unaligned; only user addresses are aligned

use core::cell::Cell;
use core::mem::size_of;
use core::ptr;

#[cfg(feature = "logging")]
use ambit_log::{debug, trace};

use super::{StackConfig, StackMarker};
use crate::allocator::{MemoryUsage, RawAllocator, assert_align};
use crate::error::{MemoryError, MemoryResult};
use crate::utils::checked_align_up;
use crate::{Block, syscalls};

const HEADER: usize = size_of::<usize>();

/// Stack allocator that supports LIFO allocation and release
///
/// Memory can only be released in reverse order of allocation. Releasing any
/// block other than the top-most one is a contract violation and panics.
///
/// Only the top block can grow. A container that keeps more than one block
/// here, such as [`Map`](crate::Map), panics once a buried block needs
/// more room.
///
/// # Memory Layout
/// ```text
/// [start]----[alloc1]----[alloc2]----[alloc3]----[cursor]----[free]----[end]
///             <------ allocated ------>           <-- available -->
/// ```
pub struct StackAllocator {
    storage: Block,
    config: StackConfig,
    cursor: Cell<usize>,
    peak: Cell<usize>,
    total_allocs: Cell<usize>,
}

impl StackAllocator {
    /// Creates a stack allocator over a fresh `capacity`-byte reservation
    ///
    /// The reservation is rounded up to whole pages; [`capacity`](Self::capacity)
    /// reports the rounded size.
    pub fn with_config(capacity: usize, config: StackConfig) -> MemoryResult<Self> {
        if capacity == 0 {
            return Err(MemoryError::invalid_config("stack capacity cannot be zero"));
        }

        let storage = syscalls::reserve_and_commit(None, capacity);
        if storage.is_null() {
            return Err(MemoryError::allocation_failed(capacity, syscalls::page_size()));
        }

        #[cfg(feature = "logging")]
        debug!(capacity = storage.size(), "stack allocator created");

        Ok(Self {
            storage,
            config,
            cursor: Cell::new(0),
            peak: Cell::new(0),
            total_allocs: Cell::new(0),
        })
    }

    /// Creates a new stack allocator with default configuration
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Self::with_config(capacity, StackConfig::default())
    }

    /// Creates a production-optimized stack allocator
    pub fn production(capacity: usize) -> MemoryResult<Self> {
        Self::with_config(capacity, StackConfig::production())
    }

    /// Creates a debug-optimized stack allocator
    pub fn debug(capacity: usize) -> MemoryResult<Self> {
        Self::with_config(capacity, StackConfig::debug())
    }

    /// Returns the total capacity of the allocator
    pub fn capacity(&self) -> usize {
        self.storage.size()
    }

    /// Bytes between the start of the buffer and the cursor
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    /// Bytes left above the cursor
    pub fn available(&self) -> usize {
        self.capacity() - self.cursor.get()
    }

    /// Highest cursor position reached so far
    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// Number of successful allocations since construction
    pub fn total_allocations(&self) -> usize {
        self.total_allocs.get()
    }

    /// Whether `block` lies inside this allocator's buffer
    pub fn owns(&self, block: Block) -> bool {
        self.storage.contains(block.addr())
    }

    /// Creates a marker at the current stack position
    pub fn mark(&self) -> StackMarker {
        StackMarker {
            offset: self.cursor.get(),
        }
    }

    /// Rewinds the stack to a previous marker position
    ///
    /// Every block allocated after the marker becomes invalid. Fails when the
    /// marker lies above the current cursor, which means the stack was already
    /// rewound past it.
    pub fn rewind(&self, marker: StackMarker) -> MemoryResult<()> {
        let cursor = self.cursor.get();
        if marker.offset > cursor {
            return Err(MemoryError::InvalidMarker {
                offset: marker.offset,
                cursor,
            });
        }
        self.poison(marker.offset, cursor - marker.offset);
        self.cursor.set(marker.offset);
        Ok(())
    }

    fn offset_of(&self, block: Block) -> usize {
        block.addr() - self.storage.addr()
    }

    fn bump_peak(&self, cursor: usize) {
        if cursor > self.peak.get() {
            self.peak.set(cursor);
        }
    }

    fn poison(&self, offset: usize, len: usize) {
        if let Some(pattern) = self.config.release_pattern {
            // SAFETY: [offset, offset + len) lies below the old cursor, inside storage
            unsafe { ptr::write_bytes(self.storage.ptr().add(offset), pattern, len) };
        }
    }

    #[track_caller]
    fn assert_owned_top(&self, block: Block) -> usize {
        assert!(
            self.owns(block),
            "{block:?} does not belong to this stack allocator"
        );
        let offset = self.offset_of(block);
        let end = offset + block.size();
        let cursor = self.cursor.get();
        assert!(
            end == cursor,
            "out of order release on stack allocator: block ends at offset {end}, top of stack is {cursor}"
        );
        offset
    }
}

impl RawAllocator for StackAllocator {
    fn allocate(&self, size: usize, align: usize) -> Block {
        assert_align(align);
        if size == 0 {
            return Block::dangling(align);
        }

        let base = self.storage.addr();
        let cursor = self.cursor.get();
        let offset = (base + cursor)
            .checked_add(HEADER)
            .and_then(|start| checked_align_up(start, align))
            .map(|addr| addr - base);

        let end = offset.and_then(|offset| offset.checked_add(size).map(|end| (offset, end)));
        let Some((offset, end)) = end.filter(|&(_, end)| end <= self.capacity()) else {
            #[cfg(feature = "logging")]
            trace!(size, align, used = cursor, capacity = self.capacity(), "stack allocator exhausted");
            return Block::null();
        };

        // SAFETY: HEADER <= offset < end <= capacity, so both the header word
        // and the user range are inside storage
        let user = unsafe {
            let user = self.storage.ptr().add(offset);
            user.sub(HEADER).cast::<usize>().write_unaligned(cursor);
            if let Some(pattern) = self.config.alloc_pattern {
                ptr::write_bytes(user, pattern, size);
            }
            user
        };

        self.cursor.set(end);
        self.bump_peak(end);
        self.total_allocs.set(self.total_allocs.get() + 1);
        Block::new(user, size)
    }

    /// # Panics
    /// When `block` is not the most recently allocated live block.
    unsafe fn release(&self, block: Block) {
        if block.is_null() || block.size() == 0 {
            return;
        }
        let offset = self.assert_owned_top(block);
        // SAFETY: the block is ours and live, so its header word is intact
        let previous = unsafe { block.ptr().sub(HEADER).cast::<usize>().read_unaligned() };
        debug_assert!(previous <= offset);
        self.poison(offset, block.size());
        self.cursor.set(previous);
    }

    unsafe fn release_all(&self) {
        self.poison(0, self.cursor.get());
        self.cursor.set(0);
    }

    /// Grows or shrinks the top-most block in place.
    ///
    /// A block below the top keeps its address when shrinking and reports its
    /// original size; growing it would need an out-of-order release and
    /// panics.
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        assert_align(align);
        if block.is_null() || block.size() == 0 {
            return self.allocate(new_size, align);
        }
        if new_size == 0 {
            // SAFETY: forwarded caller contract
            unsafe { self.release(block) };
            return Block::dangling(align);
        }

        assert!(
            self.owns(block),
            "{block:?} does not belong to this stack allocator"
        );
        let offset = self.offset_of(block);
        let is_top = offset + block.size() == self.cursor.get();

        if !is_top {
            assert!(
                new_size <= block.size(),
                "out of order reallocate on stack allocator: only the top block can grow"
            );
            return block;
        }

        let Some(end) = offset.checked_add(new_size).filter(|&end| end <= self.capacity()) else {
            return Block::null();
        };
        if end > self.cursor.get() {
            if let Some(pattern) = self.config.alloc_pattern {
                // SAFETY: the grown tail lies between the old cursor and end
                unsafe { ptr::write_bytes(block.end(), pattern, new_size - block.size()) };
            }
        } else {
            self.poison(end, block.size() - new_size);
        }
        self.cursor.set(end);
        self.bump_peak(end);
        Block::new(block.ptr(), new_size)
    }
}

impl MemoryUsage for StackAllocator {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl Drop for StackAllocator {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        debug!(
            capacity = self.capacity(),
            peak = self.peak(),
            used = self.used(),
            "stack allocator dropped"
        );
        // SAFETY: storage came from reserve_and_commit and is released once
        let _ = unsafe { syscalls::release(self.storage) };
    }
}

impl core::fmt::Debug for StackAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StackAllocator")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("peak", &self.peak())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::StackFrame;

    fn stack() -> StackAllocator {
        StackAllocator::debug(4096).expect("stack allocator")
    }

    #[test]
    fn release_restores_exact_cursor() {
        let stack = stack();
        let before = stack.used();
        let a = stack.allocate(13, 1);
        let after_a = stack.used();
        let b = stack.allocate(40, 64);
        assert_eq!(b.addr() % 64, 0);

        unsafe {
            stack.release(b);
            assert_eq!(stack.used(), after_a);
            stack.release(a);
        }
        assert_eq!(stack.used(), before);
        assert!(stack.peak() >= after_a + 40);
    }

    #[test]
    #[should_panic(expected = "out of order release")]
    fn releasing_below_top_panics() {
        let stack = stack();
        let a = stack.allocate(16, 8);
        let _b = stack.allocate(16, 8);
        unsafe { stack.release(a) };
    }

    #[test]
    fn exhaustion_returns_null_and_keeps_cursor() {
        let stack = stack();
        let big = stack.allocate(stack.capacity() - 64, 8);
        assert!(!big.is_null());
        let used = stack.used();

        let denied = stack.allocate(128, 8);
        assert!(denied.is_null());
        assert_eq!(stack.used(), used);
    }

    #[test]
    fn top_block_grows_in_place() {
        let stack = stack();
        let block = stack.allocate(32, 8);
        unsafe {
            block.as_mut_slice().fill(7);
            let grown = stack.reallocate(block, 256, 8);
            assert_eq!(grown.ptr(), block.ptr());
            assert_eq!(grown.size(), 256);
            assert_eq!(stack.used(), stack.offset_of(grown) + 256);
            assert!(core::slice::from_raw_parts(grown.ptr(), 32).iter().all(|&b| b == 7));
            stack.release(grown);
        }
        assert_eq!(stack.used(), 0);
    }

    #[test]
    #[should_panic(expected = "only the top block can grow")]
    fn growing_buried_block_panics() {
        let stack = stack();
        let a = stack.allocate(32, 8);
        let _b = stack.allocate(32, 8);
        unsafe {
            stack.reallocate(a, 64, 8);
        }
    }

    #[test]
    fn frame_rewinds_on_drop() {
        let stack = stack();
        let keep = stack.allocate(24, 8);
        let used = stack.used();
        {
            let frame = StackFrame::new(&stack);
            assert_eq!(frame.marker().offset(), used);
            for _ in 0..10 {
                assert!(!stack.allocate(50, 16).is_null());
            }
            assert!(stack.used() > used);
        }
        assert_eq!(stack.used(), used);
        unsafe { stack.release(keep) };
    }

    #[test]
    fn frame_below_an_earlier_rewind_leaves_cursor_alone() {
        let stack = stack();
        let start = stack.mark();
        stack.allocate(64, 8);
        {
            let _frame = StackFrame::new(&stack);
            stack.allocate(64, 8);
            stack.rewind(start).unwrap();
        }
        assert_eq!(stack.used(), 0);
        assert!(!stack.allocate(16, 8).is_null());
    }

    #[test]
    fn rewind_past_cursor_is_rejected() {
        let stack = stack();
        let _block = stack.allocate(100, 8);
        let marker = stack.mark();
        unsafe { stack.release_all() };
        let err = stack.rewind(marker).unwrap_err();
        assert_eq!(err.code(), "MEM:STACK:MARKER");
    }
}
