//! General-purpose allocator
//!
//! Small and medium requests go to the system heap. Requests at or above
//! [`GeneralConfig::large_threshold`] are mapped directly from the OS and
//! unmapped on release.
//!
//! # Safety
//!
//! Heap blocks carry a one-word header just below the returned address that
//! stores the padding in front of the block. `release` reads it back to
//! rebuild the exact `Layout` the heap was called with. Mapped blocks report
//! their page-rounded size, which is never below the threshold, so the size
//! alone tells `release` which path produced a block.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::Cell;
use core::mem::size_of;
use std::alloc::System;

#[cfg(feature = "logging")]
use ambit_log::{debug, trace};

use super::{MemoryUsage, RawAllocator, assert_align};
use crate::context::{self, ProfileEvent};
use crate::error::{MemoryError, MemoryResult};
use crate::{Block, syscalls};

const HEADER: usize = size_of::<usize>();

/// Configuration for the general-purpose allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Requests of at least this many bytes bypass the heap and are mapped
    /// from the OS. Must be at least one page.
    pub large_threshold: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            large_threshold: 64 * 1024,
        }
    }
}

impl GeneralConfig {
    /// Map anything of a megabyte or more
    pub fn production() -> Self {
        Self {
            large_threshold: 1024 * 1024,
        }
    }

    /// Map from the first page up, which exercises the VM path constantly
    pub fn debug() -> Self {
        Self {
            large_threshold: syscalls::page_size(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.large_threshold < syscalls::page_size() {
            return Err(MemoryError::invalid_config(format!(
                "large_threshold ({}) must be at least one page ({})",
                self.large_threshold,
                syscalls::page_size()
            )));
        }
        Ok(())
    }
}

/// Heap plus direct mapping for large requests
#[derive(Debug)]
pub struct GeneralAllocator {
    config: GeneralConfig,
    live_bytes: Cell<usize>,
    live_blocks: Cell<usize>,
    mapped_bytes: Cell<usize>,
}

impl GeneralAllocator {
    /// Creates a general allocator with the given threshold
    pub fn with_config(config: GeneralConfig) -> MemoryResult<Self> {
        config.validate()?;

        #[cfg(feature = "logging")]
        debug!(large_threshold = config.large_threshold, "general allocator created");

        Ok(Self {
            config,
            live_bytes: Cell::new(0),
            live_blocks: Cell::new(0),
            mapped_bytes: Cell::new(0),
        })
    }

    /// Creates a general allocator with the default configuration
    pub fn new() -> Self {
        Self {
            config: GeneralConfig::default(),
            live_bytes: Cell::new(0),
            live_blocks: Cell::new(0),
            mapped_bytes: Cell::new(0),
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &GeneralConfig {
        &self.config
    }

    /// Blocks handed out and not yet released
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.get()
    }

    /// Bytes currently held in direct mappings
    pub fn mapped_bytes(&self) -> usize {
        self.mapped_bytes.get()
    }

    fn is_mapped(&self, size: usize) -> bool {
        size >= self.config.large_threshold
    }

    fn heap_layout(size: usize, align: usize) -> Option<(Layout, usize)> {
        let pad = align.max(HEADER);
        let total = size.checked_add(pad)?;
        Layout::from_size_align(total, pad).ok().map(|l| (l, pad))
    }

    fn track_alloc(&self, block: Block, mapped: bool) {
        context::report_profile(ProfileEvent::Alloc(block));
        self.live_bytes.set(self.live_bytes.get() + block.size());
        self.live_blocks.set(self.live_blocks.get() + 1);
        if mapped {
            self.mapped_bytes.set(self.mapped_bytes.get() + block.size());
        }
    }

    fn track_release(&self, block: Block, mapped: bool) {
        context::report_profile(ProfileEvent::Free(block));
        self.live_bytes.set(self.live_bytes.get().saturating_sub(block.size()));
        self.live_blocks.set(self.live_blocks.get().saturating_sub(1));
        if mapped {
            self.mapped_bytes
                .set(self.mapped_bytes.get().saturating_sub(block.size()));
        }
    }

    fn allocate_mapped(&self, size: usize, align: usize) -> Block {
        if align > syscalls::page_size() {
            return Block::null();
        }
        let block = syscalls::reserve_and_commit(None, size);
        if !block.is_null() {
            self.track_alloc(block, true);
        }
        block
    }

    fn allocate_heap(&self, size: usize, align: usize) -> Block {
        let Some((layout, pad)) = Self::heap_layout(size, align) else {
            return Block::null();
        };
        // SAFETY: layout size is at least HEADER, so non-zero
        let base = unsafe { System.alloc(layout) };
        if base.is_null() {
            #[cfg(feature = "logging")]
            trace!(size, align, "heap allocation failed");
            return Block::null();
        }
        // SAFETY: pad <= layout.size() and pad >= HEADER, so the header slot
        // lies inside the allocation
        let user = unsafe {
            let user = base.add(pad);
            user.sub(HEADER).cast::<usize>().write_unaligned(pad);
            user
        };
        let block = Block::new(user, size);
        self.track_alloc(block, false);
        block
    }

    /// # Safety
    /// `block` must be a live heap block of this allocator.
    unsafe fn heap_parts(block: Block) -> (*mut u8, Layout) {
        // SAFETY: heap blocks always carry the padding header
        unsafe {
            let pad = block.ptr().sub(HEADER).cast::<usize>().read_unaligned();
            let layout = Layout::from_size_align_unchecked(block.size() + pad, pad);
            (block.ptr().sub(pad), layout)
        }
    }
}

impl Default for GeneralAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for GeneralAllocator {
    fn allocate(&self, size: usize, align: usize) -> Block {
        assert_align(align);
        if size == 0 {
            return Block::dangling(align);
        }
        if self.is_mapped(size) {
            self.allocate_mapped(size, align)
        } else {
            self.allocate_heap(size, align)
        }
    }

    unsafe fn release(&self, block: Block) {
        if block.is_null() || block.size() == 0 {
            return;
        }
        if self.is_mapped(block.size()) {
            self.track_release(block, true);
            // SAFETY: sizes at or above the threshold only come from mappings.
            // A failed unmap is logged by the syscall layer; the block is
            // unusable either way.
            let _ = unsafe { syscalls::release(block) };
        } else {
            self.track_release(block, false);
            // SAFETY: caller guarantees a live heap block of this allocator
            unsafe {
                let (base, layout) = Self::heap_parts(block);
                System.dealloc(base, layout);
            }
        }
    }

    /// The heap keeps no list of live blocks, so there is nothing to reset.
    /// Outstanding blocks stay valid until released one by one.
    unsafe fn release_all(&self) {
        #[cfg(feature = "logging")]
        if self.live_blocks.get() > 0 {
            debug!(
                live_blocks = self.live_blocks.get(),
                live_bytes = self.live_bytes.get(),
                "release_all on general allocator leaves individual blocks live"
            );
        }
    }

    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        assert_align(align);
        let heap_to_heap = !block.is_null()
            && block.size() > 0
            && new_size > 0
            && !self.is_mapped(block.size())
            && !self.is_mapped(new_size);

        if heap_to_heap {
            // SAFETY: live heap block; realloc keeps layout.align() and the
            // header prefix is part of the copied bytes
            unsafe {
                let (base, layout) = Self::heap_parts(block);
                let pad = layout.align();
                let Some(total) = new_size.checked_add(pad) else {
                    return Block::null();
                };
                let new_base = System.realloc(base, layout, total);
                if new_base.is_null() {
                    return Block::null();
                }
                self.track_release(block, false);
                let fresh = Block::new(new_base.add(pad), new_size);
                self.track_alloc(fresh, false);
                return fresh;
            }
        }

        // SAFETY: forwarded caller contract
        unsafe { super::traits::reallocate_by_copy(self, block, new_size, align) }
    }
}

impl MemoryUsage for GeneralAllocator {
    fn used_memory(&self) -> usize {
        self.live_bytes.get()
    }

    fn total_memory(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_requests_use_heap_and_honor_alignment() {
        let alloc = GeneralAllocator::new();
        for align in [1, 8, 64, 4096] {
            let block = alloc.allocate(100, align);
            assert!(!block.is_null());
            assert_eq!(block.size(), 100);
            assert_eq!(block.addr() % align, 0);
            unsafe { alloc.release(block) };
        }
        assert_eq!(alloc.live_blocks(), 0);
        assert_eq!(alloc.used_memory(), 0);
    }

    #[test]
    fn large_requests_are_mapped_and_page_rounded() {
        let config = GeneralConfig {
            large_threshold: syscalls::page_size() * 2,
        };
        let alloc = GeneralAllocator::with_config(config).unwrap();

        let size = config.large_threshold + 10;
        let block = alloc.allocate(size, 16);
        assert!(!block.is_null());
        assert!(block.size() >= size);
        assert_eq!(block.size() % syscalls::page_size(), 0);
        assert_eq!(alloc.mapped_bytes(), block.size());

        unsafe { alloc.release(block) };
        assert_eq!(alloc.mapped_bytes(), 0);
    }

    #[test]
    fn threshold_below_a_page_is_rejected() {
        let err = GeneralAllocator::with_config(GeneralConfig {
            large_threshold: 16,
        })
        .unwrap_err();
        assert_eq!(err.code(), "MEM:CONFIG:INVALID");
    }

    #[test]
    fn reallocate_keeps_contents_across_paths() {
        let config = GeneralConfig::debug();
        let alloc = GeneralAllocator::with_config(config).unwrap();

        let block = alloc.allocate(64, 8);
        unsafe {
            block.as_mut_slice().fill(0x5A);
            let grown = alloc.reallocate(block, 512, 8);
            let prefix = core::slice::from_raw_parts(grown.ptr(), 64);
            assert!(prefix.iter().all(|&b| b == 0x5A));

            let mapped = alloc.reallocate(grown, config.large_threshold * 2, 8);
            assert!(mapped.size() >= config.large_threshold * 2);
            let prefix = core::slice::from_raw_parts(mapped.ptr(), 64);
            assert!(prefix.iter().all(|&b| b == 0x5A));
            assert!(alloc.mapped_bytes() > 0);

            let back = alloc.reallocate(mapped, 32, 8);
            assert_eq!(back.size(), 32);
            assert!(back.as_slice().iter().all(|&b| b == 0x5A));
            alloc.release(back);
        }
        assert_eq!(alloc.live_blocks(), 0);
        assert_eq!(alloc.mapped_bytes(), 0);
    }

    #[test]
    fn zero_size_is_dangling_and_release_is_noop() {
        let alloc = GeneralAllocator::new();
        let block = alloc.allocate(0, 32);
        assert!(!block.is_null());
        assert_eq!(block.size(), 0);
        unsafe { alloc.release(block) };
        assert_eq!(alloc.live_blocks(), 0);
    }
}
