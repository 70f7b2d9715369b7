//! Main pool allocator implementation
//!
//! # Safety
//!
//! Pages are acquired from a backing [`Allocator`] and carved into equally
//! sized slots. Slots are named by a global index
//! (`page * slots_per_page + slot`).
//!
//! ## Invariants
//!
//! - The free list is a stack of slot indices kept outside the slots, so
//!   freed memory is never written to by the pool (fill patterns aside)
//! - A slot is either occupied or on the free list, never both
//! - The most recently released slot is handed out next (LIFO reuse)
//! - `release` maps an address back to its page through an ordered index and
//!   rejects anything that is not the start of an occupied slot
//!
//! [`Allocator`]: crate::Allocator

use core::cell::RefCell;
use core::ptr;
use std::collections::BTreeMap;

#[cfg(feature = "logging")]
use ambit_log::{debug, trace};

use super::PoolConfig;
use crate::allocator::{Allocator, MemoryUsage, RawAllocator, assert_align};
use crate::error::MemoryResult;
use crate::Block;

#[derive(Default)]
struct PoolState {
    pages: Vec<Block>,
    /// page start address → page number
    by_address: BTreeMap<usize, usize>,
    /// slot indices, top of stack is handed out next
    free: Vec<usize>,
    occupied: Vec<bool>,
    live: usize,
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Pages acquired from the backing allocator
    pub page_count: usize,
    /// Slots across all pages
    pub slot_count: usize,
    /// Slots currently handed out
    pub live_slots: usize,
    /// Slots on the free list
    pub free_slots: usize,
    /// Bytes held from the backing allocator
    pub reserved_bytes: usize,
}

/// Pool allocator for fixed-size slots
///
/// # Memory Layout
/// ```text
/// page 0: [slot 0][slot 1]...[slot n-1]
/// page 1: [slot n][slot n+1]...
/// free:   [.., 7, 2, 5]  <- top is handed out next
/// ```
pub struct PoolAllocator {
    config: PoolConfig,
    stride: usize,
    backing: Allocator,
    state: RefCell<PoolState>,
}

impl PoolAllocator {
    /// Creates a pool whose pages come from `backing`
    pub fn with_backing(config: PoolConfig, backing: Allocator) -> MemoryResult<Self> {
        config.validate()?;

        #[cfg(feature = "logging")]
        debug!(
            slot_size = config.slot_size,
            slot_align = config.slot_align,
            slots_per_page = config.slots_per_page,
            backing = ?backing.kind(),
            "pool allocator created"
        );

        Ok(Self {
            stride: config.stride(),
            config,
            backing,
            state: RefCell::new(PoolState::default()),
        })
    }

    /// Creates a pool backed by a fresh general-purpose allocator
    pub fn new(config: PoolConfig) -> MemoryResult<Self> {
        Self::with_backing(config, Allocator::general())
    }

    /// The configuration in use
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Largest request a slot can serve
    pub fn slot_size(&self) -> usize {
        self.config.slot_size
    }

    /// The allocator pages come from
    pub fn backing(&self) -> &Allocator {
        &self.backing
    }

    /// Snapshot of the current statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.borrow();
        PoolStats {
            page_count: state.pages.len(),
            slot_count: state.occupied.len(),
            live_slots: state.live,
            free_slots: state.free.len(),
            reserved_bytes: state.pages.iter().map(Block::size).sum(),
        }
    }

    /// Whether `block` starts an occupied slot of this pool
    pub fn owns(&self, block: Block) -> bool {
        let state = self.state.borrow();
        self.slot_index(&state, block.addr())
            .is_some_and(|idx| state.occupied[idx])
    }

    fn slot_index(&self, state: &PoolState, addr: usize) -> Option<usize> {
        let (&start, &page) = state.by_address.range(..=addr).next_back()?;
        let offset = addr - start;
        if offset >= self.config.page_bytes() || offset % self.stride != 0 {
            return None;
        }
        Some(page * self.config.slots_per_page + offset / self.stride)
    }

    fn slot_ptr(&self, state: &PoolState, idx: usize) -> *mut u8 {
        let page = state.pages[idx / self.config.slots_per_page];
        let offset = (idx % self.config.slots_per_page) * self.stride;
        // SAFETY: offset < page_bytes, the size of every page
        unsafe { page.ptr().add(offset) }
    }

    fn grow(&self, state: &mut PoolState) -> bool {
        let page = self
            .backing
            .allocate(self.config.page_bytes(), self.config.slot_align);
        if page.is_null() {
            #[cfg(feature = "logging")]
            trace!(bytes = self.config.page_bytes(), "pool backing allocator denied a page");
            return false;
        }

        let number = state.pages.len();
        let first = number * self.config.slots_per_page;
        state.pages.push(page);
        state.by_address.insert(page.addr(), number);
        state
            .occupied
            .resize(first + self.config.slots_per_page, false);
        // lowest slot of the new page on top
        state
            .free
            .extend((first..first + self.config.slots_per_page).rev());

        #[cfg(feature = "logging")]
        trace!(page = number, slots = self.config.slots_per_page, "pool page added");
        true
    }
}

impl RawAllocator for PoolAllocator {
    /// # Panics
    /// When `size` or `align` exceed the slot geometry.
    fn allocate(&self, size: usize, align: usize) -> Block {
        assert_align(align);
        assert!(
            size <= self.config.slot_size,
            "pool request of {size} bytes exceeds slot size {}",
            self.config.slot_size
        );
        assert!(
            align <= self.config.slot_align,
            "pool request alignment {align} exceeds slot alignment {}",
            self.config.slot_align
        );
        if size == 0 {
            return Block::dangling(align);
        }

        let mut state = self.state.borrow_mut();
        if state.free.is_empty() && !self.grow(&mut state) {
            return Block::null();
        }
        let Some(idx) = state.free.pop() else {
            return Block::null();
        };
        state.occupied[idx] = true;
        state.live += 1;

        let ptr = self.slot_ptr(&state, idx);
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the slot is ours and slot_size <= stride
            unsafe { ptr::write_bytes(ptr, pattern, self.config.slot_size) };
        }
        Block::new(ptr, self.config.slot_size)
    }

    /// # Panics
    /// When `block` is not the start of an occupied slot of this pool.
    unsafe fn release(&self, block: Block) {
        if block.is_null() || block.size() == 0 {
            return;
        }

        let mut state = self.state.borrow_mut();
        let Some(idx) = self.slot_index(&state, block.addr()) else {
            panic!("{block:?} was not allocated by this pool");
        };
        assert!(state.occupied[idx], "double release of pool slot {idx}");

        if let Some(pattern) = self.config.release_pattern {
            // SAFETY: the slot belongs to this pool and is being vacated
            unsafe { ptr::write_bytes(block.ptr(), pattern, self.config.slot_size) };
        }
        state.occupied[idx] = false;
        state.live -= 1;
        state.free.push(idx);
    }

    unsafe fn release_all(&self) {
        let pages = {
            let mut state = self.state.borrow_mut();
            let pages = core::mem::take(&mut state.pages);
            *state = PoolState::default();
            pages
        };
        // newest first, so a LIFO backing such as a stack accepts them
        for page in pages.into_iter().rev() {
            // SAFETY: every page came from the backing allocator and is released once
            unsafe { self.backing.release(page) };
        }
    }

    /// Any size up to the slot size fits the slot it already has.
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        if !block.is_null() && block.size() > 0 && new_size > 0 && new_size <= self.config.slot_size {
            return block;
        }
        // SAFETY: forwarded caller contract
        unsafe { crate::allocator::traits::reallocate_by_copy(self, block, new_size, align) }
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        self.state.borrow().live * self.config.slot_size
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.stats().reserved_bytes)
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        // SAFETY: the pool is going away; no slot can be used afterwards
        unsafe { self.release_all() };
    }
}

impl core::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
