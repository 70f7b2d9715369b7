//! Single-threaded growing arena
//!
//! # Safety
//!
//! - RefCell for bucket list mutation (runtime borrow checking)
//! - Only the last bucket receives bump allocations; earlier buckets are
//!   frozen once superseded
//! - Buckets are virtual memory reservations, released on `release_all`
//!   (all but the first when it is retained) and on drop
//! - `release` never touches memory, so blocks stay valid until reset

use core::cell::{Cell, RefCell};

#[cfg(feature = "logging")]
use ambit_log::{debug, trace};

use super::ArenaConfig;
use crate::allocator::{MemoryUsage, RawAllocator, assert_align};
use crate::error::MemoryResult;
use crate::utils::checked_align_up;
use crate::{Block, syscalls};

/// One reservation and its bump offset
struct Bucket {
    storage: Block,
    used: usize,
}

impl Bucket {
    fn new(storage: Block) -> Self {
        Self { storage, used: 0 }
    }

    /// Address of the next free byte
    fn cursor(&self) -> usize {
        self.storage.addr() + self.used
    }

    fn bump(&mut self, size: usize, align: usize) -> Option<Block> {
        let base = self.storage.addr();
        let start = checked_align_up(base + self.used, align)? - base;
        let end = start.checked_add(size)?;
        if end > self.storage.size() {
            return None;
        }
        self.used = end;
        // SAFETY: start < end <= storage.size()
        let ptr = unsafe { self.storage.ptr().add(start) };
        Some(Block::new(ptr, size))
    }
}

/// Point-in-time arena statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Buckets currently held
    pub bucket_count: usize,
    /// Bytes reserved across all buckets
    pub reserved_bytes: usize,
    /// Bytes bumped past, including alignment padding
    pub used_bytes: usize,
    /// Largest `used_bytes` value observed
    pub peak_used_bytes: usize,
    /// Virtual memory reservations issued since construction
    pub reservations: usize,
}

/// Growing bump allocator
pub struct ArenaAllocator {
    config: ArenaConfig,
    buckets: RefCell<Vec<Bucket>>,
    used: Cell<usize>,
    peak: Cell<usize>,
    reservations: Cell<usize>,
}

impl ArenaAllocator {
    /// Creates an arena; the first bucket is reserved on first use
    pub fn with_config(config: ArenaConfig) -> MemoryResult<Self> {
        config.validate()?;

        #[cfg(feature = "logging")]
        debug!(
            initial_bucket_size = config.initial_bucket_size,
            growth_factor = config.growth_factor,
            "arena allocator created"
        );

        Ok(Self {
            config,
            buckets: RefCell::new(Vec::new()),
            used: Cell::new(0),
            peak: Cell::new(0),
            reservations: Cell::new(0),
        })
    }

    /// Creates an arena with the default configuration
    pub fn new() -> Self {
        Self {
            config: ArenaConfig::default(),
            buckets: RefCell::new(Vec::new()),
            used: Cell::new(0),
            peak: Cell::new(0),
            reservations: Cell::new(0),
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Snapshot of the current statistics
    pub fn stats(&self) -> ArenaStats {
        let buckets = self.buckets.borrow();
        ArenaStats {
            bucket_count: buckets.len(),
            reserved_bytes: buckets.iter().map(|b| b.storage.size()).sum(),
            used_bytes: self.used.get(),
            peak_used_bytes: self.peak.get(),
            reservations: self.reservations.get(),
        }
    }

    /// Size of each bucket, oldest first
    pub fn bucket_sizes(&self) -> Vec<usize> {
        self.buckets.borrow().iter().map(|b| b.storage.size()).collect()
    }

    /// Bytes bumped past, including alignment padding
    pub fn used_bytes(&self) -> usize {
        self.used.get()
    }

    /// Largest `used_bytes` value observed
    pub fn peak_used_bytes(&self) -> usize {
        self.peak.get()
    }

    /// Bytes reserved across all buckets
    pub fn reserved_bytes(&self) -> usize {
        self.buckets.borrow().iter().map(|b| b.storage.size()).sum()
    }

    fn add_used(&self, delta: usize) {
        let used = self.used.get() + delta;
        self.used.set(used);
        if used > self.peak.get() {
            self.peak.set(used);
        }
    }

    fn next_bucket_size(&self, previous: Option<usize>, size: usize, align: usize) -> Option<usize> {
        // buckets are page aligned, so only larger alignments need slack
        let required = if align <= syscalls::page_size() {
            size
        } else {
            size.checked_add(align - 1)?
        };
        let grown = match previous {
            Some(prev) => prev.saturating_mul(self.config.growth_factor),
            None => self.config.initial_bucket_size,
        };
        Some(required.max(grown))
    }
}

impl Default for ArenaAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for ArenaAllocator {
    fn allocate(&self, size: usize, align: usize) -> Block {
        assert_align(align);
        if size == 0 {
            return Block::dangling(align);
        }

        let mut buckets = self.buckets.borrow_mut();
        if let Some(last) = buckets.last_mut() {
            let before = last.used;
            if let Some(block) = last.bump(size, align) {
                let delta = last.used - before;
                drop(buckets);
                self.add_used(delta);
                return block;
            }
        }

        let previous = buckets.last().map(|b| b.storage.size());
        let Some(target) = self.next_bucket_size(previous, size, align) else {
            return Block::null();
        };
        let storage = syscalls::reserve_and_commit(None, target);
        if storage.is_null() {
            #[cfg(feature = "logging")]
            trace!(size, align, bucket = target, "arena could not reserve a new bucket");
            return Block::null();
        }
        self.reservations.set(self.reservations.get() + 1);

        #[cfg(feature = "logging")]
        trace!(bucket = storage.size(), buckets = buckets.len() + 1, "arena bucket added");

        let mut bucket = Bucket::new(storage);
        let block = bucket.bump(size, align).unwrap_or_default();
        let delta = bucket.used;
        buckets.push(bucket);
        drop(buckets);
        self.add_used(delta);
        block
    }

    /// No-op: arena memory is reclaimed only by `release_all` or drop.
    unsafe fn release(&self, _block: Block) {}

    unsafe fn release_all(&self) {
        let mut buckets = self.buckets.borrow_mut();
        let keep = usize::from(self.config.retain_first && !buckets.is_empty());
        for bucket in buckets.drain(keep..) {
            // SAFETY: each bucket storage is one live reservation
            let _ = unsafe { syscalls::release(bucket.storage) };
        }
        if let Some(first) = buckets.first_mut() {
            first.used = 0;
        }
        self.used.set(0);
    }

    /// Extends or shrinks in place when `block` is the most recent
    /// allocation and the last bucket has room.
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        assert_align(align);
        if !block.is_null() && block.size() > 0 && new_size > 0 {
            let mut buckets = self.buckets.borrow_mut();
            if let Some(last) = buckets.last_mut() {
                let offset = block.addr().wrapping_sub(last.storage.addr());
                let is_latest = last.storage.contains(block.addr())
                    && last.cursor() == block.end().addr();
                if is_latest {
                    if let Some(end) = offset
                        .checked_add(new_size)
                        .filter(|&end| end <= last.storage.size())
                    {
                        let before = last.used;
                        last.used = end;
                        drop(buckets);
                        if end >= before {
                            self.add_used(end - before);
                        } else {
                            self.used.set(self.used.get() - (before - end));
                        }
                        return Block::new(block.ptr(), new_size);
                    }
                }
            }
        }

        // SAFETY: forwarded caller contract
        unsafe { crate::allocator::traits::reallocate_by_copy(self, block, new_size, align) }
    }
}

impl MemoryUsage for ArenaAllocator {
    fn used_memory(&self) -> usize {
        self.used_bytes()
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.reserved_bytes())
    }
}

impl Drop for ArenaAllocator {
    fn drop(&mut self) {
        let buckets = self.buckets.get_mut();

        #[cfg(feature = "logging")]
        debug!(
            buckets = buckets.len(),
            peak_used = self.peak.get(),
            reservations = self.reservations.get(),
            "arena allocator dropped"
        );

        for bucket in buckets.drain(..) {
            // SAFETY: each bucket storage is one live reservation
            let _ = unsafe { syscalls::release(bucket.storage) };
        }
    }
}

impl core::fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
