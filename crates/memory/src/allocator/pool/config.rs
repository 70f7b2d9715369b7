//! Pool allocator configuration

use core::mem::{align_of, size_of};

use crate::error::{MemoryError, MemoryResult};
use crate::utils::checked_align_up;

/// Configuration for pool allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Largest request a slot can serve
    pub slot_size: usize,

    /// Largest alignment a slot can serve
    pub slot_align: usize,

    /// Slots acquired from the backing allocator at once
    pub slots_per_page: usize,

    /// Fill pattern byte for newly allocated slots (for debugging)
    pub alloc_pattern: Option<u8>,

    /// Fill pattern byte for released slots (for debugging)
    pub release_pattern: Option<u8>,
}

impl PoolConfig {
    /// Slots of `slot_size` bytes, word aligned
    pub fn new(slot_size: usize, slots_per_page: usize) -> Self {
        Self {
            slot_size,
            slot_align: align_of::<usize>(),
            slots_per_page,
            alloc_pattern: if cfg!(debug_assertions) { Some(0xBB) } else { None },
            release_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }

    /// Slots sized and aligned for `T`
    pub fn for_type<T>(slots_per_page: usize) -> Self {
        Self {
            slot_size: size_of::<T>().max(1),
            slot_align: align_of::<T>(),
            ..Self::new(size_of::<T>(), slots_per_page)
        }
    }

    /// Override the slot alignment
    #[must_use]
    pub fn with_align(mut self, slot_align: usize) -> Self {
        self.slot_align = slot_align;
        self
    }

    /// Production configuration - no fill patterns
    #[must_use]
    pub fn production(mut self) -> Self {
        self.alloc_pattern = None;
        self.release_pattern = None;
        self
    }

    /// Debug configuration - poison fresh and released slots
    #[must_use]
    pub fn debug(mut self) -> Self {
        self.alloc_pattern = Some(0xBB);
        self.release_pattern = Some(0xDD);
        self
    }

    /// Distance between consecutive slots in a page
    pub fn stride(&self) -> usize {
        self.slot_size.max(1).next_multiple_of(self.slot_align)
    }

    /// Bytes requested from the backing allocator per page
    pub fn page_bytes(&self) -> usize {
        self.stride() * self.slots_per_page
    }

    /// Validate the configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.slot_size == 0 {
            return Err(MemoryError::invalid_config("slot_size must be greater than zero"));
        }
        if !self.slot_align.is_power_of_two() {
            return Err(MemoryError::invalid_alignment(self.slot_align));
        }
        if self.slots_per_page == 0 {
            return Err(MemoryError::invalid_config(
                "slots_per_page must be greater than zero",
            ));
        }
        checked_align_up(self.slot_size, self.slot_align)
            .and_then(|stride| stride.checked_mul(self.slots_per_page))
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(|| MemoryError::size_overflow("pool page size"))?;
        Ok(())
    }
}
