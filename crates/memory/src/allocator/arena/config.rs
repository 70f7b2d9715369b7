//! Arena allocator configuration

use crate::error::{MemoryError, MemoryResult};

/// Configuration for the growing arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size of the first bucket (rounded up to whole pages)
    pub initial_bucket_size: usize,

    /// Each new bucket is at least this many times the previous one
    pub growth_factor: usize,

    /// Keep the first bucket across `release_all` so the next allocation
    /// needs no new reservation
    pub retain_first: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_bucket_size: 64 * 1024,
            growth_factor: 2,
            retain_first: true,
        }
    }
}

impl ArenaConfig {
    /// Arena with the given first bucket size and default growth
    #[must_use]
    pub fn with_initial_size(initial_bucket_size: usize) -> Self {
        Self {
            initial_bucket_size,
            ..Self::default()
        }
    }

    /// Per-thread scratch arena: 4 MiB first bucket
    #[must_use]
    pub fn scratch() -> Self {
        Self {
            initial_bucket_size: 4 * 1024 * 1024,
            growth_factor: 2,
            retain_first: true,
        }
    }

    /// Small buckets that grow slowly and are all returned on reset
    #[must_use]
    pub fn compact() -> Self {
        Self {
            initial_bucket_size: 4096,
            growth_factor: 1,
            retain_first: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> MemoryResult<()> {
        if self.initial_bucket_size == 0 {
            return Err(MemoryError::invalid_config(
                "initial_bucket_size must be greater than zero",
            ));
        }
        if self.growth_factor == 0 {
            return Err(MemoryError::invalid_config(
                "growth_factor must be at least 1",
            ));
        }
        Ok(())
    }
}
