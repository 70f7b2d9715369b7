//! Process-wide memory configuration
//!
//! Installed once with [`init`]. Each thread reads it when its allocator
//! context is first touched, so threads that already seeded their context
//! keep the configuration they started with.

use std::sync::OnceLock;

#[cfg(feature = "logging")]
use ambit_log::info;

use crate::allocator::{ArenaConfig, GeneralConfig};
use crate::error::{MemoryError, MemoryResult};

/// Allocator every thread's context stack is seeded with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedAllocator {
    /// Plain general-purpose allocator
    #[default]
    General,
    /// General-purpose allocator wrapped in leak tracking
    LeakTracking,
}

/// Memory subsystem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Configuration of the seed general-purpose allocator
    pub general: GeneralConfig,

    /// Configuration of the per-thread scratch arena
    pub scratch: ArenaConfig,

    /// What sits at the bottom of each thread's context stack
    pub default_allocator: SeedAllocator,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            scratch: ArenaConfig::scratch(),
            default_allocator: SeedAllocator::General,
        }
    }
}

impl MemoryConfig {
    /// Large threshold of a megabyte, untracked seed
    pub fn production() -> Self {
        Self {
            general: GeneralConfig::production(),
            ..Self::default()
        }
    }

    /// Page-sized large threshold and a leak-tracking seed
    pub fn debug() -> Self {
        Self {
            general: GeneralConfig::debug(),
            scratch: ArenaConfig::scratch(),
            default_allocator: SeedAllocator::LeakTracking,
        }
    }

    /// Validate every nested configuration
    pub fn validate(&self) -> MemoryResult<()> {
        self.general.validate()?;
        self.scratch.validate()?;
        Ok(())
    }
}

static CONFIG: OnceLock<MemoryConfig> = OnceLock::new();

/// Install the process-wide configuration
///
/// # Errors
///
/// - [`MemoryError::InvalidConfig`] when `config` does not validate
/// - [`MemoryError::AlreadyInitialized`] on every call after the first
///   successful one
pub fn init(config: MemoryConfig) -> MemoryResult<()> {
    config.validate()?;
    CONFIG
        .set(config)
        .map_err(|_| MemoryError::AlreadyInitialized)?;

    #[cfg(feature = "logging")]
    info!(
        large_threshold = config.general.large_threshold,
        scratch_bucket = config.scratch.initial_bucket_size,
        seed = ?config.default_allocator,
        "memory subsystem initialized"
    );
    Ok(())
}

/// The installed configuration, or the default when [`init`] was never called
pub fn config() -> MemoryConfig {
    CONFIG.get().copied().unwrap_or_default()
}

/// Whether [`init`] has succeeded
pub fn is_initialized() -> bool {
    CONFIG.get().is_some()
}
