//! Stack allocator configuration

/// Configuration for stack allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for released memory (for debugging)
    pub release_pattern: Option<u8>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            release_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl StackConfig {
    /// Production configuration - no fill patterns
    #[must_use]
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            release_pattern: None,
        }
    }

    /// Debug configuration - poison fresh and released memory
    #[must_use]
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xCC),
            release_pattern: Some(0xDD),
        }
    }
}
