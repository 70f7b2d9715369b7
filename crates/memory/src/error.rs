//! Error types for ambit-memory
//!
//! Exhaustion on the allocation path is reported with a null [`Block`], not
//! with these errors. `MemoryError` covers the fallible edges around it:
//! building allocators, validating configuration and the `try_*` container
//! operations.
//!
//! [`Block`]: crate::Block

use thiserror::Error;

#[cfg(feature = "logging")]
use ambit_log::warn;

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Invalid alignment: {alignment}")]
    InvalidAlignment { alignment: usize },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    #[error("Capacity overflow: {requested} elements requested")]
    CapacityOverflow { requested: usize },

    // --- Configuration Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Memory configuration is already initialized")]
    AlreadyInitialized,

    // --- Stack Errors ---
    #[error("Invalid stack marker: offset {offset} is above the cursor at {cursor}")]
    InvalidMarker { offset: usize, cursor: usize },
}

impl MemoryError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::InvalidAlignment { .. } => "MEM:ALLOC:ALIGN",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::CapacityOverflow { .. } => "MEM:CONTAINER:CAPACITY",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::AlreadyInitialized => "MEM:CONFIG:INITIALIZED",
            Self::InvalidMarker { .. } => "MEM:STACK:MARKER",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(size, align, "memory allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create invalid alignment error
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    /// Create size overflow error
    pub fn size_overflow(operation: impl Into<String>) -> Self {
        Self::SizeOverflow {
            operation: operation.into(),
        }
    }

    /// Create capacity overflow error
    pub fn capacity_overflow(requested: usize) -> Self {
        Self::CapacityOverflow { requested }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
