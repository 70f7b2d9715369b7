//! RAII-based stack frame for automatic restoration

#[cfg(feature = "logging")]
use ambit_log::debug;

use super::{StackAllocator, StackMarker};

/// RAII helper for stack-based scoped allocation
///
/// Rewinds the stack to the position it had at construction when dropped,
/// even while unwinding.
pub struct StackFrame<'a> {
    allocator: &'a StackAllocator,
    marker: StackMarker,
}

impl<'a> StackFrame<'a> {
    /// Creates a frame that will rewind to the current position when dropped
    pub fn new(allocator: &'a StackAllocator) -> Self {
        let marker = allocator.mark();
        Self { allocator, marker }
    }

    /// Gets the underlying allocator
    pub fn allocator(&self) -> &'a StackAllocator {
        self.allocator
    }

    /// Position this frame rewinds to
    pub fn marker(&self) -> StackMarker {
        self.marker
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        // Only fails if someone already rewound below this frame
        if let Err(err) = self.allocator.rewind(self.marker) {
            #[cfg(feature = "logging")]
            debug!(error = %err, "stack frame was already rewound past");
            #[cfg(not(feature = "logging"))]
            let _ = err;
        }
    }
}
