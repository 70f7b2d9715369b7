//! Stack marker for position tracking

/// Marker representing a position in the stack allocator
///
/// Can be used to rewind the allocator to this position, invalidating
/// all allocations made after the marker was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackMarker {
    pub(super) offset: usize,
}

impl StackMarker {
    /// Offset of the cursor from the start of the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }
}
