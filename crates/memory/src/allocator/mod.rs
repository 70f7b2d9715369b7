//! Allocator strategies
//!
//! Every strategy implements [`RawAllocator`]. The [`Allocator`] handle wraps
//! one of them behind a reference count and is what containers and the
//! context stack hold.

mod general;
mod handle;
mod tracked;
pub(crate) mod traits;

pub mod arena;
pub mod pool;
pub mod stack;

pub use arena::{ArenaAllocator, ArenaConfig, ArenaStats};
pub use general::{GeneralAllocator, GeneralConfig};
pub use handle::{Allocator, AllocatorKind};
pub use pool::{PoolAllocator, PoolConfig, PoolStats};
pub use stack::{StackAllocator, StackConfig, StackFrame, StackMarker};
pub use tracked::{LeakReport, LeakTrackingAllocator, LeakedBlock};
pub(crate) use traits::assert_align;
pub use traits::{MemoryUsage, RawAllocator};
