//! Fixed-slot pool allocator
//!
//! ## Modules
//! - `allocator` - `PoolAllocator` with an index-based free list
//! - `config` - slot geometry and debug fill patterns

mod allocator;
mod config;

pub use allocator::{PoolAllocator, PoolStats};
pub use config::PoolConfig;
