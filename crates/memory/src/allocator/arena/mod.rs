//! Growing bump allocator
//!
//! Buckets come from the virtual memory primitive. Individual release is a
//! no-op; memory comes back all at once through `release_all` or drop.

mod allocator;
mod config;

pub use allocator::{ArenaAllocator, ArenaStats};
pub use config::ArenaConfig;
