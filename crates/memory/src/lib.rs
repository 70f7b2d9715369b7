//! # ambit-memory
//!
//! Scoped allocator strategies and containers that allocate through them.
//!
//! This crate provides:
//! - Four allocator strategies behind one [`RawAllocator`] capability:
//!   general-purpose, stack (LIFO bump), arena (growing bump) and fixed-slot
//!   pool, plus a leak-tracking wrapper
//! - A shared [`Allocator`] handle that dispatches to whichever strategy it
//!   wraps
//! - A per-thread allocator [`context`] stack
//! - Containers ([`Buf`], [`Str`], [`Ring`], [`Map`]) that capture an
//!   allocator when they are built and use it for their whole life
//!
//! ## Quick Start
//!
//! ```rust
//! use ambit_memory::prelude::*;
//!
//! let arena = Allocator::arena(ArenaConfig::default())?;
//! let _scope = context::scope(arena.clone());
//!
//! let mut names = Map::new();
//! names.insert(Str::from_str_in("ada", arena.clone()), 36);
//! let mut log = Buf::new();
//! log.push(1u32);
//!
//! assert!(Allocator::ptr_eq(names.allocator(), &arena));
//! assert!(Allocator::ptr_eq(log.allocator(), &arena));
//! # Ok::<(), ambit_memory::MemoryError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured events through `ambit-log`
//!
//! ## Threading
//!
//! [`Allocator`] is neither `Send` nor `Sync`. Allocators, the context stack
//! and every container bound to an allocator stay on the thread that created
//! them; there is no locking anywhere in the crate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]
#![warn(rust_2018_idioms)]

// Error types
pub mod error;

// Core modules
pub mod allocator;
mod block;
pub mod config;
pub mod containers;
pub mod context;
pub mod syscalls;
pub mod utils;

pub use crate::allocator::{
    Allocator, AllocatorKind, ArenaAllocator, ArenaConfig, ArenaStats, GeneralAllocator,
    GeneralConfig, LeakReport, LeakTrackingAllocator, LeakedBlock, MemoryUsage, PoolAllocator,
    PoolConfig, PoolStats, RawAllocator, StackAllocator, StackConfig, StackFrame, StackMarker,
};
pub use crate::block::Block;
pub use crate::config::{MemoryConfig, SeedAllocator, config, init};
pub use crate::containers::{Buf, Map, Ring, Str};
pub use crate::error::{MemoryError, MemoryResult};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::{
        Allocator, AllocatorKind, ArenaConfig, GeneralConfig, MemoryUsage, PoolConfig,
        RawAllocator, StackConfig, StackFrame,
    };
    pub use crate::block::Block;
    pub use crate::config::MemoryConfig;
    pub use crate::containers::{Buf, Map, Ring, Str};
    pub use crate::context;
    pub use crate::error::{MemoryError, MemoryResult};
}
