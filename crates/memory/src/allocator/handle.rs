//! The allocator handle containers and the context stack pass around
//!
//! [`Allocator`] is a cheap, clonable, reference-counted handle over one of a
//! closed set of strategies. Requests are dispatched by matching on the
//! strategy. The handle is neither `Send` nor `Sync`: an allocator and every
//! container bound to it stay on the thread that created them.

use core::fmt;
use std::rc::Rc;

use super::{
    ArenaAllocator, ArenaConfig, GeneralAllocator, GeneralConfig, LeakTrackingAllocator,
    MemoryUsage, PoolAllocator, PoolConfig, RawAllocator, StackAllocator, StackConfig,
};
use crate::Block;
use crate::error::MemoryResult;

/// Which strategy a handle dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    General,
    Stack,
    Arena,
    Pool,
    LeakTracking,
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::General => "general",
            Self::Stack => "stack",
            Self::Arena => "arena",
            Self::Pool => "pool",
            Self::LeakTracking => "leak-tracking",
        })
    }
}

#[derive(Debug)]
enum Strategy {
    General(GeneralAllocator),
    Stack(StackAllocator),
    Arena(ArenaAllocator),
    Pool(PoolAllocator),
    LeakTracking(LeakTrackingAllocator),
}

macro_rules! dispatch {
    ($strategy:expr, $alloc:ident => $body:expr) => {
        match $strategy {
            Strategy::General($alloc) => $body,
            Strategy::Stack($alloc) => $body,
            Strategy::Arena($alloc) => $body,
            Strategy::Pool($alloc) => $body,
            Strategy::LeakTracking($alloc) => $body,
        }
    };
}

/// Shared handle to an allocator strategy
///
/// Clones refer to the same allocator; it is dropped, together with all the
/// memory it holds, when the last clone goes away.
///
/// # Examples
///
/// ```
/// use ambit_memory::{Allocator, RawAllocator};
///
/// let arena = Allocator::arena(Default::default()).unwrap();
/// let block = arena.allocate(64, 8);
/// assert!(!block.is_null());
/// unsafe { arena.release_all() };
/// ```
#[derive(Clone)]
pub struct Allocator {
    inner: Rc<Strategy>,
}

impl Allocator {
    fn from_strategy(strategy: Strategy) -> Self {
        Self {
            inner: Rc::new(strategy),
        }
    }

    /// General-purpose allocator with the default configuration
    pub fn general() -> Self {
        Self::from_strategy(Strategy::General(GeneralAllocator::new()))
    }

    /// General-purpose allocator with an explicit configuration
    pub fn general_with(config: GeneralConfig) -> MemoryResult<Self> {
        GeneralAllocator::with_config(config).map(Self::from)
    }

    /// Stack allocator over a fixed buffer of at least `capacity` bytes
    pub fn stack(capacity: usize) -> MemoryResult<Self> {
        StackAllocator::new(capacity).map(Self::from)
    }

    /// Stack allocator with an explicit configuration
    pub fn stack_with(capacity: usize, config: StackConfig) -> MemoryResult<Self> {
        StackAllocator::with_config(capacity, config).map(Self::from)
    }

    /// Growing arena
    pub fn arena(config: ArenaConfig) -> MemoryResult<Self> {
        ArenaAllocator::with_config(config).map(Self::from)
    }

    /// Fixed-slot pool backed by a fresh general-purpose allocator
    pub fn pool(config: PoolConfig) -> MemoryResult<Self> {
        PoolAllocator::new(config).map(Self::from)
    }

    /// Fixed-slot pool whose pages come from `backing`
    pub fn pool_over(config: PoolConfig, backing: Self) -> MemoryResult<Self> {
        PoolAllocator::with_backing(config, backing).map(Self::from)
    }

    /// Leak-tracking wrapper around `inner`
    pub fn leak_tracking(inner: Self) -> Self {
        Self::from(LeakTrackingAllocator::new(inner))
    }

    /// The strategy behind this handle
    pub fn kind(&self) -> AllocatorKind {
        match &*self.inner {
            Strategy::General(_) => AllocatorKind::General,
            Strategy::Stack(_) => AllocatorKind::Stack,
            Strategy::Arena(_) => AllocatorKind::Arena,
            Strategy::Pool(_) => AllocatorKind::Pool,
            Strategy::LeakTracking(_) => AllocatorKind::LeakTracking,
        }
    }

    /// Whether both handles refer to the same allocator
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// The general-purpose allocator behind this handle, if that is its strategy
    pub fn as_general(&self) -> Option<&GeneralAllocator> {
        match &*self.inner {
            Strategy::General(alloc) => Some(alloc),
            _ => None,
        }
    }

    /// The stack allocator behind this handle, if that is its strategy
    pub fn as_stack(&self) -> Option<&StackAllocator> {
        match &*self.inner {
            Strategy::Stack(alloc) => Some(alloc),
            _ => None,
        }
    }

    /// The arena allocator behind this handle, if that is its strategy
    pub fn as_arena(&self) -> Option<&ArenaAllocator> {
        match &*self.inner {
            Strategy::Arena(alloc) => Some(alloc),
            _ => None,
        }
    }

    /// The pool allocator behind this handle, if that is its strategy
    pub fn as_pool(&self) -> Option<&PoolAllocator> {
        match &*self.inner {
            Strategy::Pool(alloc) => Some(alloc),
            _ => None,
        }
    }

    /// The leak-tracking wrapper behind this handle, if that is its strategy
    pub fn as_leak_tracking(&self) -> Option<&LeakTrackingAllocator> {
        match &*self.inner {
            Strategy::LeakTracking(alloc) => Some(alloc),
            _ => None,
        }
    }
}

impl RawAllocator for Allocator {
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> Block {
        dispatch!(&*self.inner, alloc => alloc.allocate(size, align))
    }

    #[inline]
    #[track_caller]
    unsafe fn release(&self, block: Block) {
        // SAFETY: forwarded caller contract
        dispatch!(&*self.inner, alloc => unsafe { alloc.release(block) });
    }

    unsafe fn release_all(&self) {
        // SAFETY: forwarded caller contract
        dispatch!(&*self.inner, alloc => unsafe { alloc.release_all() });
    }

    #[inline]
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        // SAFETY: forwarded caller contract
        dispatch!(&*self.inner, alloc => unsafe { alloc.reallocate(block, new_size, align) })
    }
}

impl MemoryUsage for Allocator {
    fn used_memory(&self) -> usize {
        dispatch!(&*self.inner, alloc => alloc.used_memory())
    }

    fn total_memory(&self) -> Option<usize> {
        dispatch!(&*self.inner, alloc => alloc.total_memory())
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

macro_rules! impl_from_strategy {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Allocator {
                fn from(alloc: $ty) -> Self {
                    Self::from_strategy(Strategy::$variant(alloc))
                }
            }
        )*
    };
}

impl_from_strategy!(
    General(GeneralAllocator),
    Stack(StackAllocator),
    Arena(ArenaAllocator),
    Pool(PoolAllocator),
    LeakTracking(LeakTrackingAllocator),
);
