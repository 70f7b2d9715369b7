//! Per-thread allocator context stack
//!
//! Each thread owns a stack of [`Allocator`] handles. The stack is seeded on
//! first use with one general-purpose allocator built from
//! [`config()`](crate::config::config) and never drops below that entry.
//! Containers built with `new()` capture [`current()`] at construction and
//! keep that allocator for their whole life, no matter what is pushed or
//! popped afterwards.
//!
//! ```
//! use ambit_memory::{Allocator, ArenaConfig, Buf, context};
//!
//! let arena = Allocator::arena(ArenaConfig::compact()).unwrap();
//! let numbers = context::with_allocator(arena.clone(), || {
//!     let mut numbers = Buf::new();
//!     numbers.extend_from_slice(&[1, 2, 3]);
//!     numbers
//! });
//! assert!(Allocator::ptr_eq(numbers.allocator(), &arena));
//! assert_eq!(context::depth(), 1);
//! ```

use core::cell::{Cell, OnceCell, RefCell};
use core::marker::PhantomData;
use std::rc::Rc;

#[cfg(feature = "logging")]
use ambit_log::debug;

use crate::allocator::{
    Allocator, ArenaAllocator, ArenaConfig, GeneralAllocator, LeakTrackingAllocator, RawAllocator,
};
use crate::config::{self, SeedAllocator};
use crate::Block;

thread_local! {
    static CONTEXT: ContextStack = ContextStack::seeded();
    static PROFILE: ProfileSlot = const {
        ProfileSlot {
            hook: RefCell::new(None),
            active: Cell::new(false),
        }
    };
}

struct ContextStack {
    entries: RefCell<Vec<Allocator>>,
    scratch_config: ArenaConfig,
    tmp: OnceCell<Allocator>,
}

impl ContextStack {
    fn seeded() -> Self {
        let config = config::config();
        let general = Allocator::from(GeneralAllocator::with_config(config.general).unwrap_or_default());
        let seed = match config.default_allocator {
            SeedAllocator::General => general,
            SeedAllocator::LeakTracking => Allocator::from(LeakTrackingAllocator::new(general)),
        };

        #[cfg(feature = "logging")]
        debug!(seed = %seed.kind(), "allocator context initialized");

        Self {
            entries: RefCell::new(vec![seed]),
            scratch_config: config.scratch,
            tmp: OnceCell::new(),
        }
    }

    fn top(&self) -> Allocator {
        let entries = self.entries.borrow();
        // the seed entry is never popped
        entries[entries.len() - 1].clone()
    }
}

impl Drop for ContextStack {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        {
            if let Some(arena) = self.tmp.get().and_then(Allocator::as_arena) {
                debug!(
                    peak_used = arena.peak_used_bytes(),
                    reserved = arena.reserved_bytes(),
                    "scratch arena high-water mark"
                );
            }
            let depth = self.entries.get_mut().len();
            if depth > 1 {
                debug!(depth, "allocator context torn down with entries still pushed");
            }
        }
    }
}

/// Make `allocator` the current allocator of this thread
pub fn push(allocator: Allocator) {
    CONTEXT.with(|ctx| ctx.entries.borrow_mut().push(allocator));
}

/// Remove and return the current allocator
///
/// # Panics
///
/// When only the seed allocator is left.
#[track_caller]
pub fn pop() -> Allocator {
    let popped = CONTEXT.with(|ctx| {
        let mut entries = ctx.entries.borrow_mut();
        if entries.len() > 1 { entries.pop() } else { None }
    });
    popped.unwrap_or_else(|| panic!("cannot pop the seed allocator off the context stack"))
}

/// The allocator on top of this thread's stack
pub fn current() -> Allocator {
    CONTEXT.with(ContextStack::top)
}

/// Number of entries, the seed included
pub fn depth() -> usize {
    CONTEXT.with(|ctx| ctx.entries.borrow().len())
}

/// Allocate from the current allocator
#[track_caller]
pub fn allocate_current(size: usize, align: usize) -> Block {
    current().allocate(size, align)
}

/// Release through the current allocator
///
/// # Safety
///
/// `block` must come from the allocator that is current now.
#[track_caller]
pub unsafe fn release_current(block: Block) {
    // SAFETY: forwarded caller contract
    unsafe { current().release(block) };
}

/// This thread's scratch arena
///
/// Created on first use from the scratch configuration. It is never pushed on
/// the stack; pass it explicitly or push it yourself. Reset it with
/// `release_all` once a unit of work is done.
pub fn tmp() -> Allocator {
    CONTEXT.with(|ctx| {
        ctx.tmp
            .get_or_init(|| {
                Allocator::from(
                    ArenaAllocator::with_config(ctx.scratch_config).unwrap_or_default(),
                )
            })
            .clone()
    })
}

/// Block handed out or taken back by a general-purpose allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    Alloc(Block),
    Free(Block),
}

/// Memory profile hook, see [`set_memory_profile`]
pub type MemoryProfile = Rc<dyn Fn(ProfileEvent)>;

struct ProfileSlot {
    hook: RefCell<Option<MemoryProfile>>,
    active: Cell<bool>,
}

/// Clears the reentrancy flag even if the hook panics
struct HookRunning<'a>(&'a Cell<bool>);

impl Drop for HookRunning<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Install this thread's memory profile hook and return the previous one
///
/// The hook sees every block the general-purpose allocators of this thread
/// allocate or release, reallocation included. Allocations made by the hook
/// itself are not reported. `None` removes the hook.
pub fn set_memory_profile(profile: Option<MemoryProfile>) -> Option<MemoryProfile> {
    PROFILE.with(|slot| slot.hook.replace(profile))
}

pub(crate) fn report_profile(event: ProfileEvent) {
    // the slot is gone during thread teardown; nothing to report then
    let _ = PROFILE.try_with(|slot| {
        if slot.active.get() {
            return;
        }
        let Some(hook) = slot.hook.borrow().clone() else {
            return;
        };
        slot.active.set(true);
        let _running = HookRunning(&slot.active);
        hook(event);
    });
}

/// Pops the allocator it pushed when dropped
///
/// # Panics
///
/// On drop, when the top of the stack is not the allocator this guard pushed
/// (scopes were closed out of order).
#[must_use = "the allocator is popped as soon as the guard is dropped"]
pub struct ContextGuard {
    pushed: Allocator,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// The allocator this guard pushed
    pub fn allocator(&self) -> &Allocator {
        &self.pushed
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let popped = pop();
        assert!(
            Allocator::ptr_eq(&popped, &self.pushed) || std::thread::panicking(),
            "allocator scopes closed out of order"
        );
    }
}

/// Push `allocator` until the returned guard is dropped
pub fn scope(allocator: Allocator) -> ContextGuard {
    push(allocator.clone());
    ContextGuard {
        pushed: allocator,
        _not_send: PhantomData,
    }
}

/// Run `f` with `allocator` as the current allocator
pub fn with_allocator<R>(allocator: Allocator, f: impl FnOnce() -> R) -> R {
    let _guard = scope(allocator);
    f()
}
