//! Allocator-aware containers
//!
//! Every container stores the [`Allocator`](crate::Allocator) handle it was
//! created with and performs all of its allocations through it. `new()`
//! captures [`context::current`](crate::context::current); the `*_in` and
//! `with_allocator` constructors take the handle explicitly. Dropping a
//! container releases its storage through the captured handle.

mod buf;
pub mod map;
mod raw;
pub mod ring;
mod string;

pub use buf::Buf;
pub use map::Map;
pub use ring::Ring;
pub use string::Str;
