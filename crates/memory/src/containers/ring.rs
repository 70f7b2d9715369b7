//! Double-ended ring buffer bound to one allocator

use core::fmt;
use core::iter::FusedIterator;
use core::ops::{Index, IndexMut};
use core::ptr;

use super::raw::{RawBuf, handle_reserve};
use crate::allocator::Allocator;
use crate::context;
use crate::error::MemoryResult;

/// Ring buffer with amortized O(1) push and pop at both ends
///
/// Elements live in one block; `head` is the physical slot of the logical
/// first element and the live range may wrap around the end of the block.
pub struct Ring<T> {
    raw: RawBuf<T>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    /// Empty ring on the current allocator
    pub fn new() -> Self {
        Self::with_allocator(context::current())
    }

    pub fn with_allocator(allocator: Allocator) -> Self {
        Self {
            raw: RawBuf::new_in(allocator),
            head: 0,
            len: 0,
        }
    }

    pub fn with_capacity_in(capacity: usize, allocator: Allocator) -> Self {
        Self {
            raw: RawBuf::with_capacity_in(capacity, allocator),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn allocator(&self) -> &Allocator {
        self.raw.allocator()
    }

    /// Physical slot of logical index `index`, without overflowing
    #[inline]
    fn slot(&self, index: usize) -> usize {
        let cap = self.capacity();
        if self.head >= cap - index {
            self.head - (cap - index)
        } else {
            self.head + index
        }
    }

    fn try_grow(&mut self, additional: usize) -> MemoryResult<()> {
        let old_cap = self.capacity();
        self.raw.try_reserve(self.len, additional)?;
        self.unwrap_after_growth(old_cap);
        Ok(())
    }

    /// Move the wrapped prefix behind the old end so the live range is
    /// contiguous modulo the new capacity.
    fn unwrap_after_growth(&mut self, old_cap: usize) {
        let new_cap = self.capacity();
        if new_cap == old_cap || self.head + self.len <= old_cap {
            return;
        }
        let wrapped = self.head + self.len - old_cap;
        debug_assert!(wrapped <= new_cap - old_cap);
        // SAFETY: slots [0, wrapped) are live and [old_cap, old_cap + wrapped)
        // is fresh capacity; the ranges are disjoint
        unsafe {
            ptr::copy_nonoverlapping(self.raw.ptr(), self.raw.ptr().add(old_cap), wrapped);
        }
    }

    fn reserve_one(&mut self) {
        if self.len == self.capacity() {
            handle_reserve(self.try_grow(1));
        }
    }

    /// Room for at least `additional` more elements
    pub fn reserve(&mut self, additional: usize) {
        handle_reserve(self.try_grow(additional));
    }

    pub fn try_reserve(&mut self, additional: usize) -> MemoryResult<()> {
        self.try_grow(additional)
    }

    pub fn push_back(&mut self, value: T) {
        self.reserve_one();
        let slot = self.slot(self.len);
        // SAFETY: slot is free and in bounds
        unsafe { self.raw.ptr().add(slot).write(value) };
        self.len += 1;
    }

    pub fn push_front(&mut self, value: T) {
        self.reserve_one();
        let cap = self.capacity();
        self.head = if self.head == 0 { cap - 1 } else { self.head - 1 };
        // SAFETY: the new head slot is free and in bounds
        unsafe { self.raw.ptr().add(self.head).write(value) };
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        // SAFETY: the head slot is live and leaves the range here
        let value = unsafe { self.raw.ptr().add(self.head).read() };
        self.head = self.slot(1);
        self.len -= 1;
        Some(value)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let slot = self.slot(self.len);
        // SAFETY: the last slot is live and leaves the range here
        Some(unsafe { self.raw.ptr().add(slot).read() })
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        // SAFETY: index < len, so the slot is live
        Some(unsafe { &*self.raw.ptr().add(self.slot(index)) })
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let slot = self.slot(index);
        // SAFETY: index < len, so the slot is live
        Some(unsafe { &mut *self.raw.ptr().add(slot) })
    }

    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn back(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    /// Front to back
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            front: 0,
            back: self.len,
        }
    }

    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
        self.head = 0;
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for Ring<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        let len = self.len;
        self.get(index)
            .unwrap_or_else(|| panic!("index out of bounds: the len is {len} but the index is {index}"))
    }
}

impl<T> IndexMut<usize> for Ring<T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        self.get_mut(index)
            .unwrap_or_else(|| panic!("index out of bounds: the len is {len} but the index is {index}"))
    }
}

impl<T: fmt::Debug> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for Ring<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a Ring<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`Ring`]
pub struct Iter<'a, T> {
    ring: &'a Ring<T>,
    front: usize,
    back: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        let item = self.ring.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        self.ring.get(self.back)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring<T>() -> Ring<T> {
        Ring::with_allocator(Allocator::general())
    }

    #[test]
    fn fifo_through_wraparound() {
        let mut ring = ring();
        for i in 0..6 {
            ring.push_back(i);
        }
        for i in 0..4 {
            assert_eq!(ring.pop_front(), Some(i));
        }
        for i in 6..12 {
            ring.push_back(i);
        }
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), (4..12).collect::<Vec<_>>());
    }

    #[test]
    fn growth_keeps_logical_order_when_wrapped() {
        let mut ring = ring();
        for i in 0..8 {
            ring.push_back(i);
        }
        ring.pop_front();
        ring.pop_front();
        ring.push_back(8);
        ring.push_back(9);
        // full and wrapped; the next push grows
        ring.push_back(10);
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), (2..=10).collect::<Vec<_>>());
    }

    #[test]
    fn both_ends() {
        let mut ring = ring();
        ring.push_back(2);
        ring.push_front(1);
        ring.push_back(3);
        ring.push_front(0);
        assert_eq!(ring.front(), Some(&0));
        assert_eq!(ring.back(), Some(&3));
        assert_eq!(ring[2], 2);
        ring[2] = 20;
        assert_eq!(ring.pop_back(), Some(3));
        assert_eq!(ring.pop_back(), Some(20));
        assert_eq!(ring.iter().rev().copied().collect::<Vec<_>>(), [1, 0]);
        assert_eq!(ring.get(5), None);
    }

    #[test]
    fn push_front_growth_from_empty() {
        let mut ring = ring();
        for i in 0..20 {
            ring.push_front(i);
        }
        assert_eq!(ring.len(), 20);
        assert_eq!(ring.front(), Some(&19));
        assert_eq!(ring.back(), Some(&0));
    }

    #[test]
    fn clear_drops_live_elements() {
        let marker = std::rc::Rc::new(());
        let mut ring = ring();
        for _ in 0..5 {
            ring.push_front(marker.clone());
        }
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(std::rc::Rc::strong_count(&marker), 1);
    }
}
