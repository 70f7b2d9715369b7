//! Growable array bound to one allocator

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::slice;

use super::raw::RawBuf;
use crate::allocator::Allocator;
use crate::context;
use crate::error::MemoryResult;

/// Contiguous growable array
///
/// The allocator is fixed at construction: [`Buf::new`] captures
/// [`context::current`], the `*_in`/`with_allocator` constructors take it
/// explicitly. Growth goes through that allocator's `reallocate`, so on a
/// stack or arena the buffer extends in place while it is the most recent
/// allocation.
///
/// # Examples
///
/// ```
/// use ambit_memory::{Allocator, Buf};
///
/// let mut buf = Buf::with_allocator(Allocator::general());
/// buf.push(1);
/// buf.extend_from_slice(&[2, 3]);
/// assert_eq!(&buf[..], &[1, 2, 3]);
/// ```
pub struct Buf<T> {
    raw: RawBuf<T>,
    len: usize,
}

impl<T> Buf<T> {
    /// Empty buffer on the current allocator
    pub fn new() -> Self {
        Self::with_allocator(context::current())
    }

    /// Empty buffer on `allocator`; nothing is allocated yet
    pub fn with_allocator(allocator: Allocator) -> Self {
        Self {
            raw: RawBuf::new_in(allocator),
            len: 0,
        }
    }

    /// Buffer with room for `capacity` elements on `allocator`
    pub fn with_capacity_in(capacity: usize, allocator: Allocator) -> Self {
        Self {
            raw: RawBuf::with_capacity_in(capacity, allocator),
            len: 0,
        }
    }

    /// Fallible [`Buf::with_capacity_in`]
    pub fn try_with_capacity_in(capacity: usize, allocator: Allocator) -> MemoryResult<Self> {
        Ok(Self {
            raw: RawBuf::try_with_capacity_in(capacity, allocator)?,
            len: 0,
        })
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

    /// The allocator this buffer was bound to
    #[inline]
    pub fn allocator(&self) -> &Allocator {
        self.raw.allocator()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.raw.ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.raw.ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are initialized
        unsafe { slice::from_raw_parts(self.raw.ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first `len` elements are initialized
        unsafe { slice::from_raw_parts_mut(self.raw.ptr(), self.len) }
    }

    /// Room for at least `additional` more elements
    pub fn reserve(&mut self, additional: usize) {
        self.raw.reserve(self.len, additional);
    }

    /// [`Buf::reserve`] that reports failure instead of aborting
    pub fn try_reserve(&mut self, additional: usize) -> MemoryResult<()> {
        self.raw.try_reserve(self.len, additional)
    }

    /// Room for exactly `additional` more elements, without geometric slack
    pub fn try_reserve_exact(&mut self, additional: usize) -> MemoryResult<()> {
        self.raw.try_reserve_exact(self.len, additional)
    }

    #[inline]
    pub fn push(&mut self, value: T) {
        if self.len == self.capacity() {
            self.raw.reserve(self.len, 1);
        }
        // SAFETY: len < capacity after the reserve
        unsafe {
            self.raw.ptr().add(self.len).write(value);
        }
        self.len += 1;
    }

    /// Push, or hand the error back when the allocator cannot grow the buffer
    pub fn try_push(&mut self, value: T) -> MemoryResult<()> {
        if self.len == self.capacity() {
            self.raw.try_reserve(self.len, 1)?;
        }
        // SAFETY: len < capacity after the reserve
        unsafe {
            self.raw.ptr().add(self.len).write(value);
        }
        self.len += 1;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the element at the old last index is initialized and now
        // outside the length, so it is read exactly once
        Some(unsafe { self.raw.ptr().add(self.len).read() })
    }

    /// Insert at `index`, shifting later elements right
    ///
    /// # Panics
    /// When `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len;
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        if len == self.capacity() {
            self.raw.reserve(len, 1);
        }
        // SAFETY: index <= len < capacity
        unsafe {
            let hole = self.raw.ptr().add(index);
            ptr::copy(hole, hole.add(1), len - index);
            hole.write(value);
        }
        self.len = len + 1;
    }

    /// Remove at `index`, shifting later elements left
    ///
    /// # Panics
    /// When `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        // SAFETY: index < len
        unsafe {
            let hole = self.raw.ptr().add(index);
            let value = hole.read();
            ptr::copy(hole.add(1), hole, len - index - 1);
            self.len = len - 1;
            value
        }
    }

    /// Remove at `index`, moving the last element into its place
    ///
    /// # Panics
    /// When `index >= len`.
    pub fn swap_remove(&mut self, index: usize) -> T {
        let len = self.len;
        assert!(index < len, "swap_remove index (is {index}) should be < len (is {len})");
        // SAFETY: index and len - 1 are both in bounds
        unsafe {
            let base = self.raw.ptr();
            let value = base.add(index).read();
            if index != len - 1 {
                ptr::copy_nonoverlapping(base.add(len - 1), base.add(index), 1);
            }
            self.len = len - 1;
            value
        }
    }

    /// Drop everything past `len`
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let tail = self.len - len;
        self.len = len;
        // SAFETY: the tail is initialized and already outside the length, so a
        // panicking destructor cannot cause a double drop
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.raw.ptr().add(len), tail));
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resize to `new_len`, filling with clones of `value`
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        self.reserve(new_len - self.len);
        while self.len + 1 < new_len {
            self.push(value.clone());
        }
        self.push(value);
    }

    /// Append clones of every element of `other`
    pub fn extend_from_slice(&mut self, other: &[T])
    where
        T: Clone,
    {
        self.reserve(other.len());
        for item in other {
            self.push(item.clone());
        }
    }
}

impl<T> Drop for Buf<T> {
    fn drop(&mut self) {
        // SAFETY: the first `len` elements are initialized; RawBuf frees the block
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.raw.ptr(), self.len));
        }
    }
}

impl<T> Default for Buf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Buf<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Buf<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

/// Clones into the same allocator
impl<T: Clone> Clone for Buf<T> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity_in(self.len, self.allocator().clone());
        copy.extend_from_slice(self);
        copy
    }
}

impl<T: fmt::Debug> fmt::Debug for Buf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for Buf<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for Buf<T> {}

impl<T: PartialEq> PartialEq<[T]> for Buf<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T; N]> for Buf<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T> Extend<T> for Buf<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for item in iter {
            self.push(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a Buf<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Buf<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
