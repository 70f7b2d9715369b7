//! Growable UTF-8 string bound to one allocator

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;

use super::buf::Buf;
use crate::allocator::Allocator;
use crate::context;
use crate::error::MemoryResult;

/// Growable UTF-8 string
///
/// ```
/// use core::fmt::Write;
/// use ambit_memory::{Allocator, Str};
///
/// let mut s = Str::from_str_in("answer", Allocator::general());
/// write!(s, " = {}", 42).unwrap();
/// assert_eq!(s, "answer = 42");
/// ```
pub struct Str {
    bytes: Buf<u8>,
}

impl Str {
    /// Empty string on the current allocator
    pub fn new() -> Self {
        Self::with_allocator(context::current())
    }

    pub fn with_allocator(allocator: Allocator) -> Self {
        Self {
            bytes: Buf::with_allocator(allocator),
        }
    }

    pub fn with_capacity_in(capacity: usize, allocator: Allocator) -> Self {
        Self {
            bytes: Buf::with_capacity_in(capacity, allocator),
        }
    }

    /// Copy `s` into `allocator`
    pub fn from_str_in(s: &str, allocator: Allocator) -> Self {
        let mut out = Self::with_capacity_in(s.len(), allocator);
        out.push_str(s);
        out
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: only whole `str`s and encoded `char`s are ever appended
        unsafe { core::str::from_utf8_unchecked(&self.bytes) }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn allocator(&self) -> &Allocator {
        self.bytes.allocator()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional);
    }

    pub fn push(&mut self, ch: char) {
        let mut utf8 = [0; 4];
        self.push_str(ch.encode_utf8(&mut utf8));
    }

    pub fn push_str(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
    }

    /// [`Str::push_str`] that reports failure instead of aborting
    pub fn try_push_str(&mut self, s: &str) -> MemoryResult<()> {
        self.bytes.try_reserve(s.len())?;
        self.bytes.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<char> {
        let ch = self.as_str().chars().next_back()?;
        self.bytes.truncate(self.len() - ch.len_utf8());
        Some(ch)
    }

    /// Shorten to `new_len` bytes
    ///
    /// # Panics
    /// When `new_len` is not on a char boundary.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len < self.len() {
            assert!(
                self.as_str().is_char_boundary(new_len),
                "new_len {new_len} is not on a char boundary"
            );
            self.bytes.truncate(new_len);
        }
    }
}

impl Default for Str {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Str {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Str {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl core::borrow::Borrow<str> for Str {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Write for Str {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.try_push_str(s).map_err(|_| fmt::Error)
    }

    fn write_char(&mut self, c: char) -> fmt::Result {
        let mut utf8 = [0; 4];
        self.write_str(c.encode_utf8(&mut utf8))
    }
}

/// Clones into the same allocator
impl Clone for Str {
    fn clone(&self) -> Self {
        Self::from_str_in(self, self.allocator().clone())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Str {}

impl PartialEq<str> for Str {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Str {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<Str> for str {
    fn eq(&self, other: &Str) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<Str> for &str {
    fn eq(&self, other: &Str) -> bool {
        *self == other.as_str()
    }
}

impl Hash for Str {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Extend<char> for Str {
    fn extend<I: IntoIterator<Item = char>>(&mut self, iter: I) {
        for ch in iter {
            self.push(ch);
        }
    }
}

impl<'a> Extend<&'a str> for Str {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for s in iter {
            self.push_str(s);
        }
    }
}
