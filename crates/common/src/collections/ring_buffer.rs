//! A capacity-bounded history buffer that evicts its oldest entry when full.
//!
//! [`RingBuffer`] keeps the most recent `capacity` items in insertion order.
//! It backs the alert history kept by long-running monitors, where only the
//! latest events are interesting and memory must stay bounded.

use std::collections::VecDeque;

/// A fixed-capacity buffer storing elements in first-in-first-out order.
///
/// # Examples
///
/// ```rust
/// use tokenwarden_common::collections::RingBuffer;
///
/// let mut history = RingBuffer::new(3);
/// for n in 1..=4 {
///     history.push(n);
/// }
///
/// assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
/// assert_eq!(history.recent(2), vec![&4, &3]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new buffer with the provided capacity.
    ///
    /// A capacity of zero is clamped to `1`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends an item, returning the evicted oldest item when the buffer was
    /// already full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.buf.pop_front() } else { None };
        self.buf.push_back(item);
        evicted
    }

    /// Returns up to `n` items, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&T> {
        self.buf.iter().rev().take(n).collect()
    }

    /// Returns the newest item.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buf.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every item, keeping the capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Clones the contents into a vector ordered oldest to newest.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().cloned().collect()
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
