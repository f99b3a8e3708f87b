//! Bounded and unbounded containers.
//!
//! Every component that buffers work or registrations is generic over its
//! container, so the memory model is chosen where the component is built:
//!
//! - [`BoundedQueue`] and `heapless::Vec` never touch the heap and reject
//!   elements once full.
//! - [`UnboundedQueue`] and `Vec` grow without limit.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use heapless::Deque;

use crate::error::CapacityError;

/// FIFO queue abstraction used by the worker queues.
pub trait OpQueue {
    type Item;

    /// Appends an item, handing it back if the queue is full.
    fn push_back(&mut self, item: Self::Item) -> Result<(), Self::Item>;

    /// Removes the oldest item.
    fn pop_front(&mut self) -> Option<Self::Item>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity, or `None` for queues that grow.
    fn capacity(&self) -> Option<usize>;

    /// Drops every queued item.
    fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// The error reported when `push_back` rejects an item.
    fn full_error(&self) -> CapacityError {
        CapacityError::new("queue", self.capacity().unwrap_or(usize::MAX))
    }
}

/// Fixed-capacity FIFO queue backed by inline storage.
pub struct BoundedQueue<T, const N: usize> {
    queue: Deque<T, N>,
}

impl<T, const N: usize> BoundedQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }
}

impl<T, const N: usize> Default for BoundedQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> OpQueue for BoundedQueue<T, N> {
    type Item = T;

    fn push_back(&mut self, item: T) -> Result<(), T> {
        self.queue.push_back(item)
    }

    fn pop_front(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(N)
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Growable FIFO queue backed by the heap.
pub struct UnboundedQueue<T> {
    queue: VecDeque<T>,
}

impl<T> UnboundedQueue<T> {
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OpQueue for UnboundedQueue<T> {
    type Item = T;

    fn push_back(&mut self, item: T) -> Result<(), T> {
        self.queue.push_back(item);
        Ok(())
    }

    fn pop_front(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Vector-like storage for registries (subscriber lists, timer slots, the
/// timer heap). Implemented for `Vec<T>` and `heapless::Vec<T, N>`.
pub trait Storage<T>: Default {
    /// Appends an element, handing it back if storage is full.
    fn push(&mut self, value: T) -> Result<(), T>;

    fn pop(&mut self) -> Option<T>;

    /// Removes the element at `index`, preserving the order of the rest.
    fn remove(&mut self, index: usize) -> T;

    /// Removes the element at `index`, moving the last element into its place.
    fn swap_remove(&mut self, index: usize) -> T;

    fn as_slice(&self) -> &[T];

    fn as_mut_slice(&mut self) -> &mut [T];

    /// Fixed capacity, or `None` for storage that grows.
    fn capacity_limit(&self) -> Option<usize>;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> Storage<T> for Vec<T> {
    fn push(&mut self, value: T) -> Result<(), T> {
        Vec::push(self, value);
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        Vec::pop(self)
    }

    fn remove(&mut self, index: usize) -> T {
        Vec::remove(self, index)
    }

    fn swap_remove(&mut self, index: usize) -> T {
        Vec::swap_remove(self, index)
    }

    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }

    fn capacity_limit(&self) -> Option<usize> {
        None
    }
}

impl<T, const N: usize> Storage<T> for heapless::Vec<T, N> {
    fn push(&mut self, value: T) -> Result<(), T> {
        heapless::Vec::push(self, value)
    }

    fn pop(&mut self) -> Option<T> {
        heapless::Vec::pop(self)
    }

    fn remove(&mut self, index: usize) -> T {
        heapless::Vec::remove(self, index)
    }

    fn swap_remove(&mut self, index: usize) -> T {
        heapless::Vec::swap_remove(self, index)
    }

    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }

    fn capacity_limit(&self) -> Option<usize> {
        Some(N)
    }
}
