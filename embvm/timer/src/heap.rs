//! The scheduled queue: a binary min-heap of timer ids.
//!
//! The heap stores ids only. Remaining ticks live in the timer records, so
//! every mutating operation takes a `key` closure that looks them up. Ties
//! are broken arbitrarily.

use core::fmt;

use embvm_core::{Storage, Ticks};

/// Index of an allocated timer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) usize);

impl TimerId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Min-heap of timer ids ordered by remaining ticks.
pub struct ScheduledQueue<H> {
    heap: H,
}

impl<H: Storage<TimerId>> ScheduledQueue<H> {
    pub fn new() -> Self {
        Self { heap: H::default() }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.heap.capacity_limit()
    }

    /// The id with the fewest remaining ticks.
    pub fn front(&self) -> Option<TimerId> {
        self.heap.as_slice().first().copied()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.heap.as_slice().contains(&id)
    }

    /// Scheduled ids in heap order.
    pub fn ids(&self) -> &[TimerId] {
        self.heap.as_slice()
    }

    /// Inserts `id`, handing it back if the heap is full.
    pub fn push<K>(&mut self, id: TimerId, key: K) -> Result<(), TimerId>
    where
        K: Fn(TimerId) -> Ticks,
    {
        self.heap.push(id)?;
        let last = self.heap.len() - 1;
        sift_up(self.heap.as_mut_slice(), last, &key);
        Ok(())
    }

    /// Removes the front id.
    pub fn pop_front<K>(&mut self, key: K) -> Option<TimerId>
    where
        K: Fn(TimerId) -> Ticks,
    {
        let len = self.heap.len();
        if len == 0 {
            return None;
        }
        self.heap.as_mut_slice().swap(0, len - 1);
        let front = self.heap.pop();
        sift_down(self.heap.as_mut_slice(), 0, &key);
        front
    }

    /// Restores heap order after the front's key grew.
    pub fn sift_front<K>(&mut self, key: K)
    where
        K: Fn(TimerId) -> Ticks,
    {
        sift_down(self.heap.as_mut_slice(), 0, &key);
    }

    /// Removes `id` wherever it sits. Returns `false` if it was not queued.
    pub fn remove<K>(&mut self, id: TimerId, key: K) -> bool
    where
        K: Fn(TimerId) -> Ticks,
    {
        let Some(index) = self.heap.as_slice().iter().position(|&queued| queued == id) else {
            return false;
        };
        self.heap.swap_remove(index);
        make_heap(self.heap.as_mut_slice(), &key);
        true
    }

    pub fn clear(&mut self) {
        while self.heap.pop().is_some() {}
    }

    /// Whether every parent sorts no later than its children.
    pub fn is_heap<K>(&self, key: K) -> bool
    where
        K: Fn(TimerId) -> Ticks,
    {
        let ids = self.heap.as_slice();
        (1..ids.len()).all(|child| key(ids[(child - 1) / 2]) <= key(ids[child]))
    }
}

impl<H: Storage<TimerId>> Default for ScheduledQueue<H> {
    fn default() -> Self {
        Self::new()
    }
}

fn sift_up<K>(ids: &mut [TimerId], mut child: usize, key: &K)
where
    K: Fn(TimerId) -> Ticks,
{
    while child > 0 {
        let parent = (child - 1) / 2;
        if key(ids[child]) >= key(ids[parent]) {
            break;
        }
        ids.swap(child, parent);
        child = parent;
    }
}

fn sift_down<K>(ids: &mut [TimerId], mut parent: usize, key: &K)
where
    K: Fn(TimerId) -> Ticks,
{
    loop {
        let left = 2 * parent + 1;
        if left >= ids.len() {
            break;
        }
        let right = left + 1;
        let child = if right < ids.len() && key(ids[right]) < key(ids[left]) {
            right
        } else {
            left
        };
        if key(ids[parent]) <= key(ids[child]) {
            break;
        }
        ids.swap(parent, child);
        parent = child;
    }
}

fn make_heap<K>(ids: &mut [TimerId], key: &K)
where
    K: Fn(TimerId) -> Ticks,
{
    for parent in (0..ids.len() / 2).rev() {
        sift_down(ids, parent, key);
    }
}
