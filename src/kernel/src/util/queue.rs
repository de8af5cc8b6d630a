//! A FIFO/LIFO queue of handles.
//!
//! `Queue` never locks itself. It is meant to live inside a `SpinLock`, so
//! that every operation needs the lock guard: holding the lock is checked by
//! the compiler rather than asserted at runtime. This lets a caller nest
//! queue operations inside a larger critical section (e.g. moving a thread
//! between its own lock and a sleep queue's lock) without lock re-entry.

use std::collections::vec_deque;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePos {
    Head,
    Tail,
}

#[derive(Debug, Clone)]
pub struct Queue<T> {
    items: VecDeque<T>,
}

impl<T: PartialEq> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append an item at the tail.
    ///
    /// With `unique`, an item that is already queued is rejected.
    pub fn enqueue(&mut self, item: T, unique: bool) -> Result<()> {
        if unique && self.contains(&item) {
            return_errno!(EEXIST, "the item is already queued");
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Insert an item at the head.
    pub fn enqueue_head(&mut self, item: T) {
        self.items.push_front(item);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn dequeue_tail(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Remove the first occurrence of an item.
    pub fn remove(&mut self, item: &T) -> bool {
        self.remove_node(|queued| queued == item).is_some()
    }

    /// Remove the first item that satisfies the predicate.
    pub fn remove_node<F>(&mut self, mut pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let idx = self.items.iter().position(|queued| pred(queued))?;
        self.items.remove(idx)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.iter().any(|queued| queued == item)
    }

    /// Move an already-queued item to the head or the tail.
    pub fn rellocate(&mut self, item: &T, pos: QueuePos) -> Result<()> {
        let idx = self.items.iter().position(|queued| queued == item);
        let item = idx
            .and_then(|idx| self.items.remove(idx))
            .ok_or_else(|| errno!(ENOENT, "the item is not queued"))?;
        match pos {
            QueuePos::Head => self.items.push_front(item),
            QueuePos::Tail => self.items.push_back(item),
        }
        Ok(())
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }

    /// Remove every item and return them in queue order.
    pub fn drain(&mut self) -> vec_deque::Drain<'_, T> {
        self.items.drain(..)
    }
}

impl<T: PartialEq> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
