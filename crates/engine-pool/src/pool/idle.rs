//! Idle engine list.
//!
//! A stack-like list of engines waiting for reuse. The front holds the most
//! recently returned engine, the back the coldest one. The list does no
//! locking; the pool mutates it only while holding its state lock.

use std::collections::VecDeque;
use std::time::Instant;

/// A pooled engine together with its bookkeeping.
///
/// Owned by the idle list while idle and by exactly one active handle while
/// checked out.
#[derive(Debug)]
pub(crate) struct PoolConn<E> {
    pub(crate) engine: E,
    pub(crate) created_at: Instant,
}

impl<E> PoolConn<E> {
    pub(crate) fn new(engine: E) -> Self {
        Self {
            engine,
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct IdleList<T> {
    items: VecDeque<T>,
}

impl<T> IdleList<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push_front(&mut self, item: T) {
        self.items.push_front(item);
    }

    /// Take the most recently returned entry.
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Take the least recently returned entry.
    pub(crate) fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Remove every entry, front to back.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}
