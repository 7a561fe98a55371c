//! `EventList`: the ordered multiset of pending events.
//!
//! # Performance note
//!
//! `BTreeMap` gives O(log n) insert, O(log n) removal by handle and O(log n)
//! pop of the earliest event.  A red-black tree would have the same bounds;
//! the B-tree has better cache behaviour for the small keys used here.
//!
//! `EventList` is not synchronised.  Shared access goes through
//! [`EventQueue`][crate::EventQueue].

use std::collections::BTreeMap;

use tsim_core::SimTime;

use crate::{EventHandle, Priority, TimedEvent};

/// Pending events ordered by `(time, priority, sequence)`.
pub struct EventList<A> {
    inner:    BTreeMap<EventHandle, A>,
    next_seq: u64,
}

impl<A> Default for EventList<A> {
    fn default() -> Self {
        Self { inner: BTreeMap::new(), next_seq: 0 }
    }
}

impl<A> EventList<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `payload` to execute at `time` with `priority`.
    ///
    /// Never rejects.  The returned handle identifies this insertion.
    pub fn insert(&mut self, time: SimTime, priority: Priority, payload: A) -> EventHandle {
        let handle = EventHandle::new(time, priority, self.next_seq);
        self.next_seq += 1;
        self.inner.insert(handle, payload);
        handle
    }

    /// The earliest pending event, or `None` if the list is empty.
    pub fn peek(&self) -> Option<EventHandle> {
        self.inner.keys().next().copied()
    }

    /// Time of the earliest pending event.
    pub fn next_time(&self) -> Option<SimTime> {
        self.peek().map(|h| h.time())
    }

    /// Remove and return the earliest event.
    pub fn pop_first(&mut self) -> Option<TimedEvent<A>> {
        self.inner.pop_first().map(|(h, a)| TimedEvent::new(h, a))
    }

    /// Remove and return the earliest event only if it is due exactly at `time`.
    pub fn pop_due(&mut self, time: SimTime) -> Option<TimedEvent<A>> {
        match self.peek() {
            Some(h) if h.time() == time => self.pop_first(),
            _ => None,
        }
    }

    /// Remove the event identified by `handle`, returning its payload.
    pub fn remove(&mut self, handle: &EventHandle) -> Option<A> {
        self.inner.remove(handle)
    }

    pub fn contains(&self, handle: &EventHandle) -> bool {
        self.inner.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every pending event.  Sequence numbering continues.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Handles of all pending events in execution order.
    pub fn handles(&self) -> impl Iterator<Item = EventHandle> + '_ {
        self.inner.keys().copied()
    }

    /// Pending events in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&EventHandle, &A)> {
        self.inner.iter()
    }
}
