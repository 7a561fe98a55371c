//! Event records and their ordering key.

use std::cmp::Ordering;
use std::fmt;

use tsim_core::SimTime;

// ── Priority ──────────────────────────────────────────────────────────────────

/// Execution priority among events due at the same time.
///
/// Numerically lower values execute first: `Priority::HIGHEST` (0) runs
/// before `Priority::NORMAL` (5), which runs before `Priority::LOWEST` (10).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const HIGH:    Priority = Priority(3);
    pub const NORMAL:  Priority = Priority(5);
    pub const LOW:     Priority = Priority(7);
    pub const LOWEST:  Priority = Priority(10);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── EventHandle ───────────────────────────────────────────────────────────────

/// The identity and ordering key of a scheduled event.
///
/// Returned from every insertion; pass it back to cancel the event.  Two
/// handles are equal only if they refer to the same insertion.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventHandle {
    time:     SimTime,
    priority: Priority,
    sequence: u64,
}

impl EventHandle {
    pub(crate) fn new(time: SimTime, priority: Priority, sequence: u64) -> Self {
        Self { time, priority, sequence }
    }

    /// Absolute (zero-based) simulation time at which the event executes.
    #[inline]
    pub fn time(&self) -> SimTime {
        self.time
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Insertion sequence number; unique within one event list.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialEq for EventHandle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventHandle {}

impl PartialOrd for EventHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.priority.cmp(&other.priority))
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}/{}", self.sequence, self.time, self.priority)
    }
}

// ── TimedEvent ────────────────────────────────────────────────────────────────

/// An event removed from the list: its handle plus the payload it carried.
///
/// Time and priority are fixed at insertion; a `TimedEvent` only exists
/// outside the list once it has been taken out for execution.
pub struct TimedEvent<A> {
    handle:  EventHandle,
    payload: A,
}

impl<A> TimedEvent<A> {
    pub(crate) fn new(handle: EventHandle, payload: A) -> Self {
        Self { handle, payload }
    }

    #[inline]
    pub fn handle(&self) -> EventHandle {
        self.handle
    }

    #[inline]
    pub fn time(&self) -> SimTime {
        self.handle.time
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.handle.priority
    }

    #[inline]
    pub fn payload(&self) -> &A {
        &self.payload
    }

    /// Consume the event, yielding its payload.
    pub fn into_payload(self) -> A {
        self.payload
    }

    /// Split into handle and payload.
    pub fn into_parts(self) -> (EventHandle, A) {
        (self.handle, self.payload)
    }
}

impl<A> fmt::Debug for TimedEvent<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedEvent").field("handle", &self.handle).finish_non_exhaustive()
    }
}
