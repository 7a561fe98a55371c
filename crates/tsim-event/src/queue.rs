//! `EventQueue`: an [`EventList`] shared between threads.
//!
//! Every operation takes one coarse lock.  The lock also guards a side
//! state `S` chosen by the owner; the simulator puts its clock there so that
//! "read the time, then change the queue" (and the reverse) is atomic.
//!
//! A condition variable is paired with the lock.  Insertions notify it, so a
//! thread waiting for the next event is woken as soon as an earlier one is
//! added.

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tsim_core::SimTime;

use crate::{EventHandle, EventList, Priority, TimedEvent};

/// The data guarded by an [`EventQueue`]'s lock.
pub struct QueueState<A, S> {
    pub events: EventList<A>,
    pub state:  S,
}

/// Lock guard returned by [`EventQueue::lock`].
pub type QueueGuard<'a, A, S> = MutexGuard<'a, QueueState<A, S>>;

/// Thread-safe, time-ordered event queue.
///
/// # Example
///
/// ```rust
/// use tsim_core::SimTime;
/// use tsim_event::{EventQueue, Priority};
///
/// let queue: EventQueue<&str> = EventQueue::new();
/// queue.add(SimTime(5.0), Priority::LOW, "later");
/// queue.add(SimTime(5.0), Priority::HIGH, "sooner");
/// assert_eq!(queue.remove_earliest().map(|e| e.into_payload()), Some("sooner"));
/// ```
pub struct EventQueue<A, S = ()> {
    inner:   Mutex<QueueState<A, S>>,
    changed: Condvar,
}

impl<A, S: Default> Default for EventQueue<A, S> {
    fn default() -> Self {
        Self::with_state(S::default())
    }
}

impl<A, S: Default> EventQueue<A, S> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<A, S> EventQueue<A, S> {
    /// Create an empty queue guarding `state` under the same lock.
    pub fn with_state(state: S) -> Self {
        Self {
            inner:   Mutex::new(QueueState { events: EventList::new(), state }),
            changed: Condvar::new(),
        }
    }

    /// Insert an event and wake any thread waiting on the queue.
    pub fn add(&self, time: SimTime, priority: Priority, payload: A) -> EventHandle {
        let handle = self.inner.lock().events.insert(time, priority, payload);
        self.changed.notify_all();
        handle
    }

    /// Handle of the earliest pending event.
    pub fn peek_earliest(&self) -> Option<EventHandle> {
        self.inner.lock().events.peek()
    }

    /// Atomically remove and return the earliest event.
    pub fn remove_earliest(&self) -> Option<TimedEvent<A>> {
        self.inner.lock().events.pop_first()
    }

    /// Remove a specific event.  Returns `false` if it was no longer pending.
    pub fn remove(&self, handle: &EventHandle) -> bool {
        let removed = self.inner.lock().events.remove(handle).is_some();
        if removed {
            self.changed.notify_all();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Snapshot of all pending handles in execution order.
    pub fn handles(&self) -> Vec<EventHandle> {
        self.inner.lock().events.handles().collect()
    }

    pub fn clear(&self) {
        self.inner.lock().events.clear();
        self.changed.notify_all();
    }

    /// Take the lock for a compound operation over events and side state.
    ///
    /// Call [`notify`][Self::notify] after inserting through the guard.
    pub fn lock(&self) -> QueueGuard<'_, A, S> {
        self.inner.lock()
    }

    /// Run `f` on the side state under the lock.
    pub fn with_state_ref<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.lock().state)
    }

    /// Wake every thread blocked in [`wait_for`][Self::wait_for].
    pub fn notify(&self) {
        self.changed.notify_all();
    }

    /// Release `guard` and block until notified or `timeout` elapses.
    ///
    /// Returns `true` if the wait timed out.  The lock is held again on return.
    pub fn wait_for(&self, guard: &mut QueueGuard<'_, A, S>, timeout: Duration) -> bool {
        self.changed.wait_for(guard, timeout).timed_out()
    }
}
