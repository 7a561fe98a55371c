//! `tsim-event`: the time-ordered event list at the heart of the scheduler.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                    |
//! |------------|-------------------------------------------------------------|
//! | [`event`]  | `Priority`, `EventHandle`, `TimedEvent<A>`                  |
//! | [`list`]   | `EventList<A>` (`BTreeMap<EventHandle, A>`)                 |
//! | [`queue`]  | `EventQueue<A, S>`: `EventList` + side state behind one lock |
//!
//! # Ordering model (summary)
//!
//! ```text
//! (time, priority, sequence)   ascending
//! ```
//!
//! Lower `Priority` values run first among events at the same time.  The
//! sequence number is assigned on insertion and breaks the remaining ties,
//! so equal `(time, priority)` events run in insertion order.
//!
//! The payload type `A` is opaque to this crate; `tsim-sim` stores its
//! event actions here.

pub mod event;
pub mod list;
pub mod queue;

#[cfg(test)]
mod tests;

pub use event::{EventHandle, Priority, TimedEvent};
pub use list::EventList;
pub use queue::{EventQueue, QueueGuard, QueueState};
