//! `tsim-core`: foundational types for the `tsim` traffic simulation framework.
//!
//! This crate is a dependency of every other `tsim-*` crate.  It has no
//! `tsim-*` dependencies and only `thiserror` (plus optional `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                               |
//! |-------------|--------------------------------------------------------|
//! | [`ids`]     | `EntityId`, `ReplicationId`                            |
//! | [`time`]    | `SimTime`, `SimDuration`, `SimClock`                   |
//! | [`error`]   | `CoreError`, `CoreResult`                              |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use ids::{EntityId, ReplicationId};
pub use time::{SimClock, SimDuration, SimTime};
