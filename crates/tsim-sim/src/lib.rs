//! `tsim-sim`: discrete-event scheduler for the tsim framework.
//!
//! # Processing one tick
//!
//! ```text
//! loop:
//!   ① Due     : find the earliest pending event time t; exit if the queue
//!               is empty, the run was stopped, or t lies past the end.
//!   ② Pace    : (real-time only) wait until t is due on the wall clock,
//!               advancing the clock smoothly below t meanwhile.
//!   ③ Advance : set now = t and notify listeners.
//!   ④ Drain   : execute every event at exactly t in (priority, insertion)
//!               order, including events scheduled at t while draining.
//!               Movement events at t are batched and run in three
//!               barrier-separated phases on the worker pool.
//!   ⑤ Failures: log, report, and apply the ErrorPolicy.
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | Batched movement phases on a Rayon pool (default on).     |
//! | `serde`    | `Serialize`/`Deserialize` for `SimConfig` and friends.    |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsim_core::{ReplicationId, SimDuration, SimTime};
//! use tsim_event::Priority;
//! use tsim_sim::{Replication, SimConfig, Simulator};
//!
//! let sim = Simulator::new(SimConfig::default())?;
//! sim.initialize(Arc::new(Replication::new(
//!     ReplicationId::from(0),
//!     SimTime(0.0),
//!     SimDuration::ZERO,
//!     SimDuration(60.0),
//! )?))?;
//! sim.schedule_at(SimTime(5.0), Priority::NORMAL, |sim| {
//!     println!("hello at {}", sim.now());
//!     Ok(())
//! })?;
//! sim.run()?;
//! ```

pub mod action;
pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod history;
pub mod observer;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod policy;
pub mod realtime;
pub mod replication;
pub mod simulator;


pub use action::{ActionError, ActionFn, ActionResult, EventAction, MovePhase, Movable};
pub use builder::SimulatorBuilder;
pub use config::{ExecutionMode, PacingSettings, SimConfig};
pub use error::{EventExecutionError, PhaseTaskError, SimError, SimResult};
pub use exec::{AsFastAsPossible, ExecutionLoop};
pub use history::{Historical, HistoricalValue, HistoryManager};
pub use observer::{NoopListener, SimListener};
#[cfg(feature = "parallel")]
pub use parallel::MoveExecutor;
pub use policy::{ErrorPolicy, Flow};
pub use realtime::{LagResolution, Pacer, RealTime};
pub use replication::{DEFAULT_CLEANUP_INTERVAL, Replication};
pub use simulator::{Due, Kernel, RunState, SimEventQueue, Simulator};
