//! What an event does when it fires.
//!
//! Most events are closures captured at scheduling time.  Movement events
//! are tagged separately so the drain step can recognise and batch them;
//! see [`crate::parallel`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tsim_core::{EntityId, SimDuration};

use crate::Simulator;

/// Error type returned by event actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ActionResult = Result<(), ActionError>;

/// A one-shot event body.
pub type ActionFn = Box<dyn FnOnce(&Simulator) -> ActionResult + Send + 'static>;

/// An entity whose position update is split into three phases.
///
/// Within one tick, every batched entity finishes `prepare_move` before any
/// entity starts `compute_move`, and every `compute_move` finishes before any
/// `commit_move`.  Implementations must therefore only read other entities'
/// committed state in `prepare_move`, stage their own intentions, and publish
/// new state in `commit_move`.
///
/// Methods take `&self` and may run on worker threads; use interior
/// mutability for per-entity state.
pub trait Movable: Send + Sync + 'static {
    fn entity_id(&self) -> EntityId;

    /// Read the frozen state of the world and stage this entity's intentions.
    fn prepare_move(&self, sim: &Simulator) -> ActionResult;

    /// Compute the new state from the staged intentions.
    fn compute_move(&self, sim: &Simulator) -> ActionResult;

    /// Publish the new state.  Returning `Some(delay)` schedules this
    /// entity's next move `delay` after the current time.
    fn commit_move(&self, sim: &Simulator) -> Result<Option<SimDuration>, ActionError>;
}

/// The three sub-phases of a movement update.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MovePhase {
    Prepare,
    Compute,
    Commit,
}

impl MovePhase {
    pub const ALL: [MovePhase; 3] = [MovePhase::Prepare, MovePhase::Compute, MovePhase::Commit];
}

impl fmt::Display for MovePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MovePhase::Prepare => "prepare",
            MovePhase::Compute => "compute",
            MovePhase::Commit  => "commit",
        })
    }
}

/// The payload stored in the simulator's event list.
pub enum EventAction {
    Call(ActionFn),
    Move(Arc<dyn Movable>),
}

impl fmt::Debug for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventAction::Call(_) => f.write_str("Call"),
            EventAction::Move(m) => write!(f, "Move({})", m.entity_id()),
        }
    }
}

/// Run `f`, turning a panic into an [`ActionError`].
pub(crate) fn catch_action<T>(f: impl FnOnce() -> Result<T, ActionError>) -> Result<T, ActionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(format!("action panicked: {}", panic_message(payload.as_ref())).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
