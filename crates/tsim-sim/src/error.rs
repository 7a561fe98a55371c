use std::time::Duration;

use thiserror::Error;
use tsim_core::{CoreError, EntityId, SimTime};
use tsim_event::EventHandle;

use crate::{ActionError, MovePhase};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot schedule event at {requested}: simulation time is already {now}")]
    PastScheduling { requested: SimTime, now: SimTime },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("simulator has not been initialized with a replication")]
    NotInitialized,

    #[error("simulator is already running")]
    AlreadyRunning,

    #[error(transparent)]
    EventExecution(#[from] EventExecutionError),

    #[error(transparent)]
    PhaseTask(#[from] PhaseTaskError),

    #[error("{phase} phase at {time} timed out after {timeout:?} with {pending} task(s) unfinished")]
    PhaseTimeout {
        phase:   MovePhase,
        time:    SimTime,
        timeout: Duration,
        pending: usize,
    },

    #[error("failed to start thread: {0}")]
    Thread(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// An event action returned an error (or panicked) while executing.
#[derive(Debug, Error)]
#[error("event {handle} failed: {source}")]
pub struct EventExecutionError {
    pub handle: EventHandle,
    pub source: ActionError,
}

/// One entity's task failed during a parallel move phase.
#[derive(Debug, Error)]
#[error("{phase} phase for {entity} at {time} failed: {source}")]
pub struct PhaseTaskError {
    pub phase:  MovePhase,
    pub entity: EntityId,
    pub time:   SimTime,
    pub source: ActionError,
}

pub type SimResult<T> = Result<T, SimError>;
