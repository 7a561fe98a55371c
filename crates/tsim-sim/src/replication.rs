//! One run of a model: time anchor, warmup, length and history retention.

use std::sync::{Arc, OnceLock};

use tsim_core::{ReplicationId, SimClock, SimDuration, SimTime};

use crate::{HistoryManager, SimResult, Simulator};

/// Simulated time between history cleanups of the default manager.
pub const DEFAULT_CLEANUP_INTERVAL: SimDuration = SimDuration(10.0);

/// Binds a run to an absolute start time.
///
/// Internally every run starts at `SimTime::ZERO`; times reported to the
/// outside world are `start_time + now`.
#[derive(Debug)]
pub struct Replication {
    id:      ReplicationId,
    clock:   SimClock,
    history: OnceLock<Arc<HistoryManager>>,
}

impl Replication {
    /// Fails if `run_length` is not positive or `warmup` does not fit in it.
    pub fn new(
        id:         ReplicationId,
        start_time: SimTime,
        warmup:     SimDuration,
        run_length: SimDuration,
    ) -> SimResult<Self> {
        let clock = SimClock::new(start_time, warmup, run_length)?;
        Ok(Self { id, clock, history: OnceLock::new() })
    }

    pub fn id(&self) -> ReplicationId {
        self.id
    }

    pub fn start_time(&self) -> SimTime {
        self.clock.start_time
    }

    pub fn warmup(&self) -> SimDuration {
        self.clock.warmup
    }

    pub fn run_length(&self) -> SimDuration {
        self.clock.run_length
    }

    /// Absolute time at which the run ends.
    pub fn end_time(&self) -> SimTime {
        self.clock.absolute(self.clock.end_time())
    }

    /// Convert a zero-based time to absolute time.
    pub fn absolute(&self, time: SimTime) -> SimTime {
        self.clock.absolute(time)
    }

    /// A fresh clock at time zero.
    pub fn make_clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// The history manager of this replication, created on first use with
    /// zero retention and a cleanup every [`DEFAULT_CLEANUP_INTERVAL`].
    ///
    /// Binds the manager to `sim` (scheduling its cleanups) once per
    /// initialization of `sim`.
    pub fn history_manager(&self, sim: &Simulator) -> SimResult<Arc<HistoryManager>> {
        let manager = match self.history.get() {
            Some(manager) => Arc::clone(manager),
            None => {
                let created = Arc::new(HistoryManager::new(SimDuration::ZERO, DEFAULT_CLEANUP_INTERVAL)?);
                Arc::clone(self.history.get_or_init(|| created))
            }
        };
        manager.start(sim)?;
        Ok(manager)
    }

    /// Install a custom history manager.  Returns `false` if one is already
    /// set (explicitly or lazily).
    pub fn set_history_manager(&self, manager: Arc<HistoryManager>) -> bool {
        self.history.set(manager).is_ok()
    }

    pub fn has_history_manager(&self) -> bool {
        self.history.get().is_some()
    }
}
