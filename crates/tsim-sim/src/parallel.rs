//! Parallel movement updates.
//!
//! All movement events due at one tick form a batch.  The batch runs in
//! three phases (prepare, compute, commit), each fanned out over a Rayon
//! pool with one task per entity.  A phase is complete only when every
//! task in it has finished, so no entity ever observes another entity's
//! half-applied move.
//!
//! A phase that does not finish within the configured timeout ends the
//! batch: later phases are skipped and the timeout is reported through the
//! normal failure path.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use tsim_core::{SimDuration, SimTime};
use tsim_event::EventHandle;

use crate::action::catch_action;
use crate::{Flow, MovePhase, Movable, PhaseTaskError, SimError, SimResult, Simulator};

type MoveBatch = [(EventHandle, Arc<dyn Movable>)];

/// Fixed-size worker pool for batched movement events.
pub struct MoveExecutor {
    pool:          rayon::ThreadPool,
    workers:       usize,
    phase_timeout: Duration,
}

struct PhaseOutcome {
    failures:   Vec<SimError>,
    next_moves: Vec<Option<SimDuration>>,
    timed_out:  bool,
}

impl MoveExecutor {
    pub fn new(workers: usize, phase_timeout: Duration) -> SimResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tsim-move-{i}"))
            .build()
            .map_err(|e| SimError::Thread(e.to_string()))?;
        Ok(Self { pool, workers, phase_timeout })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn phase_timeout(&self) -> Duration {
        self.phase_timeout
    }

    /// Run one tick's movement batch through all three phases, then
    /// reschedule the entities whose commit asked for another move.
    pub(crate) fn run_batch(
        &self,
        sim:   &Simulator,
        time:  SimTime,
        batch: Vec<(EventHandle, Arc<dyn Movable>)>,
    ) -> Flow {
        debug!(time = %time, entities = batch.len(), workers = self.workers, "running move batch");

        let mut next_moves = Vec::new();
        for phase in MovePhase::ALL {
            let outcome = self.run_phase(sim, phase, time, &batch);

            let mut flow = Flow::Continue;
            for error in outcome.failures {
                if sim.handle_failure(error) == Flow::Halt {
                    flow = Flow::Halt;
                }
            }
            if outcome.timed_out {
                warn!(phase = %phase, time = %time, "move batch abandoned");
                return flow;
            }
            if flow == Flow::Halt {
                return flow;
            }
            next_moves = outcome.next_moves;
        }

        for ((handle, entity), next) in batch.into_iter().zip(next_moves) {
            if sim.reschedule_move(handle, entity, next) == Flow::Halt {
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    fn run_phase(&self, sim: &Simulator, phase: MovePhase, time: SimTime, batch: &MoveBatch) -> PhaseOutcome {
        let (tx, rx) = mpsc::channel();
        for (index, (_, entity)) in batch.iter().enumerate() {
            let tx = tx.clone();
            let entity = Arc::clone(entity);
            let sim = sim.clone();
            self.pool.spawn(move || {
                let result = catch_action(|| match phase {
                    MovePhase::Prepare => entity.prepare_move(&sim).map(|()| None),
                    MovePhase::Compute => entity.compute_move(&sim).map(|()| None),
                    MovePhase::Commit  => entity.commit_move(&sim),
                });
                // The receiver is gone only after a timeout.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let deadline = Instant::now().checked_add(self.phase_timeout);
        let mut outcome = PhaseOutcome {
            failures:   Vec::new(),
            next_moves: vec![None; batch.len()],
            timed_out:  false,
        };
        let mut pending = batch.len();

        while pending > 0 {
            let received = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, Ok(next))) => {
                    pending -= 1;
                    outcome.next_moves[index] = next;
                }
                Ok((index, Err(source))) => {
                    pending -= 1;
                    let entity = batch[index].1.entity_id();
                    outcome.failures.push(PhaseTaskError { phase, entity, time, source }.into());
                }
                Err(RecvTimeoutError::Timeout) => {
                    outcome.failures.push(SimError::PhaseTimeout {
                        phase,
                        time,
                        timeout: self.phase_timeout,
                        pending,
                    });
                    outcome.timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        outcome
    }
}
