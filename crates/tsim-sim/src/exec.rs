//! Execution loops.
//!
//! An [`ExecutionLoop`] decides *when* the next tick is processed; the
//! simulator decides *what* processing a tick means.  Loops are built from
//! [`Simulator::next_due`] and [`Simulator::process_tick`].

use crate::{Flow, Simulator};

/// Drives a simulator's event list until it runs dry or is stopped.
pub trait ExecutionLoop: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn run(&self, sim: &Simulator);
}

/// Processes ticks back to back with no wall-clock pacing.
#[derive(Copy, Clone, Debug, Default)]
pub struct AsFastAsPossible;

impl ExecutionLoop for AsFastAsPossible {
    fn name(&self) -> &'static str {
        "as-fast-as-possible"
    }

    fn run(&self, sim: &Simulator) {
        while let Some(due) = sim.next_due() {
            if sim.process_tick(due.time) == Flow::Halt {
                break;
            }
        }
    }
}
