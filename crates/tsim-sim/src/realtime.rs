//! Wall-clock paced execution.
//!
//! # Design
//!
//! The loop keeps a *baseline*: a pair (wall instant, simulation time) at
//! which the two clocks were last aligned.  The wall deadline of an event at
//! time `t` is
//!
//!   wall_baseline + (t - sim_baseline) / speed_factor
//!
//! The baseline is reset whenever the speed factor changes, after a pause,
//! and (with catch-up disabled) whenever the run falls behind.  With
//! catch-up enabled a lagging run instead jumps simulated time forward, but
//! never past the next pending event.
//!
//! Sleeps are capped at the update interval so stop requests and speed
//! changes are seen promptly.  Between events the clock is advanced
//! smoothly to the paced time, staying strictly below the next event time.

use std::time::{Duration, Instant};

use tracing::{debug, trace};
use tsim_core::{SimDuration, SimTime};
use tsim_event::QueueGuard;

use crate::simulator::{Kernel, RunState};
use crate::{EventAction, ExecutionLoop, Flow, Simulator};

/// What [`Pacer::resolve_lag`] did about a lagging run.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum LagResolution {
    /// Not behind the wall clock.
    OnPace,
    /// Behind, and the lag was dropped by moving the baseline.
    Rebaselined,
    /// Behind, and simulated time should jump to the given time.
    CaughtUp(SimTime),
}

/// Wall-clock to simulation-time mapping for the real-time loop.
#[derive(Copy, Clone, Debug)]
pub struct Pacer {
    wall_baseline: Instant,
    sim_baseline:  SimTime,
    speed_factor:  f64,
}

impl Pacer {
    pub fn new(wall_now: Instant, sim_now: SimTime, speed_factor: f64) -> Self {
        Self { wall_baseline: wall_now, sim_baseline: sim_now, speed_factor }
    }

    pub fn wall_baseline(&self) -> Instant {
        self.wall_baseline
    }

    pub fn sim_baseline(&self) -> SimTime {
        self.sim_baseline
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn rebaseline(&mut self, wall_now: Instant, sim_now: SimTime) {
        self.wall_baseline = wall_now;
        self.sim_baseline = sim_now;
    }

    /// Adopt `speed_factor` if it differs from the current one, moving the
    /// baseline to now.  Returns `true` on a change.
    pub fn observe_speed(&mut self, speed_factor: f64, wall_now: Instant, sim_now: SimTime) -> bool {
        if speed_factor == self.speed_factor {
            return false;
        }
        self.speed_factor = speed_factor;
        self.rebaseline(wall_now, sim_now);
        true
    }

    /// Simulated time that should have elapsed since the baseline.
    pub fn wanted_elapsed(&self, wall_now: Instant) -> SimDuration {
        let wall = wall_now.saturating_duration_since(self.wall_baseline);
        SimDuration(wall.as_secs_f64() * self.speed_factor)
    }

    /// The paced simulation time at `wall_now`.
    pub fn sim_time_at(&self, wall_now: Instant) -> SimTime {
        self.sim_baseline + self.wanted_elapsed(wall_now)
    }

    /// How far `sim_now` trails the paced time, if at all.
    pub fn lag(&self, wall_now: Instant, sim_now: SimTime) -> Option<SimDuration> {
        let lag = self.sim_time_at(wall_now) - sim_now;
        (lag.as_secs() > 0.0).then_some(lag)
    }

    /// Deal with a run that trails the wall clock.
    ///
    /// With `catch_up` the returned jump target is `min(sim_now + lag,
    /// next_event)`; the caller applies it.  Without it the baseline moves
    /// to now and the lag is forgotten.
    pub fn resolve_lag(
        &mut self,
        catch_up:   bool,
        wall_now:   Instant,
        sim_now:    SimTime,
        next_event: SimTime,
    ) -> LagResolution {
        let Some(lag) = self.lag(wall_now, sim_now) else {
            return LagResolution::OnPace;
        };
        if !catch_up {
            self.rebaseline(wall_now, sim_now);
            return LagResolution::Rebaselined;
        }
        let target = (sim_now + lag).min(next_event);
        if target > sim_now {
            LagResolution::CaughtUp(target)
        } else {
            LagResolution::OnPace
        }
    }

    /// Wall instant at which an event at `event_time` is due.
    ///
    /// `None` if the instant is too far away to represent.
    pub fn wall_deadline(&self, event_time: SimTime) -> Option<Instant> {
        let secs = (event_time - self.sim_baseline).as_secs() / self.speed_factor;
        if secs.is_nan() || secs <= 0.0 {
            return Some(self.wall_baseline);
        }
        Duration::try_from_secs_f64(secs)
            .ok()
            .and_then(|d| self.wall_baseline.checked_add(d))
    }
}

/// Paces event execution against the wall clock.
///
/// Reads the speed factor and catch-up flag from the simulator on every
/// iteration, so both may be changed while running.
#[derive(Copy, Clone, Debug, Default)]
pub struct RealTime;

impl ExecutionLoop for RealTime {
    fn name(&self) -> &'static str {
        "real-time"
    }

    fn run(&self, sim: &Simulator) {
        let queue = &sim.shared.queue;
        let mut pacer = {
            let g = queue.lock();
            Pacer::new(Instant::now(), g.state.clock.now(), g.state.pacing.speed_factor)
        };

        while let Some(due) = sim.next_due() {
            let mut g = queue.lock();
            let wall_now = Instant::now();
            let sim_now = g.state.clock.now();
            let pacing = g.state.pacing;

            if due.resumed {
                pacer.rebaseline(wall_now, sim_now);
                trace!(time = %sim_now, "re-baselined after pause");
            }
            if pacer.observe_speed(pacing.speed_factor, wall_now, sim_now) {
                debug!(speed_factor = pacing.speed_factor, time = %sim_now, "speed factor changed");
            }

            let Some(next) = g.events.next_time() else {
                continue;
            };
            match pacer.resolve_lag(pacing.catch_up, wall_now, sim_now, next) {
                LagResolution::CaughtUp(target) => {
                    g.state.clock.advance_to(target);
                    debug!(from = %sim_now, to = %target, "caught up with wall clock");
                }
                LagResolution::Rebaselined => {
                    trace!(time = %sim_now, "lag dropped");
                }
                LagResolution::OnPace => {}
            }

            let Some(tick) = wait_for_tick(sim, &mut pacer, &mut g) else {
                continue;
            };
            drop(g);

            if sim.process_tick(tick) == Flow::Halt {
                break;
            }
        }
    }
}

/// Sleep in update-interval steps until the earliest event is due.
///
/// Returns the due time, or `None` if the run stopped, was paused, or the
/// queue emptied while waiting.
fn wait_for_tick(
    sim:   &Simulator,
    pacer: &mut Pacer,
    g:     &mut QueueGuard<'_, EventAction, Kernel>,
) -> Option<SimTime> {
    loop {
        if g.state.run != RunState::Running {
            return None;
        }
        let next = g.events.next_time()?;
        if next > g.state.clock.end_time() {
            return None;
        }
        let pacing = g.state.pacing;
        let wall_now = Instant::now();
        if pacer.observe_speed(pacing.speed_factor, wall_now, g.state.clock.now()) {
            debug!(speed_factor = pacing.speed_factor, "speed factor changed");
        }

        let wait = match pacer.wall_deadline(next) {
            Some(deadline) if wall_now >= deadline => return Some(next),
            Some(deadline) => (deadline - wall_now).min(pacing.update_interval),
            None => pacing.update_interval,
        };

        let smooth = pacer.sim_time_at(wall_now);
        if smooth < next {
            g.state.clock.advance_to(smooth);
        }
        sim.shared.queue.wait_for(g, wait);
    }
}
