//! Time-bounded history of element state.
//!
//! A [`HistoryManager`] periodically tells every registered [`Historical`]
//! element to forget state older than `now - history`.  Elements are held
//! weakly; dropping the element is enough to unregister it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};
use tsim_core::{SimDuration, SimTime};
use tsim_event::Priority;

use crate::{SimError, SimResult, Simulator};

/// Something that keeps past state and can discard it.
pub trait Historical: Send + Sync {
    /// Forget state no longer needed to answer queries at or after
    /// `cutoff`.  Returns the number of entries discarded.
    fn cleanup_before(&self, cutoff: SimTime) -> usize;
}

/// The simulator initialization a manager's cleanup chain belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct Binding {
    sim:   usize,
    epoch: u64,
}

impl Binding {
    fn of(sim: &Simulator) -> Self {
        Self { sim: Arc::as_ptr(&sim.shared) as usize, epoch: sim.epoch() }
    }
}

/// Schedules recurring cleanup of registered [`Historical`] elements.
///
/// The cleanup chain lives in the simulator's queue, so it is lost when the
/// simulator is re-initialized; [`start`][Self::start] re-arms it.
pub struct HistoryManager {
    history:          SimDuration,
    cleanup_interval: SimDuration,
    elements:         Mutex<Vec<Weak<dyn Historical>>>,
    bound:            Mutex<Option<Binding>>,
}

impl HistoryManager {
    /// `history` is how far back state must remain queryable;
    /// `cleanup_interval` is the simulated time between cleanups.
    pub fn new(history: SimDuration, cleanup_interval: SimDuration) -> SimResult<Self> {
        if !history.as_secs().is_finite() || history.is_negative() {
            return Err(SimError::InvalidConfiguration(format!(
                "history must be finite and non-negative, got {history}"
            )));
        }
        if !cleanup_interval.as_secs().is_finite() || cleanup_interval.as_secs() <= 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "cleanup interval must be finite and positive, got {cleanup_interval}"
            )));
        }
        Ok(Self {
            history,
            cleanup_interval,
            elements: Mutex::new(Vec::new()),
            bound: Mutex::new(None),
        })
    }

    pub fn history(&self) -> SimDuration {
        self.history
    }

    pub fn cleanup_interval(&self) -> SimDuration {
        self.cleanup_interval
    }

    pub fn is_started(&self) -> bool {
        self.bound.lock().is_some()
    }

    /// `true` if the cleanup chain is scheduled on `sim` as currently
    /// initialized.
    pub fn is_bound_to(&self, sim: &Simulator) -> bool {
        *self.bound.lock() == Some(Binding::of(sim))
    }

    pub fn register<H: Historical + 'static>(&self, element: &Arc<H>) {
        let weak: Weak<H> = Arc::downgrade(element);
        let weak: Weak<dyn Historical> = weak;
        self.elements.lock().push(weak);
    }

    /// Number of registered elements still alive.
    pub fn live_elements(&self) -> usize {
        self.elements.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Clean every live element up to `now - history` and forget dropped
    /// ones.  Returns the total number of entries discarded.
    pub fn cleanup(&self, now: SimTime) -> usize {
        let cutoff = now - self.history;
        let live: Vec<Arc<dyn Historical>> = {
            let mut elements = self.elements.lock();
            elements.retain(|w| w.strong_count() > 0);
            elements.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter().map(|e| e.cleanup_before(cutoff)).sum()
    }

    /// Bind to `sim` and schedule the recurring cleanup.
    ///
    /// Idempotent for one initialization of `sim`.  After `sim` is
    /// re-initialized (which drops the pending cleanup) or when binding to
    /// another simulator, the chain is scheduled afresh and the old one, if
    /// still queued anywhere, ends at its next firing.
    ///
    /// The simulator must already be initialized; cleanups are scheduled up
    /// to the end of the run.
    pub fn start(self: &Arc<Self>, sim: &Simulator) -> SimResult<()> {
        let binding = Binding::of(sim);
        let mut bound = self.bound.lock();
        if *bound == Some(binding) {
            return Ok(());
        }
        self.schedule_cleanup(sim, binding)?;
        *bound = Some(binding);
        debug!(
            history  = %self.history,
            interval = %self.cleanup_interval,
            epoch    = binding.epoch,
            "history manager started"
        );
        Ok(())
    }

    fn schedule_cleanup(self: &Arc<Self>, sim: &Simulator, binding: Binding) -> SimResult<()> {
        let next = sim.now() + self.cleanup_interval;
        if next > sim.clock().end_time() {
            return Ok(());
        }
        let manager = Arc::clone(self);
        sim.schedule_at(next, Priority::LOWEST, move |sim| {
            if *manager.bound.lock() != Some(binding) {
                return Ok(());
            }
            let discarded = manager.cleanup(sim.now());
            trace!(time = %sim.now(), discarded, "history cleanup");
            manager.schedule_cleanup(sim, binding)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("history", &self.history)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("elements", &self.elements.lock().len())
            .field("started", &self.is_started())
            .finish()
    }
}

// ── HistoricalValue ───────────────────────────────────────────────────────────

struct ValueLog<T> {
    current: (SimTime, T),
    past:    VecDeque<(SimTime, T)>,
}

/// A value with a time-stamped change log.
pub struct HistoricalValue<T> {
    log: Mutex<ValueLog<T>>,
}

impl<T: Clone + Send + Sync + 'static> HistoricalValue<T> {
    /// Create a value registered with `manager`.
    pub fn new(manager: &HistoryManager, now: SimTime, initial: T) -> Arc<Self> {
        let value = Arc::new(Self::unmanaged(now, initial));
        manager.register(&value);
        value
    }

    /// Create a value nobody cleans up.
    pub fn unmanaged(now: SimTime, initial: T) -> Self {
        Self { log: Mutex::new(ValueLog { current: (now, initial), past: VecDeque::new() }) }
    }

    /// Record `value` as of `now`.  A second write at the same time (or an
    /// out-of-order earlier one) replaces the current value.
    pub fn set(&self, now: SimTime, value: T) {
        let mut log = self.log.lock();
        if now <= log.current.0 {
            log.current.1 = value;
            return;
        }
        let previous = std::mem::replace(&mut log.current, (now, value));
        log.past.push_back(previous);
    }

    pub fn get(&self) -> T {
        self.log.lock().current.1.clone()
    }

    /// The value in effect at `time`, or `None` if `time` predates the
    /// retained history.
    pub fn get_at(&self, time: SimTime) -> Option<T> {
        let log = self.log.lock();
        if time >= log.current.0 {
            return Some(log.current.1.clone());
        }
        log.past
            .iter()
            .rev()
            .find(|(t, _)| *t <= time)
            .map(|(_, v)| v.clone())
    }

    /// Number of superseded entries still retained.
    pub fn history_len(&self) -> usize {
        self.log.lock().past.len()
    }
}

impl<T: Clone + Send + Sync + 'static> Historical for HistoricalValue<T> {
    fn cleanup_before(&self, cutoff: SimTime) -> usize {
        let mut log = self.log.lock();
        let mut discarded = 0;
        // Drop an entry once its successor took effect at or before the cutoff.
        loop {
            let successor = match log.past.get(1) {
                Some((t, _)) => *t,
                None if log.past.is_empty() => break,
                None => log.current.0,
            };
            if successor > cutoff {
                break;
            }
            log.past.pop_front();
            discarded += 1;
        }
        discarded
    }
}

impl<T: fmt::Debug> fmt::Debug for HistoricalValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.log.lock();
        f.debug_struct("HistoricalValue")
            .field("current", &log.current)
            .field("retained", &log.past.len())
            .finish()
    }
}
