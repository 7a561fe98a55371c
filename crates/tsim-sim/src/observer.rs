//! Listener trait for run notifications.

use tsim_core::SimTime;

use crate::SimError;

/// Callbacks invoked by the simulator at key points of a run.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Times are absolute (replication start
/// time plus internal time).
///
/// Listeners are called from the scheduler thread; keep them short.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter;
///
/// impl SimListener for ProgressPrinter {
///     fn on_time_changed(&self, time: SimTime) {
///         println!("now at {time}");
///     }
/// }
/// ```
pub trait SimListener: Send + Sync {
    /// The execution loop started (or resumed after a stop).
    fn on_start(&self, _time: SimTime) {}

    /// Simulated time moved to a new event tick.  Also fired once when a
    /// run ends, with the last known time.
    fn on_time_changed(&self, _time: SimTime) {}

    /// The replication's warmup period ended.
    fn on_warmup(&self, _time: SimTime) {}

    /// An event or move-phase task failed.  Fired before the error policy
    /// is applied.
    fn on_event_error(&self, _error: &SimError) {}

    /// The execution loop exited.
    fn on_stop(&self, _time: SimTime) {}
}

/// A [`SimListener`] that does nothing.
pub struct NoopListener;

impl SimListener for NoopListener {}
