//! The `Simulator` handle and its shared drain step.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::{info, trace, warn};
use tsim_core::{CoreError, SimClock, SimDuration, SimTime};
use tsim_event::{EventHandle, EventQueue, Priority, QueueGuard};

use crate::action::catch_action;
use crate::{
    ActionResult, EventAction, EventExecutionError, ExecutionLoop, Flow, Movable, PacingSettings,
    Replication, SimConfig, SimError, SimListener, SimResult,
};

#[cfg(feature = "parallel")]
use crate::MoveExecutor;

/// The event queue type used by the simulator: actions plus the kernel
/// state guarded by the same lock.
pub type SimEventQueue = EventQueue<EventAction, Kernel>;

/// Run-control state of the execution loop.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// State that must change atomically with the event list.
///
/// Lives inside the event queue's lock.  `clock` is the only copy of the
/// current simulation time.
pub struct Kernel {
    pub(crate) clock:       SimClock,
    pub(crate) run:         RunState,
    pub(crate) pacing:      PacingSettings,
    pub(crate) initialized: bool,
    pub(crate) epoch:       u64,
}

impl Kernel {
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn pacing(&self) -> PacingSettings {
        self.pacing
    }

    /// Number of times the simulator has been initialized.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// The next tick an execution loop should process.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Due {
    pub time:    SimTime,
    /// The loop was paused and has just been resumed.
    pub resumed: bool,
}

enum When {
    At(SimTime),
    After(SimDuration),
}

pub(crate) struct Shared {
    pub(crate) queue:  SimEventQueue,
    pub(crate) config: SimConfig,
    exec:              Box<dyn ExecutionLoop>,
    #[cfg(feature = "parallel")]
    mover:             Option<MoveExecutor>,
    replication:       RwLock<Option<Arc<Replication>>>,
    listeners:         RwLock<Vec<Arc<dyn SimListener>>>,
    last_error:        Mutex<Option<Arc<SimError>>>,
    thread:            Mutex<Option<JoinHandle<()>>>,
}

/// A cheaply clonable handle to one simulator.
///
/// The simulator owns the event list, the clock and the execution loop.
/// Any thread may schedule or cancel events and read the time; the loop
/// itself runs either on a dedicated thread ([`start`][Self::start]) or on
/// the caller's thread ([`run`][Self::run], [`step`][Self::step],
/// [`run_until`][Self::run_until]).
///
/// Create via [`SimulatorBuilder`][crate::SimulatorBuilder].
#[derive(Clone)]
pub struct Simulator {
    pub(crate) shared: Arc<Shared>,
}

impl Simulator {
    pub(crate) fn from_parts(
        config:    SimConfig,
        exec:      Box<dyn ExecutionLoop>,
        listeners: Vec<Arc<dyn SimListener>>,
    ) -> SimResult<Self> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        let mover = if config.move_workers > 1 {
            Some(MoveExecutor::new(config.move_workers, config.phase_timeout())?)
        } else {
            None
        };

        let kernel = Kernel {
            clock:       SimClock::unbounded(),
            run:         RunState::Stopped,
            pacing:      config.pacing(),
            initialized: false,
            epoch:       0,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                queue: EventQueue::with_state(kernel),
                config,
                exec,
                #[cfg(feature = "parallel")]
                mover,
                replication: RwLock::new(None),
                listeners: RwLock::new(listeners),
                last_error: Mutex::new(None),
                thread: Mutex::new(None),
            }),
        })
    }

    // ── Replication lifecycle ─────────────────────────────────────────────

    /// Bind the simulator to `replication`: reset the clock to its time
    /// zero and drop every pending event.
    ///
    /// A positive warmup schedules a warmup marker that notifies listeners.
    pub fn initialize(&self, replication: Arc<Replication>) -> SimResult<()> {
        if self.state() != RunState::Stopped {
            return Err(SimError::AlreadyRunning);
        }
        self.reap_thread();
        let warmup_end = {
            let mut g = self.shared.queue.lock();
            if g.state.run != RunState::Stopped {
                return Err(SimError::AlreadyRunning);
            }
            g.events.clear();
            g.state.clock = replication.make_clock();
            g.state.initialized = true;
            g.state.epoch += 1;
            g.state.clock.warmup_time()
        };
        *self.shared.replication.write() = Some(Arc::clone(&replication));
        *self.shared.last_error.lock() = None;
        self.shared.queue.notify();

        info!(
            replication = %replication.id(),
            start       = %replication.start_time(),
            warmup      = %replication.warmup(),
            run_length  = %replication.run_length(),
            "replication initialized"
        );

        if warmup_end > SimTime::ZERO {
            self.schedule_at(warmup_end, Priority::HIGHEST, |sim| {
                let time = sim.absolute_now();
                info!(time = %time, "warmup period ended");
                sim.fire(|l| l.on_warmup(time));
                Ok(())
            })?;
        }
        Ok(())
    }

    pub fn replication(&self) -> Option<Arc<Replication>> {
        self.shared.replication.read().clone()
    }

    /// Number of completed [`initialize`][Self::initialize] calls.  Anything
    /// scheduled under an older epoch has been discarded.
    pub fn epoch(&self) -> u64 {
        self.shared.queue.lock().state.epoch
    }

    // ── Time ──────────────────────────────────────────────────────────────

    /// Current zero-based simulation time.
    pub fn now(&self) -> SimTime {
        self.shared.queue.lock().state.clock.now()
    }

    /// Current absolute time (replication start time plus [`now`][Self::now]).
    pub fn absolute_now(&self) -> SimTime {
        self.shared.queue.lock().state.clock.absolute_now()
    }

    /// Snapshot of the clock.
    pub fn clock(&self) -> SimClock {
        self.shared.queue.lock().state.clock.clone()
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    /// Schedule `action` at absolute (zero-based) `time`.
    ///
    /// Fails with [`SimError::PastScheduling`] if `time` is before now; the
    /// queue is left unchanged.
    pub fn schedule_at<F>(&self, time: SimTime, priority: Priority, action: F) -> SimResult<EventHandle>
    where
        F: FnOnce(&Simulator) -> ActionResult + Send + 'static,
    {
        self.insert(When::At(time), priority, EventAction::Call(Box::new(action)))
    }

    /// Schedule `action` `delay` after now.  A negative delay fails with
    /// [`SimError::PastScheduling`].
    pub fn schedule_after<F>(&self, delay: SimDuration, priority: Priority, action: F) -> SimResult<EventHandle>
    where
        F: FnOnce(&Simulator) -> ActionResult + Send + 'static,
    {
        self.insert(When::After(delay), priority, EventAction::Call(Box::new(action)))
    }

    /// Schedule `action` at the current time with normal priority.
    pub fn schedule_now<F>(&self, action: F) -> SimResult<EventHandle>
    where
        F: FnOnce(&Simulator) -> ActionResult + Send + 'static,
    {
        self.insert(When::After(SimDuration::ZERO), Priority::NORMAL, EventAction::Call(Box::new(action)))
    }

    /// Schedule a movement update of `entity` at `time`.
    pub fn schedule_move_at(&self, time: SimTime, priority: Priority, entity: Arc<dyn Movable>) -> SimResult<EventHandle> {
        self.insert(When::At(time), priority, EventAction::Move(entity))
    }

    /// Schedule a movement update of `entity` `delay` after now.
    pub fn schedule_move_after(&self, delay: SimDuration, priority: Priority, entity: Arc<dyn Movable>) -> SimResult<EventHandle> {
        self.insert(When::After(delay), priority, EventAction::Move(entity))
    }

    /// Remove a pending event.  Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&self, handle: &EventHandle) -> bool {
        self.shared.queue.remove(handle)
    }

    pub fn pending_events(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn next_event_time(&self) -> Option<SimTime> {
        self.shared.queue.lock().events.next_time()
    }

    /// Handles of all pending events in execution order.
    pub fn event_handles(&self) -> Vec<EventHandle> {
        self.shared.queue.handles()
    }

    fn insert(&self, when: When, priority: Priority, action: EventAction) -> SimResult<EventHandle> {
        let handle = {
            let mut g = self.shared.queue.lock();
            if !g.state.initialized {
                return Err(SimError::NotInitialized);
            }
            let now = g.state.clock.now();
            let time = match when {
                When::At(time) => time,
                When::After(delay) if delay.is_negative() => {
                    return Err(SimError::PastScheduling { requested: now + delay, now });
                }
                When::After(delay) => now + delay,
            };
            if !time.is_finite() {
                return Err(CoreError::NonFiniteTime(time.as_secs()).into());
            }
            if time < now {
                return Err(SimError::PastScheduling { requested: time, now });
            }
            g.events.insert(time, priority, action)
        };
        self.shared.queue.notify();
        Ok(handle)
    }

    // ── Run control ───────────────────────────────────────────────────────

    pub fn state(&self) -> RunState {
        self.shared.queue.lock().state.run
    }

    /// Start the execution loop on a dedicated thread, or resume it if
    /// paused.
    pub fn start(&self) -> SimResult<()> {
        {
            let g = self.shared.queue.lock();
            if !g.state.initialized {
                return Err(SimError::NotInitialized);
            }
            let run = g.state.run;
            match run {
                RunState::Running => return Err(SimError::AlreadyRunning),
                RunState::Paused => {
                    drop(g);
                    self.resume();
                    return Ok(());
                }
                RunState::Stopped => {}
            }
        }

        self.reap_thread();
        {
            let mut g = self.shared.queue.lock();
            if g.state.run != RunState::Stopped {
                return Err(SimError::AlreadyRunning);
            }
            g.state.run = RunState::Running;
        }

        let sim = self.clone();
        let spawned = thread::Builder::new()
            .name("tsim-scheduler".into())
            .spawn(move || sim.drive());
        match spawned {
            Ok(handle) => {
                *self.shared.thread.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.queue.lock().state.run = RunState::Stopped;
                Err(SimError::Thread(e.to_string()))
            }
        }
    }

    /// Suspend a running loop.  Resume with [`resume`][Self::resume] or
    /// [`start`][Self::start].
    pub fn pause(&self) {
        let mut g = self.shared.queue.lock();
        if g.state.run == RunState::Running {
            g.state.run = RunState::Paused;
            drop(g);
            self.shared.queue.notify();
            info!("simulation paused");
        }
    }

    /// Resume a paused loop.  No effect unless paused.
    pub fn resume(&self) {
        let mut g = self.shared.queue.lock();
        if g.state.run == RunState::Paused {
            g.state.run = RunState::Running;
            drop(g);
            self.shared.queue.notify();
            info!("simulation resumed");
        }
    }

    /// Ask the loop to stop.  Observed at the next loop check or wake-up;
    /// use [`join`][Self::join] to wait for the thread to exit.
    pub fn stop(&self) {
        let mut g = self.shared.queue.lock();
        if g.state.run != RunState::Stopped {
            g.state.run = RunState::Stopped;
            drop(g);
            self.shared.queue.notify();
        }
    }

    /// Wait for the scheduler thread started by [`start`][Self::start] to exit.
    pub fn join(&self) {
        self.reap_thread();
    }

    /// Run the execution loop on the calling thread until the queue is
    /// empty, the end time is reached, or the run is stopped.
    pub fn run(&self) -> SimResult<()> {
        {
            let mut g = self.shared.queue.lock();
            check_idle(&g)?;
            g.state.run = RunState::Running;
        }
        self.drive();
        Ok(())
    }

    /// Process the next tick (every event at the earliest pending time).
    ///
    /// Returns `false` if nothing is due before the end of the run.  The run
    /// counts as `Running` while the tick drains.
    pub fn step(&self) -> SimResult<bool> {
        let time = {
            let mut g = self.shared.queue.lock();
            check_idle(&g)?;
            let end = g.state.clock.end_time();
            let Some(time) = g.events.next_time().filter(|t| *t <= end) else {
                return Ok(false);
            };
            g.state.run = RunState::Running;
            time
        };
        self.process_tick(time);
        self.finish_manual_run();
        Ok(true)
    }

    /// Process every tick up to and including `until` as fast as possible,
    /// then move the clock to `until` (bounded by the end of the run).
    ///
    /// A halt or a [`stop`][Self::stop] from inside an event leaves the
    /// clock at the last processed tick.
    pub fn run_until(&self, until: SimTime) -> SimResult<()> {
        {
            let mut g = self.shared.queue.lock();
            check_idle(&g)?;
            g.state.run = RunState::Running;
        }
        let completed = loop {
            let time = {
                let g = self.shared.queue.lock();
                if g.state.run != RunState::Running {
                    break false;
                }
                match g.events.next_time() {
                    Some(t) if t <= until && t <= g.state.clock.end_time() => t,
                    _ => break true,
                }
            };
            if self.process_tick(time) == Flow::Halt {
                break false;
            }
        };
        if completed {
            let mut g = self.shared.queue.lock();
            let bound = until.min(g.state.clock.end_time());
            g.state.clock.advance_to(bound);
        }
        self.finish_manual_run();
        Ok(())
    }

    // ── Pacing ────────────────────────────────────────────────────────────

    pub fn pacing(&self) -> PacingSettings {
        self.shared.queue.lock().state.pacing
    }

    pub fn speed_factor(&self) -> f64 {
        self.pacing().speed_factor
    }

    /// Change the real-time speed factor.  Takes effect within one update
    /// interval; the pacing loop re-baselines when it notices.
    pub fn set_speed_factor(&self, speed_factor: f64) -> SimResult<()> {
        crate::config::validate_speed_factor(speed_factor)?;
        self.shared.queue.lock().state.pacing.speed_factor = speed_factor;
        self.shared.queue.notify();
        Ok(())
    }

    pub fn set_catch_up(&self, catch_up: bool) {
        self.shared.queue.lock().state.pacing.catch_up = catch_up;
        self.shared.queue.notify();
    }

    // ── Listeners and diagnostics ─────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn SimListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// The most recent event failure since the last `initialize`.
    pub fn last_error(&self) -> Option<Arc<SimError>> {
        self.shared.last_error.lock().clone()
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    // ── Execution-loop building blocks ────────────────────────────────────

    /// The next tick to process, or `None` if the loop should exit.
    ///
    /// Blocks while the run is paused.  Exits when the run is stopped, the
    /// queue is empty, or the next event lies beyond the end of the run (in
    /// which case the clock is moved to the end time).
    pub fn next_due(&self) -> Option<Due> {
        let queue = &self.shared.queue;
        let mut g = queue.lock();
        let mut resumed = false;
        while g.state.run == RunState::Paused {
            let interval = g.state.pacing.update_interval;
            queue.wait_for(&mut g, interval);
            resumed = true;
        }
        if g.state.run != RunState::Running {
            return None;
        }
        let time = g.events.next_time()?;
        let end = g.state.clock.end_time();
        if time > end {
            if end.is_finite() {
                g.state.clock.advance_to(end);
            }
            return None;
        }
        Some(Due { time, resumed })
    }

    /// Move the clock to `time`, notify listeners, and drain every event due
    /// at `time`.
    ///
    /// If an event earlier than `time` was inserted after `time` was chosen,
    /// that earlier tick is processed instead and `time` stays pending.
    pub fn process_tick(&self, time: SimTime) -> Flow {
        let (time, absolute) = {
            let mut g = self.shared.queue.lock();
            let time = match g.events.next_time() {
                Some(next) if next < time => next,
                _ => time,
            };
            g.state.clock.advance_to(time);
            (time, g.state.clock.absolute_now())
        };
        self.fire(|l| l.on_time_changed(absolute));
        self.drain_tick(time)
    }

    /// Execute every event due at exactly `time`.
    ///
    /// Movement events are batched when a move executor is configured; other
    /// events run immediately, in queue order.  Events scheduled at `time`
    /// by the events being drained are drained too.
    pub fn drain_tick(&self, time: SimTime) -> Flow {
        loop {
            let mut batch: Vec<(EventHandle, Arc<dyn Movable>)> = Vec::new();
            loop {
                let Some(event) = self.shared.queue.lock().events.pop_due(time) else {
                    break;
                };
                let (handle, action) = event.into_parts();
                match action {
                    EventAction::Move(entity) if self.batches_moves() => batch.push((handle, entity)),
                    action => {
                        if self.execute(handle, action) == Flow::Halt {
                            return Flow::Halt;
                        }
                    }
                }
            }
            if batch.is_empty() {
                return Flow::Continue;
            }
            if self.run_move_batch(time, batch) == Flow::Halt {
                return Flow::Halt;
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn drive(&self) {
        let start = self.absolute_now();
        info!(execution = self.shared.exec.name(), time = %start, "simulation run started");
        self.fire(|l| l.on_start(start));

        self.shared.exec.run(self);

        self.shared.queue.lock().state.run = RunState::Stopped;
        self.shared.queue.notify();

        let end = self.absolute_now();
        self.fire(|l| l.on_time_changed(end));
        self.fire(|l| l.on_stop(end));
        info!(time = %end, pending = self.pending_events(), "simulation run stopped");
    }

    /// Return a run driven from the caller's thread to `Stopped`.
    fn finish_manual_run(&self) {
        let mut g = self.shared.queue.lock();
        if g.state.run != RunState::Stopped {
            g.state.run = RunState::Stopped;
            drop(g);
            self.shared.queue.notify();
        }
    }

    fn execute(&self, handle: EventHandle, action: EventAction) -> Flow {
        trace!(event = %handle, action = ?action, "executing event");
        let result = match action {
            EventAction::Call(f) => catch_action(|| f(self)),
            EventAction::Move(entity) => {
                let outcome = catch_action(|| {
                    entity.prepare_move(self)?;
                    entity.compute_move(self)?;
                    entity.commit_move(self)
                });
                match outcome {
                    Ok(next) => return self.reschedule_move(handle, entity, next),
                    Err(e) => Err(e),
                }
            }
        };
        match result {
            Ok(()) => Flow::Continue,
            Err(source) => self.handle_failure(EventExecutionError { handle, source }.into()),
        }
    }

    pub(crate) fn reschedule_move(
        &self,
        handle: EventHandle,
        entity: Arc<dyn Movable>,
        next:   Option<SimDuration>,
    ) -> Flow {
        let Some(delay) = next else {
            return Flow::Continue;
        };
        match self.schedule_move_after(delay, handle.priority(), entity) {
            Ok(_) => Flow::Continue,
            Err(e) => self.handle_failure(e),
        }
    }

    /// Log and report a failure, then apply the error policy.
    pub(crate) fn handle_failure(&self, error: SimError) -> Flow {
        let policy = self.shared.config.error_policy;
        warn!(time = %self.now(), policy = %policy, error = %error, "event failed");
        let error = Arc::new(error);
        *self.shared.last_error.lock() = Some(Arc::clone(&error));
        self.fire(|l| l.on_event_error(&error));

        let flow = policy.on_failure();
        if flow == Flow::Halt {
            info!("stopping run after failure");
            self.stop();
        }
        flow
    }

    fn fire(&self, f: impl Fn(&dyn SimListener)) {
        let listeners = self.shared.listeners.read().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }

    #[cfg(feature = "parallel")]
    fn batches_moves(&self) -> bool {
        self.shared.mover.is_some()
    }

    #[cfg(not(feature = "parallel"))]
    fn batches_moves(&self) -> bool {
        false
    }

    fn run_move_batch(&self, time: SimTime, batch: Vec<(EventHandle, Arc<dyn Movable>)>) -> Flow {
        #[cfg(feature = "parallel")]
        if let Some(mover) = &self.shared.mover {
            return mover.run_batch(self, time, batch);
        }

        trace!(time = %time, moves = batch.len(), "running moves serially");
        for (handle, entity) in batch {
            if self.execute(handle, EventAction::Move(entity)) == Flow::Halt {
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    fn reap_thread(&self) {
        let mut slot = self.shared.thread.lock();
        let Some(handle) = slot.take() else {
            return;
        };
        // Called from the scheduler thread itself (e.g. inside an event).
        if handle.thread().id() == thread::current().id() {
            *slot = Some(handle);
            return;
        }
        drop(slot);
        if handle.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
}

fn check_idle(g: &QueueGuard<'_, EventAction, Kernel>) -> SimResult<()> {
    if !g.state.initialized {
        return Err(SimError::NotInitialized);
    }
    if g.state.run != RunState::Stopped {
        return Err(SimError::AlreadyRunning);
    }
    Ok(())
}
