//! ring-road: smallest example for the tsim scheduling core.
//!
//! Simulates a column of cars on a single-lane ring road.  Every car is a
//! `Movable`: it reads the committed state of the car ahead, computes an
//! acceleration, and publishes its new position, all in lock-step with the
//! other cars via the parallel move phases.  A scheduled "incident" lowers
//! the speed limit for half a minute.
//!
//! Usage: `ring-road [config.json]`.  Without a path the run is paced at
//! 20× real time on four move workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tsim_core::{EntityId, ReplicationId, SimDuration, SimTime};
use tsim_event::Priority;
use tsim_sim::{
    ActionError, ActionResult, ExecutionMode, HistoricalValue, Movable, Replication, SimConfig,
    SimListener, Simulator,
};

// ── Constants ─────────────────────────────────────────────────────────────────

const CAR_COUNT:      usize = 24;
const SEED:           u64   = 42;
const RING_LENGTH_M:  f64   = 1_200.0;
const STEP_SECS:      f64   = 0.5;
const START_OF_DAY:   f64   = 7.0 * 3_600.0; // 07:00
const WARMUP_SECS:    f64   = 10.0;
const RUN_SECS:       f64   = 120.0;
const SPEED_LIMIT:    f64   = 14.0;
const INCIDENT_LIMIT: f64   = 6.0;

// Intelligent-driver parameters.
const MAX_ACCEL:   f64 = 1.5;
const COMFORT_DEC: f64 = 2.0;
const MIN_GAP:     f64 = 2.0;
const HEADWAY:     f64 = 1.2;
const CAR_LENGTH:  f64 = 4.5;

// ── Shared road state ─────────────────────────────────────────────────────────

/// Committed state of every car.  Written only in the commit phase.
struct Ring {
    positions:   RwLock<Vec<f64>>,
    speeds:      RwLock<Vec<f64>>,
    speed_limit: AtomicU64,
}

impl Ring {
    fn speed_limit(&self) -> f64 {
        f64::from_bits(self.speed_limit.load(Ordering::Relaxed))
    }

    fn set_speed_limit(&self, limit: f64) {
        self.speed_limit.store(limit.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Default, Clone, Copy)]
struct Staged {
    accel:    f64,
    position: f64,
    speed:    f64,
}

struct Car {
    id:      EntityId,
    index:   usize,
    ring:    Arc<Ring>,
    staged:  Mutex<Staged>,
    history: Arc<HistoricalValue<f64>>,
}

impl Movable for Car {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn prepare_move(&self, _sim: &Simulator) -> ActionResult {
        let leader = (self.index + 1) % CAR_COUNT;
        let (x, v, x_lead, v_lead) = {
            let positions = self.ring.positions.read();
            let speeds = self.ring.speeds.read();
            (positions[self.index], speeds[self.index], positions[leader], speeds[leader])
        };

        let gap = (x_lead - x).rem_euclid(RING_LENGTH_M) - CAR_LENGTH;
        if gap <= 0.0 {
            return Err(format!("{} collided with the car ahead", self.id).into());
        }
        let desired = self.ring.speed_limit();
        let closing = v - v_lead;
        let s_star = MIN_GAP + (v * HEADWAY + v * closing / (2.0 * (MAX_ACCEL * COMFORT_DEC).sqrt())).max(0.0);
        let accel = MAX_ACCEL * (1.0 - (v / desired).powi(4) - (s_star / gap).powi(2));

        let mut staged = self.staged.lock();
        staged.accel = accel;
        staged.position = x;
        staged.speed = v;
        Ok(())
    }

    fn compute_move(&self, _sim: &Simulator) -> ActionResult {
        let mut staged = self.staged.lock();
        let v = staged.speed;
        let v_next = (v + staged.accel * STEP_SECS).max(0.0);
        let travelled = (v + v_next) * 0.5 * STEP_SECS;
        staged.position = (staged.position + travelled).rem_euclid(RING_LENGTH_M);
        staged.speed = v_next;
        Ok(())
    }

    fn commit_move(&self, sim: &Simulator) -> Result<Option<SimDuration>, ActionError> {
        let staged = *self.staged.lock();
        self.ring.positions.write()[self.index] = staged.position;
        self.ring.speeds.write()[self.index] = staged.speed;
        self.history.set(sim.now(), staged.speed);
        Ok(Some(SimDuration(STEP_SECS)))
    }
}

// ── Progress listener ─────────────────────────────────────────────────────────

struct Progress {
    ring:       Arc<Ring>,
    last_print: AtomicU64,
}

impl SimListener for Progress {
    fn on_time_changed(&self, time: SimTime) {
        let whole = time.as_secs() as u64;
        if whole % 10 != 0 || self.last_print.swap(whole, Ordering::Relaxed) == whole {
            return;
        }
        let speeds = self.ring.speeds.read();
        let mean = speeds.iter().sum::<f64>() / speeds.len() as f64;
        info!(time = %clock_label(time), mean_speed = %format!("{mean:.2}"), "progress");
    }

    fn on_warmup(&self, time: SimTime) {
        info!(time = %clock_label(time), "warmup over, measuring");
    }

    fn on_event_error(&self, error: &tsim_sim::SimError) {
        tracing::error!(%error, "simulation error");
    }
}

fn clock_label(time: SimTime) -> String {
    let secs = time.as_secs().max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", secs / 3_600, (secs % 3_600) / 60, secs % 60)
}

// ── main ──────────────────────────────────────────────────────────────────────

fn load_config() -> Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {path}"))
        }
        None => Ok(SimConfig {
            mode: ExecutionMode::RealTime,
            speed_factor: 20.0,
            update_interval_ms: 50,
            move_workers: 4,
            ..SimConfig::default()
        }),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config()?;
    println!("=== ring-road | tsim scheduling core ===");
    println!(
        "Cars: {CAR_COUNT}  |  Ring: {RING_LENGTH_M} m  |  Mode: {:?} ×{}  |  Workers: {}",
        config.mode, config.speed_factor, config.move_workers
    );
    println!();

    // 1. Replication: 07:00 start, short warmup.
    let replication = Arc::new(Replication::new(
        ReplicationId::from(0u32),
        SimTime(START_OF_DAY),
        SimDuration(WARMUP_SECS),
        SimDuration(RUN_SECS),
    )?);

    // 2. Evenly spaced cars with randomised initial speeds.
    let mut rng = SmallRng::seed_from_u64(SEED);
    let spacing = RING_LENGTH_M / CAR_COUNT as f64;
    let ring = Arc::new(Ring {
        positions:   RwLock::new((0..CAR_COUNT).map(|i| i as f64 * spacing).collect()),
        speeds:      RwLock::new((0..CAR_COUNT).map(|_| rng.gen_range(8.0..SPEED_LIMIT)).collect()),
        speed_limit: AtomicU64::new(SPEED_LIMIT.to_bits()),
    });

    // 3. Simulator.
    let progress = Arc::new(Progress { ring: Arc::clone(&ring), last_print: AtomicU64::new(u64::MAX) });
    let sim = Simulator::builder(config)
        .listener(progress)
        .replication(Arc::clone(&replication))
        .build()?;
    let history = replication.history_manager(&sim)?;

    // 4. Cars.
    let mut cars = Vec::with_capacity(CAR_COUNT);
    for index in 0..CAR_COUNT {
        let initial = ring.speeds.read()[index];
        let car = Arc::new(Car {
            id:      EntityId::from(index as u32),
            index,
            ring:    Arc::clone(&ring),
            staged:  Mutex::new(Staged::default()),
            history: HistoricalValue::new(&history, SimTime::ZERO, initial),
        });
        sim.schedule_move_at(SimTime(STEP_SECS), Priority::NORMAL, car.clone())?;
        cars.push(car);
    }

    // 5. Incident: reduced limit from t = 60 s to t = 90 s.
    let r = Arc::clone(&ring);
    sim.schedule_at(SimTime(60.0), Priority::HIGH, move |sim| {
        info!(time = %clock_label(sim.absolute_now()), limit = INCIDENT_LIMIT, "incident: speed limit lowered");
        r.set_speed_limit(INCIDENT_LIMIT);
        Ok(())
    })?;
    let r = Arc::clone(&ring);
    sim.schedule_at(SimTime(90.0), Priority::HIGH, move |sim| {
        info!(time = %clock_label(sim.absolute_now()), limit = SPEED_LIMIT, "incident cleared");
        r.set_speed_limit(SPEED_LIMIT);
        Ok(())
    })?;

    // 6. Run.
    let t0 = Instant::now();
    sim.start()?;
    sim.join();
    let elapsed = t0.elapsed();

    // 7. Summary.
    println!();
    println!("Simulation ended at {} after {:.3} s wall time", clock_label(sim.absolute_now()), elapsed.as_secs_f64());
    if let Some(error) = sim.last_error() {
        println!("  last error: {error}");
    }
    println!();
    println!("{:<6} {:>10} {:>10}", "Car", "Pos (m)", "Speed");
    println!("{}", "-".repeat(28));
    let positions = ring.positions.read();
    for car in &cars {
        println!(
            "{:<6} {:>10.1} {:>10.2}",
            car.index,
            positions[car.index],
            car.history.get(),
        );
    }
    Ok(())
}
