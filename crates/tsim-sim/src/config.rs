//! Simulator configuration.

use std::time::Duration;

use crate::{ErrorPolicy, SimError, SimResult};

/// Which execution loop drives the event list.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExecutionMode {
    /// Pure event stepping; no wall-clock pacing.
    #[default]
    AsFastAsPossible,
    /// Paced against the wall clock by the speed factor.
    RealTime,
}

/// Top-level simulator configuration.
///
/// Typically loaded from a JSON file by the application (with the `serde`
/// feature) and passed to [`SimulatorBuilder`][crate::SimulatorBuilder].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    pub mode: ExecutionMode,

    /// Simulated seconds per wall-clock second.  Must be finite and > 0.
    /// Can be changed while running via `Simulator::set_speed_factor`.
    pub speed_factor: f64,

    /// When the run lags behind the wall clock, jump simulated time forward
    /// (bounded by the next event) instead of dropping the lag.
    pub catch_up: bool,

    /// Longest single sleep of the real-time loop, in milliseconds.  Stop
    /// requests and speed changes are observed within one interval.
    pub update_interval_ms: u64,

    pub error_policy: ErrorPolicy,

    /// Worker threads for batched movement events.  1 disables batching.
    pub move_workers: usize,

    /// Upper bound on the wall time one move phase may take, in seconds.
    pub phase_timeout_secs: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode:               ExecutionMode::AsFastAsPossible,
            speed_factor:       1.0,
            catch_up:           true,
            update_interval_ms: 100,
            error_policy:       ErrorPolicy::WarnAndContinue,
            move_workers:       1,
            phase_timeout_secs: 3_600,
        }
    }
}

impl SimConfig {
    /// Check every field; returns the first problem found.
    pub fn validate(&self) -> SimResult<()> {
        validate_speed_factor(self.speed_factor)?;
        if self.update_interval_ms == 0 {
            return Err(SimError::InvalidConfiguration(
                "update_interval_ms must be positive".into(),
            ));
        }
        if self.move_workers == 0 {
            return Err(SimError::InvalidConfiguration(
                "move_workers must be at least 1".into(),
            ));
        }
        #[cfg(not(feature = "parallel"))]
        if self.move_workers > 1 {
            return Err(SimError::InvalidConfiguration(
                "move_workers > 1 requires the `parallel` feature".into(),
            ));
        }
        if self.phase_timeout_secs == 0 {
            return Err(SimError::InvalidConfiguration(
                "phase_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The runtime-adjustable subset of this configuration.
    pub fn pacing(&self) -> PacingSettings {
        PacingSettings {
            speed_factor:    self.speed_factor,
            catch_up:        self.catch_up,
            update_interval: Duration::from_millis(self.update_interval_ms),
        }
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }
}

pub(crate) fn validate_speed_factor(speed_factor: f64) -> SimResult<()> {
    if speed_factor.is_finite() && speed_factor > 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfiguration(format!(
            "speed factor must be finite and positive, got {speed_factor}"
        )))
    }
}

/// Pacing settings that may change while the real-time loop runs.
///
/// Held under the event-queue lock and copied out once per loop iteration,
/// so a change is always observed as a whole.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PacingSettings {
    pub speed_factor:    f64,
    pub catch_up:        bool,
    pub update_interval: Duration,
}
