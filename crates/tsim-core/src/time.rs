//! Simulation time model.
//!
//! # Design
//!
//! Time is continuous and measured in simulated seconds.  Internally every
//! run is zero-based: `SimTime(0.0)` is the first instant of the replication.
//! The mapping to absolute time is held in `SimClock`:
//!
//!   absolute_time = start_time + now
//!
//! `SimTime` wraps an `f64`.  Ordering between event times uses
//! [`SimTime::total_cmp`] so ordered collections never see an inconsistent
//! comparison; callers reject non-finite values before they reach a queue.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::{CoreError, CoreResult};

// ── SimTime ───────────────────────────────────────────────────────────────────

/// A point on the simulation time axis, in seconds.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    #[inline]
    pub fn from_secs(secs: f64) -> SimTime {
        SimTime(secs)
    }

    #[inline]
    pub fn as_secs(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Total order over all `f64` values, consistent with `Ord` semantics.
    #[inline]
    pub fn total_cmp(&self, other: &SimTime) -> Ordering {
        self.0.total_cmp(&other.0)
    }

    /// The earlier of two times.
    #[inline]
    pub fn min(self, other: SimTime) -> SimTime {
        if other.0 < self.0 { other } else { self }
    }

    /// The later of two times.
    #[inline]
    pub fn max(self, other: SimTime) -> SimTime {
        if other.0 > self.0 { other } else { self }
    }

    /// Duration elapsed from `earlier` to `self` (negative if `earlier` is later).
    #[inline]
    pub fn since(self, earlier: SimTime) -> SimDuration {
        SimDuration(self.0 - earlier.0)
    }
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;
    #[inline]
    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign<SimDuration> for SimTime {
    #[inline]
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 += rhs.0;
    }
}

impl Sub<SimDuration> for SimTime {
    type Output = SimTime;
    #[inline]
    fn sub(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimDuration;
    #[inline]
    fn sub(self, rhs: SimTime) -> SimDuration {
        SimDuration(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

// ── SimDuration ───────────────────────────────────────────────────────────────

/// A signed span of simulated time, in seconds.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimDuration(pub f64);

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0.0);

    #[inline]
    pub fn from_secs(secs: f64) -> SimDuration {
        SimDuration(secs)
    }

    #[inline]
    pub fn from_millis(millis: f64) -> SimDuration {
        SimDuration(millis / 1_000.0)
    }

    #[inline]
    pub fn as_secs(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0.0
    }
}

impl Add for SimDuration {
    type Output = SimDuration;
    #[inline]
    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0 + rhs.0)
    }
}

impl Sub for SimDuration {
    type Output = SimDuration;
    #[inline]
    fn sub(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0 - rhs.0)
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// The clock of one replication: the current zero-based time plus the
/// absolute anchor, warmup and run length it was configured with.
///
/// `now` only moves forward.  Every mutation goes through
/// [`advance_to`][Self::advance_to], which ignores targets in the past.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Absolute time of internal time zero.
    pub start_time: SimTime,
    /// Length of the warmup period, measured from time zero.
    pub warmup: SimDuration,
    /// Total run length, measured from time zero.
    pub run_length: SimDuration,
    now: SimTime,
}

impl SimClock {
    /// Create a clock at time zero.
    ///
    /// Fails if `run_length` is not strictly positive, or if `warmup` is
    /// negative or longer than the run.
    pub fn new(start_time: SimTime, warmup: SimDuration, run_length: SimDuration) -> CoreResult<Self> {
        if !start_time.is_finite() {
            return Err(CoreError::NonFiniteTime(start_time.0));
        }
        if run_length.0.is_nan() || run_length.0 <= 0.0 {
            return Err(CoreError::InvalidClock(format!(
                "run length must be positive, got {run_length}"
            )));
        }
        if !warmup.0.is_finite() || warmup.is_negative() || warmup.0 > run_length.0 {
            return Err(CoreError::InvalidClock(format!(
                "warmup {warmup} must lie within the run length {run_length}"
            )));
        }
        Ok(Self { start_time, warmup, run_length, now: SimTime::ZERO })
    }

    /// A clock anchored at absolute zero that never reaches its end time.
    pub fn unbounded() -> Self {
        Self {
            start_time: SimTime::ZERO,
            warmup:     SimDuration::ZERO,
            run_length: SimDuration(f64::INFINITY),
            now:        SimTime::ZERO,
        }
    }

    /// Current zero-based simulation time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock to `target` unless that would move it backward.
    ///
    /// Returns `true` if the clock actually moved.
    #[inline]
    pub fn advance_to(&mut self, target: SimTime) -> bool {
        if target.0 > self.now.0 {
            self.now = target;
            true
        } else {
            false
        }
    }

    /// Zero-based time at which the run ends (inclusive).
    #[inline]
    pub fn end_time(&self) -> SimTime {
        SimTime(self.run_length.0)
    }

    /// Zero-based time at which the warmup period ends.
    #[inline]
    pub fn warmup_time(&self) -> SimTime {
        SimTime(self.warmup.0)
    }

    /// Convert a zero-based time to absolute time.
    #[inline]
    pub fn absolute(&self, time: SimTime) -> SimTime {
        SimTime(self.start_time.0 + time.0)
    }

    /// Absolute time corresponding to `now`.
    #[inline]
    pub fn absolute_now(&self) -> SimTime {
        self.absolute(self.now)
    }

    /// Break elapsed time into (day, hour, minute) components from time zero.
    pub fn elapsed_dhm(&self) -> (u64, u32, u32) {
        let total_secs = self.now.0.max(0.0) as u64;
        let days = total_secs / 86_400;
        let hours = ((total_secs % 86_400) / 3_600) as u32;
        let minutes = ((total_secs % 3_600) / 60) as u32;
        (days, hours, minutes)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d, h, m) = self.elapsed_dhm();
        write!(f, "{} (day {} {:02}:{:02})", self.now, d, h, m)
    }
}
