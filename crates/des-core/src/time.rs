//! Simulation time.
//!
//! The clock is a real number read from the scheduler.  Components that work
//! on whole timesteps (the calendar-queue delay, fixed-rate sources) map it
//! onto a `Tick` counter with [`Tick::from_time`].

use std::fmt;

/// The first instant of a run.
pub const EPOCH: f64 = 0.0;

/// A time no event is ever scheduled at.
pub const AFTER_SIMULATION: f64 = f64::INFINITY;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An integral simulation timestep.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// The tick containing `time` (floor).  `None` for negative, NaN or
    /// infinite times.
    pub fn from_time(time: f64) -> Option<Tick> {
        if time.is_finite() && time >= 0.0 {
            Some(Tick(time.floor() as u64))
        } else {
            None
        }
    }

    #[inline]
    pub fn as_time(self) -> f64 {
        self.0 as f64
    }

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
