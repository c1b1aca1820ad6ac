//! Tick clock for a substrate.
//!
//! The clock is the single source of truth for simulated time. The tick
//! counter is a [`Scalar`], so advancing never overflows no matter how long
//! a run lasts. Anything periodic (collapse, sampling, births) is derived
//! from the counter, never stored independently.

use causet_types::Scalar;

/// Tick counter for one substrate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickClock {
    tick: Scalar,
}

impl TickClock {
    /// A clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: Scalar::ZERO }
    }

    /// A clock resumed at an arbitrary tick (state restoration, tests).
    pub const fn at(tick: Scalar) -> Self {
        Self { tick }
    }

    /// Advance by one tick and return the new tick.
    pub fn advance(&mut self) -> &Scalar {
        self.tick = &self.tick + &Scalar::one();
        &self.tick
    }

    /// The current tick.
    pub const fn tick(&self) -> &Scalar {
        &self.tick
    }

    /// Whether the current tick is a positive multiple of `period`.
    ///
    /// A zero period disables the schedule.
    pub fn is_period_boundary(&self, period: u64) -> bool {
        period != 0 && !self.tick.is_zero() && self.tick.is_multiple_of(&Scalar::from(period))
    }
}
