//! Regeneration counters.
//!
//! These are observability state only. The control laws never read them, and resetting them has
//! no effect on the regulator.

use crate::{lit, Real};

/// Counters accumulated by the control task.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegenStats<F> {
    iterations: u64,
    energy_recovered_wh: F,
    max_current: F,
}

impl<F: Real> Default for RegenStats<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Real> RegenStats<F> {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        RegenStats {
            iterations: 0,
            energy_recovered_wh: F::zero(),
            max_current: F::zero(),
        }
    }

    /// Counts one tick that produced `magnitude`.
    pub fn record_tick(&mut self, magnitude: F) {
        self.iterations = self.iterations.wrapping_add(1);
        if magnitude > self.max_current {
            self.max_current = magnitude;
        }
    }

    /// Adds the energy fed into the bus by `current` at `voltage` over `dt` seconds.
    pub fn record_energy(&mut self, current: F, voltage: F, dt: F) {
        let joules = current * voltage * dt;
        self.energy_recovered_wh = self.energy_recovered_wh + joules / lit::<F>(3600.0);
    }

    /// Returns the number of ticks counted.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Returns the energy recovered, in Wh.
    pub fn energy_recovered_wh(&self) -> F {
        self.energy_recovered_wh
    }

    /// Returns the largest magnitude seen.
    pub fn max_current(&self) -> F {
        self.max_current
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
