//! Pheromone density: the confidence attached to a perceived cell.
//!
//! A sighting deposits [`DEPOSIT`] units. Between deposits the density decays
//! geometrically, `density <- rho * density`, so it is non-increasing until
//! the next observation. Without repeat deposit the value never exceeds 1.0.

use serde::{Deserialize, Serialize};

/// Density below which a perceived cell is forgotten.
pub const EPSILON: f64 = 1e-4;

/// Amount deposited by a single sighting.
pub const DEPOSIT: f64 = 1.0;

/// Scalar relevance of a perceived cell, in `[0, inf)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PheromoneDensity {
    value: f64,
}

impl PheromoneDensity {
    /// A density of zero.
    pub const fn new() -> Self {
        Self { value: 0.0 }
    }

    /// A density with the given value, clamped at zero.
    pub fn with_value(value: f64) -> Self {
        Self {
            value: value.max(0.0),
        }
    }

    /// Current value.
    pub const fn value(self) -> f64 {
        self.value
    }

    /// Whether the density is still above the forgetting threshold.
    pub fn is_relevant(self) -> bool {
        self.value >= EPSILON
    }

    /// Apply one tick of geometric decay.
    pub fn decay(&mut self, rho: f64) {
        self.value *= rho;
    }

    /// Deposit [`DEPOSIT`] units. With `repeat` the deposit accumulates
    /// without bound; otherwise the result is capped at 1.0.
    pub fn deposit(&mut self, repeat: bool) {
        let next = self.value + DEPOSIT;
        self.value = if repeat { next } else { next.min(DEPOSIT) };
    }

    /// Drop the density to zero.
    pub const fn reset(&mut self) {
        self.value = 0.0;
    }
}
