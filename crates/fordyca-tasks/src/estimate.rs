//! Rolling time estimates.
//!
//! Both flavours track a duration in ticks. They are only ever updated when a
//! task finishes or aborts.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// How a [`TimeEstimate`] folds in new samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EstimationMethod {
    /// `estimate <- alpha * sample + (1 - alpha) * estimate`.
    Exponential {
        /// Weight of the newest sample, in `(0, 1]`.
        alpha: f64,
    },
    /// Mean of the most recent `window` samples.
    Windowed {
        /// Number of samples kept.
        window: usize,
    },
}

impl Default for EstimationMethod {
    fn default() -> Self {
        Self::Exponential { alpha: 0.8 }
    }
}

impl EstimationMethod {
    /// Whether the parameters are usable.
    pub fn is_valid(self) -> bool {
        match self {
            Self::Exponential { alpha } => alpha > 0.0 && alpha <= 1.0,
            Self::Windowed { window } => window > 0,
        }
    }
}

/// A rolling estimate of a duration, in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEstimate {
    method: EstimationMethod,
    value: f64,
    window: VecDeque<f64>,
    n_samples: u64,
}

impl TimeEstimate {
    /// An estimate with no samples.
    pub fn new(method: EstimationMethod) -> Self {
        Self {
            method,
            value: 0.0,
            window: VecDeque::new(),
            n_samples: 0,
        }
    }

    /// Current estimate; zero until the first sample.
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Number of samples folded in so far.
    pub const fn n_samples(&self) -> u64 {
        self.n_samples
    }

    /// Whether at least one sample has been seen.
    pub const fn has_samples(&self) -> bool {
        self.n_samples > 0
    }

    /// Fold in a new sample. The first sample seeds the estimate directly.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, sample: f64) {
        match self.method {
            EstimationMethod::Exponential { alpha } => {
                self.value = if self.has_samples() {
                    alpha.mul_add(sample, (1.0 - alpha) * self.value)
                } else {
                    sample
                };
            }
            EstimationMethod::Windowed { window } => {
                self.window.push_back(sample);
                while self.window.len() > window {
                    self.window.pop_front();
                }
                let n = self.window.len().max(1);
                self.value = self.window.iter().sum::<f64>() / n as f64;
            }
        }
        self.n_samples = self.n_samples.saturating_add(1);
    }

    /// Discard all samples.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.window.clear();
        self.n_samples = 0;
    }
}
