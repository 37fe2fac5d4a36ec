//! Discrete PID loop used for steering and speed control.

use serde::{Deserialize, Serialize};

/// PID gains and output limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    #[serde(default)]
    pub ki: f64,
    /// Derivative gain.
    #[serde(default)]
    pub kd: f64,
    /// Lower output bound.
    pub min: f64,
    /// Upper output bound.
    pub max: f64,
}

/// A PID controller with clamped output.
#[derive(Debug, Clone, PartialEq)]
pub struct PidLoop {
    gains: PidGains,
    integral: f64,
    prev_error: Option<f64>,
}

impl PidLoop {
    /// Create a loop with a cleared integrator.
    pub const fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: None,
        }
    }

    /// Compute the next output for `error` over one tick.
    pub fn step(&mut self, error: f64) -> f64 {
        self.integral += error;
        let derivative = self.prev_error.map_or(0.0, |prev| error - prev);
        self.prev_error = Some(error);
        let out = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;
        out.clamp(self.gains.min, self.gains.max)
    }

    /// Clear the integrator and derivative history.
    pub const fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    /// Accumulated integral term input.
    pub const fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn gains() -> PidGains {
        PidGains {
            kp: 1.0,
            ki: 0.1,
            kd: 0.5,
            min: -2.0,
            max: 2.0,
        }
    }

    #[test]
    fn output_combines_terms() {
        let mut pid = PidLoop::new(gains());
        // 1.0 * 1.0 + 0.1 * 1.0 + 0.5 * 0
        assert!((pid.step(1.0) - 1.1).abs() < EPS);
        // 1.0 * 0.5 + 0.1 * 1.5 + 0.5 * -0.5
        assert!((pid.step(0.5) - 0.4).abs() < EPS);
    }

    #[test]
    fn output_is_clamped() {
        let mut pid = PidLoop::new(gains());
        assert!((pid.step(10.0) - 2.0).abs() < EPS);
        assert!((pid.step(-10.0) + 2.0).abs() < EPS);
    }

    #[test]
    fn reset_clears_history() {
        let mut pid = PidLoop::new(gains());
        pid.step(3.0);
        pid.reset();
        assert!(pid.integral().abs() < EPS);
        assert!((pid.step(1.0) - 1.1).abs() < EPS);
    }
}
