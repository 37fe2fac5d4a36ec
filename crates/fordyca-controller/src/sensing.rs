//! Sensor and actuator seams between a controller and its robot body.
//!
//! The foraging state machines read the world only through [`Sensing`] and
//! act on it only through [`Actuation`]. The headless driver fills a
//! [`SensorSnapshot`] each tick and applies the [`ActuatorCommands`] a
//! controller leaves behind.

use serde::{Deserialize, Serialize};

use fordyca_types::{LedColor, Vec2};

/// What a robot can sense this tick.
pub trait Sensing {
    /// Real-valued position of the robot.
    fn position(&self) -> Vec2;
    /// Heading in radians.
    fn heading(&self) -> f64;
    /// Current simulation tick.
    fn tick(&self) -> u64;
    /// Whether the ground sensor reports a block under the robot.
    fn block_detected(&self) -> bool;
    /// Whether the ground sensor reports a cache under the robot.
    fn cache_detected(&self) -> bool;
    /// Whether the robot stands in the nest.
    fn in_nest(&self) -> bool;
    /// Direction away from nearby obstacles, zero when none are in range.
    fn diffusion_vector(&self) -> Vec2;

    /// Whether any obstacle is in range.
    fn obstacle_detected(&self) -> bool {
        self.diffusion_vector().length() > 0.0
    }
}

/// Plain-data sensor readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Robot position.
    pub position: Vec2,
    /// Robot heading in radians.
    pub heading: f64,
    /// Simulation tick.
    pub tick: u64,
    /// Block under the robot.
    pub block_detected: bool,
    /// Cache under the robot.
    pub cache_detected: bool,
    /// Robot inside the nest.
    pub in_nest: bool,
    /// Obstacle diffusion vector.
    pub diffusion: Vec2,
}

impl Sensing for SensorSnapshot {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn heading(&self) -> f64 {
        self.heading
    }

    fn tick(&self) -> u64 {
        self.tick
    }

    fn block_detected(&self) -> bool {
        self.block_detected
    }

    fn cache_detected(&self) -> bool {
        self.cache_detected
    }

    fn in_nest(&self) -> bool {
        self.in_nest
    }

    fn diffusion_vector(&self) -> Vec2 {
        self.diffusion
    }
}

/// Masks the block sensor on a robot's first control step.
///
/// The ground sensor reports spurious blocks before the robot has moved,
/// so the first reading is discarded.
pub(crate) struct FirstTickFilter<'a, S: ?Sized> {
    inner: &'a S,
    first: bool,
}

impl<'a, S: Sensing + ?Sized> FirstTickFilter<'a, S> {
    pub(crate) const fn new(inner: &'a S, first: bool) -> Self {
        Self { inner, first }
    }
}

impl<S: Sensing + ?Sized> Sensing for FirstTickFilter<'_, S> {
    fn position(&self) -> Vec2 {
        self.inner.position()
    }

    fn heading(&self) -> f64 {
        self.inner.heading()
    }

    fn tick(&self) -> u64 {
        self.inner.tick()
    }

    fn block_detected(&self) -> bool {
        !self.first && self.inner.block_detected()
    }

    fn cache_detected(&self) -> bool {
        self.inner.cache_detected()
    }

    fn in_nest(&self) -> bool {
        self.inner.in_nest()
    }

    fn diffusion_vector(&self) -> Vec2 {
        self.inner.diffusion_vector()
    }
}

/// Motor and LED outputs.
pub trait Actuation {
    /// Drive along `direction`; its length is the forward speed.
    fn set_heading(&mut self, direction: Vec2);
    /// Differential-drive command: forward speed and turn rate.
    fn set_wheel_speeds(&mut self, linear: f64, angular: f64);
    /// Set the LED colour.
    fn leds_set_color(&mut self, color: LedColor);

    /// Stop moving.
    fn stop(&mut self) {
        self.set_wheel_speeds(0.0, 0.0);
    }
}

/// How the robot should move this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Stand still.
    #[default]
    Stop,
    /// Turn toward the vector's direction and drive at its length.
    Heading(Vec2),
    /// Forward speed and turn rate.
    Wheels {
        /// Forward speed.
        linear: f64,
        /// Turn rate in radians per tick.
        angular: f64,
    },
}

/// Records the latest actuator outputs for the driver to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommands {
    /// Last motion command.
    pub motion: MotionCommand,
    /// Last LED colour.
    pub led: LedColor,
}

impl ActuatorCommands {
    /// Clear the motion command, keeping the LED colour.
    pub const fn begin_tick(&mut self) {
        self.motion = MotionCommand::Stop;
    }
}

impl Actuation for ActuatorCommands {
    fn set_heading(&mut self, direction: Vec2) {
        self.motion = MotionCommand::Heading(direction);
    }

    fn set_wheel_speeds(&mut self, linear: f64, angular: f64) {
        self.motion = if linear.abs() < f64::EPSILON && angular.abs() < f64::EPSILON {
            MotionCommand::Stop
        } else {
            MotionCommand::Wheels { linear, angular }
        };
    }

    fn leds_set_color(&mut self, color: LedColor) {
        self.led = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_masks_block_sensor_only() {
        let s = SensorSnapshot {
            block_detected: true,
            cache_detected: true,
            ..SensorSnapshot::default()
        };
        let first = FirstTickFilter::new(&s, true);
        assert!(!first.block_detected());
        assert!(first.cache_detected());
        let later = FirstTickFilter::new(&s, false);
        assert!(later.block_detected());
    }

    #[test]
    fn commands_keep_led_across_ticks() {
        let mut cmds = ActuatorCommands::default();
        cmds.leds_set_color(LedColor::Green);
        cmds.set_wheel_speeds(0.1, 0.0);
        cmds.begin_tick();
        assert_eq!(cmds.motion, MotionCommand::Stop);
        assert_eq!(cmds.led, LedColor::Green);
    }

    #[test]
    fn obstacle_follows_diffusion_vector() {
        let mut s = SensorSnapshot::default();
        assert!(!s.obstacle_detected());
        s.diffusion = Vec2::new(0.0, 1.0);
        assert!(s.obstacle_detected());
    }
}
