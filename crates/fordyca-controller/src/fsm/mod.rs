//! Foraging state machines, from motion primitives up to whole tasks.
//!
//! - [`vector`]: drive to a goal point with PID steering.
//! - [`explore`]: correlated random walk.
//! - [`acquire`]: find and reach a block or cache.
//! - [`foraging`]: acquire, pick up, transport and drop.
//!
//! Both motion machines share the same collision handling: while an
//! obstacle is sensed the robot follows the diffusion vector, then drives
//! straight for a few recovery ticks before resuming.

pub mod acquire;
pub mod explore;
pub mod foraging;
pub mod vector;

use fordyca_types::{LedColor, Vec2};

use crate::sensing::{Actuation, Sensing};

/// Steer away from sensed obstacles.
fn avoid<S, A>(sensors: &S, actuators: &mut A, speed: f64)
where
    S: Sensing + ?Sized,
    A: Actuation + ?Sized,
{
    actuators.set_heading(sensors.diffusion_vector().normalized() * speed);
    actuators.leds_set_color(LedColor::Red);
}

/// Keep the current heading.
fn drive_straight<S, A>(sensors: &S, actuators: &mut A, speed: f64)
where
    S: Sensing + ?Sized,
    A: Actuation + ?Sized,
{
    actuators.set_heading(Vec2::from_angle(sensors.heading()) * speed);
}
