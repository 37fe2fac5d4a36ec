//! Minimal differential-drive kinematics and wall sensing.
//!
//! Robots are points with a heading. Each tick the motion command a
//! controller left in its [`ActuatorCommands`] is integrated over one unit
//! of time, with the heading change clamped to the body's turn rate and the
//! position clamped to the arena.

use serde::{Deserialize, Serialize};

use fordyca_controller::{ActuatorCommands, MotionCommand};
use fordyca_types::{Vec2, normalize_angle};

use crate::config::BodyConfig;

/// Distance kept between a robot and the arena walls.
const WALL_MARGIN: f64 = 1e-3;

/// Position and heading of one robot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Real-valued position.
    pub position: Vec2,
    /// Heading in radians, in `(-pi, pi]`.
    pub heading: f64,
}

impl Body {
    /// A body at `position` facing `heading`.
    pub fn new(position: Vec2, heading: f64) -> Self {
        Self {
            position,
            heading: normalize_angle(heading),
        }
    }

    /// Integrate one tick of `commands` inside a `width` x `height` arena.
    pub fn integrate(
        &mut self,
        commands: &ActuatorCommands,
        body: &BodyConfig,
        width: f64,
        height: f64,
    ) {
        let (linear, angular) = match commands.motion {
            MotionCommand::Stop => return,
            MotionCommand::Wheels { linear, angular } => (linear, angular),
            MotionCommand::Heading(target) => {
                let error = normalize_angle(target.angle() - self.heading);
                (target.length() * error.cos().max(0.0), error)
            }
        };
        let turn = angular.clamp(-body.max_turn, body.max_turn);
        self.heading = normalize_angle(self.heading + turn);
        let next = self.position + Vec2::from_angle(self.heading) * linear;
        self.position = clamp_to_arena(next, width, height);
    }
}

fn clamp_to_arena(pos: Vec2, width: f64, height: f64) -> Vec2 {
    let max_x = (width - WALL_MARGIN).max(WALL_MARGIN);
    let max_y = (height - WALL_MARGIN).max(WALL_MARGIN);
    Vec2::new(pos.x.clamp(WALL_MARGIN, max_x), pos.y.clamp(WALL_MARGIN, max_y))
}

/// Direction away from every wall closer than `range`, weighted by
/// proximity. Zero when no wall is in range.
pub fn wall_diffusion(pos: Vec2, width: f64, height: f64, range: f64) -> Vec2 {
    if range <= 0.0 {
        return Vec2::ZERO;
    }
    let push = |dist: f64| {
        if dist < range {
            1.0 - dist.max(0.0) / range
        } else {
            0.0
        }
    };
    let x = push(pos.x) - push(width - pos.x);
    let y = push(pos.y) - push(height - pos.y);
    Vec2::new(x, y)
}

#[cfg(test)]
mod tests {
    use core::f64::consts::FRAC_PI_2;

    use fordyca_types::LedColor;

    use super::*;

    const EPS: f64 = 1e-9;

    fn commands(motion: MotionCommand) -> ActuatorCommands {
        ActuatorCommands {
            motion,
            led: LedColor::default(),
        }
    }

    #[test]
    fn stop_leaves_body_in_place() {
        let mut body = Body::new(Vec2::new(1.0, 1.0), 0.3);
        let before = body;
        body.integrate(&commands(MotionCommand::Stop), &BodyConfig::default(), 10.0, 10.0);
        assert_eq!(body, before);
    }

    #[test]
    fn wheels_move_along_heading() {
        let mut body = Body::new(Vec2::new(1.0, 1.0), 0.0);
        let cmd = commands(MotionCommand::Wheels {
            linear: 0.05,
            angular: 0.0,
        });
        body.integrate(&cmd, &BodyConfig::default(), 10.0, 10.0);
        assert!((body.position.x - 1.05).abs() < EPS);
        assert!((body.position.y - 1.0).abs() < EPS);
    }

    #[test]
    fn turn_rate_is_clamped() {
        let mut body = Body::new(Vec2::new(5.0, 5.0), 0.0);
        let cmd = commands(MotionCommand::Wheels {
            linear: 0.0,
            angular: 3.0,
        });
        body.integrate(&cmd, &BodyConfig::default(), 10.0, 10.0);
        assert!((body.heading - 0.6).abs() < EPS);
    }

    #[test]
    fn heading_command_turns_before_driving() {
        let mut body = Body::new(Vec2::new(5.0, 5.0), 0.0);
        let cmd = commands(MotionCommand::Heading(Vec2::new(-0.05, 0.0)));
        body.integrate(&cmd, &BodyConfig::default(), 10.0, 10.0);
        // Facing away from the target: no forward motion on the first tick.
        assert!((body.position.x - 5.0).abs() < EPS);
        assert!(body.heading.abs() > 0.5);
    }

    #[test]
    fn position_is_clamped_to_arena() {
        let mut body = Body::new(Vec2::new(9.99, 5.0), 0.0);
        let cmd = commands(MotionCommand::Wheels {
            linear: 1.0,
            angular: 0.0,
        });
        body.integrate(&cmd, &BodyConfig::default(), 10.0, 10.0);
        assert!(body.position.x < 10.0);
    }

    #[test]
    fn walls_push_inward() {
        let d = wall_diffusion(Vec2::new(0.1, 5.0), 10.0, 10.0, 0.3);
        assert!(d.x > 0.0);
        assert!(d.y.abs() < EPS);

        let d = wall_diffusion(Vec2::new(5.0, 9.95), 10.0, 10.0, 0.3);
        assert!(d.y < 0.0);
        assert!((d.angle() + FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn no_diffusion_away_from_walls() {
        let d = wall_diffusion(Vec2::new(5.0, 5.0), 10.0, 10.0, 0.3);
        assert!(d.length() < EPS);
    }
}
