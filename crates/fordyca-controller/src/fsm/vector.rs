//! Drive to a goal point.
//!
//! ```text
//! START --NewGoal--> VECTOR --Obstacle--> COLLISION_AVOIDANCE
//!                      ^                        |
//!                      |                  ObstacleCleared
//!                      |                        v
//!                      +---RecoveryDone--- COLLISION_RECOVERY
//!
//! ACTIVE = {VECTOR, COLLISION_AVOIDANCE, COLLISION_RECOVERY}
//! ACTIVE --Reached--> ARRIVED, ACTIVE --NewGoal--> VECTOR
//! ```

use tracing::debug;

use fordyca_types::{LedColor, Vec2, normalize_angle};

use crate::config::ControllerParams;
use crate::hfsm::{Hfsm, HfsmState, Transition, row};
use crate::pid::PidLoop;
use crate::sensing::{Actuation, Sensing};

use super::{avoid, drive_straight};

/// Vectoring states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorState {
    /// No goal yet.
    Start,
    /// Superstate of everything that moves toward the goal.
    Active,
    /// Steering toward the goal.
    Vector,
    /// Following the diffusion vector.
    CollisionAvoidance,
    /// Driving straight after an obstacle cleared.
    CollisionRecovery,
    /// Within tolerance of the goal.
    Arrived,
}

impl HfsmState for VectorState {
    fn parent(self) -> Option<Self> {
        match self {
            Self::Vector | Self::CollisionAvoidance | Self::CollisionRecovery => Some(Self::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorEvent {
    NewGoal,
    Obstacle,
    ObstacleCleared,
    RecoveryDone,
    Reached,
}

const TABLE: &[Transition<VectorState, VectorEvent>] = &[
    row(VectorState::Start, VectorEvent::NewGoal, VectorState::Vector),
    row(VectorState::Arrived, VectorEvent::NewGoal, VectorState::Vector),
    row(VectorState::Active, VectorEvent::NewGoal, VectorState::Vector),
    row(VectorState::Vector, VectorEvent::Obstacle, VectorState::CollisionAvoidance),
    row(
        VectorState::CollisionRecovery,
        VectorEvent::Obstacle,
        VectorState::CollisionAvoidance,
    ),
    row(
        VectorState::CollisionAvoidance,
        VectorEvent::ObstacleCleared,
        VectorState::CollisionRecovery,
    ),
    row(
        VectorState::CollisionRecovery,
        VectorEvent::RecoveryDone,
        VectorState::Vector,
    ),
    row(VectorState::Active, VectorEvent::Reached, VectorState::Arrived),
];

/// A point to drive to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    /// Target position.
    pub loc: Vec2,
    /// Arrival radius.
    pub tolerance: f64,
}

impl Goal {
    /// Whether `pos` is within tolerance of the goal.
    pub fn reached_from(&self, pos: Vec2) -> bool {
        self.loc.distance(pos) <= self.tolerance
    }
}

/// Goal-seeking motion with obstacle avoidance.
#[derive(Debug, Clone)]
pub struct VectorFsm {
    fsm: Hfsm<VectorState, VectorEvent>,
    goal: Option<Goal>,
    angular: PidLoop,
    linear: PidLoop,
    speed: f64,
    recovery_ticks: u32,
    recovery_left: u32,
}

impl VectorFsm {
    /// Build an idle machine.
    pub const fn new(params: &ControllerParams) -> Self {
        Self {
            fsm: Hfsm::new("vector", VectorState::Start, TABLE),
            goal: None,
            angular: PidLoop::new(params.vector.angular),
            linear: PidLoop::new(params.vector.linear),
            speed: params.motion.max_speed,
            recovery_ticks: params.motion.collision_recovery_ticks,
            recovery_left: 0,
        }
    }

    /// Start driving to `goal`.
    pub fn set_goal(&mut self, goal: Goal) {
        debug!(goal = %goal.loc, tolerance = goal.tolerance, "New vector goal");
        self.goal = Some(goal);
        self.angular.reset();
        self.linear.reset();
        self.fsm.dispatch(VectorEvent::NewGoal);
    }

    /// Current goal.
    pub const fn goal(&self) -> Option<Goal> {
        self.goal
    }

    /// Current state.
    pub const fn state(&self) -> VectorState {
        self.fsm.current()
    }

    /// Whether the robot is working toward a goal.
    pub fn is_vectoring(&self) -> bool {
        self.fsm.in_state(VectorState::Active)
    }

    /// Whether the robot is handling an obstacle.
    pub fn is_avoiding(&self) -> bool {
        matches!(
            self.fsm.current(),
            VectorState::CollisionAvoidance | VectorState::CollisionRecovery
        )
    }

    /// Whether the last goal was reached.
    pub const fn arrived(&self) -> bool {
        matches!(self.fsm.current(), VectorState::Arrived)
    }

    /// Forget the goal and return to START.
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.goal = None;
        self.angular.reset();
        self.linear.reset();
        self.recovery_left = 0;
    }

    /// Run one tick.
    pub fn step<S, A>(&mut self, sensors: &S, actuators: &mut A)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        let Some(goal) = self.goal else {
            actuators.stop();
            return;
        };
        if !self.is_vectoring() {
            actuators.stop();
            return;
        }
        if goal.reached_from(sensors.position()) {
            self.fsm.dispatch(VectorEvent::Reached);
            self.angular.reset();
            self.linear.reset();
            actuators.stop();
            return;
        }

        match self.fsm.current() {
            VectorState::Vector => {
                if sensors.obstacle_detected() {
                    self.fsm.dispatch(VectorEvent::Obstacle);
                    avoid(sensors, actuators, self.speed);
                } else {
                    self.drive_to(goal.loc, sensors, actuators);
                }
            }
            VectorState::CollisionAvoidance => {
                if sensors.obstacle_detected() {
                    avoid(sensors, actuators, self.speed);
                } else {
                    self.fsm.dispatch(VectorEvent::ObstacleCleared);
                    self.recovery_left = self.recovery_ticks;
                    drive_straight(sensors, actuators, self.speed);
                }
            }
            VectorState::CollisionRecovery => {
                if sensors.obstacle_detected() {
                    self.fsm.dispatch(VectorEvent::Obstacle);
                    avoid(sensors, actuators, self.speed);
                } else if self.recovery_left == 0 {
                    self.fsm.dispatch(VectorEvent::RecoveryDone);
                    self.drive_to(goal.loc, sensors, actuators);
                } else {
                    self.recovery_left = self.recovery_left.saturating_sub(1);
                    drive_straight(sensors, actuators, self.speed);
                }
            }
            VectorState::Start | VectorState::Active | VectorState::Arrived => actuators.stop(),
        }
    }

    fn drive_to<S, A>(&mut self, target: Vec2, sensors: &S, actuators: &mut A)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        let offset = target - sensors.position();
        let error = normalize_angle(offset.angle() - sensors.heading());
        let angular = self.angular.step(error);
        let linear = self.linear.step(offset.length()) * error.cos().max(0.0);
        actuators.set_wheel_speeds(linear, angular);
        actuators.leds_set_color(LedColor::Blue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{ActuatorCommands, MotionCommand, SensorSnapshot};

    /// Apply a motion command to a snapshot with unit-tick kinematics.
    fn integrate(s: &mut SensorSnapshot, cmds: &ActuatorCommands, max_turn: f64) {
        let (linear, angular) = match cmds.motion {
            MotionCommand::Stop => (0.0, 0.0),
            MotionCommand::Wheels { linear, angular } => (linear, angular),
            MotionCommand::Heading(v) => {
                let err = normalize_angle(v.angle() - s.heading);
                (v.length() * err.cos().max(0.0), err)
            }
        };
        s.heading = normalize_angle(s.heading + angular.clamp(-max_turn, max_turn));
        s.position += Vec2::from_angle(s.heading) * linear;
        s.tick = s.tick.saturating_add(1);
    }

    fn goal() -> Goal {
        Goal {
            loc: Vec2::new(2.0, 2.0),
            tolerance: 0.03,
        }
    }

    #[test]
    fn arrival_threshold_is_inclusive_tolerance() {
        let g = goal();
        assert!(g.reached_from(Vec2::new(2.02, 2.0)));
        assert!(!g.reached_from(Vec2::new(2.05, 2.0)));
    }

    #[test]
    fn arrives_when_within_tolerance() {
        let mut v = VectorFsm::new(&ControllerParams::default());
        let mut cmds = ActuatorCommands::default();
        v.set_goal(goal());
        let near = SensorSnapshot {
            position: Vec2::new(2.02, 2.0),
            ..SensorSnapshot::default()
        };
        v.step(&near, &mut cmds);
        assert!(v.arrived());
        assert_eq!(cmds.motion, MotionCommand::Stop);
    }

    #[test]
    fn keeps_vectoring_outside_tolerance() {
        let mut v = VectorFsm::new(&ControllerParams::default());
        let mut cmds = ActuatorCommands::default();
        v.set_goal(goal());
        let far = SensorSnapshot {
            position: Vec2::new(2.05, 2.0),
            ..SensorSnapshot::default()
        };
        v.step(&far, &mut cmds);
        assert_eq!(v.state(), VectorState::Vector);
        assert_eq!(cmds.led, LedColor::Blue);
    }

    #[test]
    fn closing_sequence_arrives_on_first_reading_within_tolerance() {
        let mut v = VectorFsm::new(&ControllerParams::default());
        let mut cmds = ActuatorCommands::default();
        v.set_goal(goal());

        let readings = [3.0, 2.5, 2.1, 2.05, 2.02, 2.01];
        let mut arrivals = Vec::new();
        for (i, x) in readings.into_iter().enumerate() {
            let was_arrived = v.arrived();
            let s = SensorSnapshot {
                position: Vec2::new(x, 2.0),
                ..SensorSnapshot::default()
            };
            cmds.begin_tick();
            v.step(&s, &mut cmds);
            if v.arrived() && !was_arrived {
                arrivals.push(i);
                assert!(v.angular.integral().abs() < 1e-12);
                assert!(v.linear.integral().abs() < 1e-12);
                assert_eq!(cmds.motion, MotionCommand::Stop);
            } else if !v.arrived() {
                assert_eq!(v.state(), VectorState::Vector, "reading {x}");
                assert!(v.linear.integral() > 0.0);
            }
        }
        assert_eq!(arrivals, vec![4]);
        assert!(v.arrived());
    }

    #[test]
    fn drives_to_goal_from_afar() {
        let mut v = VectorFsm::new(&ControllerParams::default());
        let mut cmds = ActuatorCommands::default();
        let mut s = SensorSnapshot::default();
        v.set_goal(goal());
        for _ in 0..500 {
            cmds.begin_tick();
            v.step(&s, &mut cmds);
            if v.arrived() {
                break;
            }
            integrate(&mut s, &cmds, 0.6);
        }
        assert!(v.arrived(), "stuck at {}", s.position);
        assert!(s.position.distance(Vec2::new(2.0, 2.0)) <= 0.03);
    }

    #[test]
    fn obstacle_triggers_avoidance_then_recovery() {
        let params = ControllerParams::default();
        let mut v = VectorFsm::new(&params);
        let mut cmds = ActuatorCommands::default();
        v.set_goal(goal());
        let blocked = SensorSnapshot {
            diffusion: Vec2::new(-1.0, 0.0),
            ..SensorSnapshot::default()
        };
        v.step(&blocked, &mut cmds);
        assert_eq!(v.state(), VectorState::CollisionAvoidance);
        assert_eq!(cmds.led, LedColor::Red);

        let clear = SensorSnapshot::default();
        v.step(&clear, &mut cmds);
        assert_eq!(v.state(), VectorState::CollisionRecovery);
        for _ in 0..params.motion.collision_recovery_ticks {
            v.step(&clear, &mut cmds);
            assert_eq!(v.state(), VectorState::CollisionRecovery);
        }
        v.step(&clear, &mut cmds);
        assert_eq!(v.state(), VectorState::Vector);
    }

    #[test]
    fn new_goal_restarts_from_any_active_state() {
        let mut v = VectorFsm::new(&ControllerParams::default());
        let mut cmds = ActuatorCommands::default();
        v.set_goal(goal());
        let blocked = SensorSnapshot {
            diffusion: Vec2::new(0.0, 1.0),
            ..SensorSnapshot::default()
        };
        v.step(&blocked, &mut cmds);
        assert!(v.is_avoiding());
        v.set_goal(Goal {
            loc: Vec2::new(1.0, 1.0),
            tolerance: 0.05,
        });
        assert_eq!(v.state(), VectorState::Vector);
    }
}
