//! Correlated random walk.
//!
//! The robot holds a heading until `unsuccessful_explore_ticks` pass without
//! its owner declaring success, then draws a new one. Obstacles interrupt
//! the walk the same way they interrupt vectoring.

use core::f64::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use fordyca_types::{LedColor, Vec2};

use crate::config::ControllerParams;
use crate::hfsm::{Hfsm, HfsmState, Transition, row};
use crate::sensing::{Actuation, Sensing};

use super::{avoid, drive_straight};

/// Exploration states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreState {
    /// Not yet started.
    Start,
    /// Superstate of the obstacle-free walking states.
    Wander,
    /// Holding the current heading.
    Explore,
    /// Drawing a new heading.
    NewDirection,
    /// Following the diffusion vector.
    CollisionAvoidance,
    /// Driving straight after an obstacle cleared.
    CollisionRecovery,
}

impl HfsmState for ExploreState {
    fn parent(self) -> Option<Self> {
        match self {
            Self::Explore | Self::NewDirection => Some(Self::Wander),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExploreEvent {
    Begin,
    Timeout,
    DirectionChosen,
    Obstacle,
    ObstacleCleared,
    RecoveryDone,
}

const TABLE: &[Transition<ExploreState, ExploreEvent>] = &[
    row(ExploreState::Start, ExploreEvent::Begin, ExploreState::Explore),
    row(ExploreState::Explore, ExploreEvent::Timeout, ExploreState::NewDirection),
    row(
        ExploreState::NewDirection,
        ExploreEvent::DirectionChosen,
        ExploreState::Explore,
    ),
    row(
        ExploreState::Wander,
        ExploreEvent::Obstacle,
        ExploreState::CollisionAvoidance,
    ),
    row(
        ExploreState::CollisionRecovery,
        ExploreEvent::Obstacle,
        ExploreState::CollisionAvoidance,
    ),
    row(
        ExploreState::CollisionAvoidance,
        ExploreEvent::ObstacleCleared,
        ExploreState::CollisionRecovery,
    ),
    row(
        ExploreState::CollisionRecovery,
        ExploreEvent::RecoveryDone,
        ExploreState::Explore,
    ),
];

/// Random-walk exploration.
#[derive(Debug, Clone)]
pub struct ExploreFsm {
    fsm: Hfsm<ExploreState, ExploreEvent>,
    rng: SmallRng,
    direction: f64,
    ticks: u32,
    speed: f64,
    patience: u32,
    recovery_ticks: u32,
    recovery_left: u32,
}

impl ExploreFsm {
    /// Build an idle explorer drawing headings from `seed`.
    pub fn new(params: &ControllerParams, seed: u64) -> Self {
        Self {
            fsm: Hfsm::new("explore", ExploreState::Start, TABLE),
            rng: SmallRng::seed_from_u64(seed),
            direction: 0.0,
            ticks: 0,
            speed: params.motion.max_speed,
            patience: params.motion.unsuccessful_explore_ticks,
            recovery_ticks: params.motion.collision_recovery_ticks,
            recovery_left: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> ExploreState {
        self.fsm.current()
    }

    /// Whether the walk has started.
    pub const fn is_exploring(&self) -> bool {
        !matches!(self.fsm.current(), ExploreState::Start)
    }

    /// Heading the walk is holding.
    pub const fn direction(&self) -> f64 {
        self.direction
    }

    /// Return to START.
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.ticks = 0;
        self.recovery_left = 0;
    }

    /// Run one tick.
    pub fn step<S, A>(&mut self, sensors: &S, actuators: &mut A)
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        match self.fsm.current() {
            ExploreState::Start => {
                self.direction = sensors.heading();
                self.ticks = 0;
                self.fsm.dispatch(ExploreEvent::Begin);
                self.wander(actuators);
            }
            ExploreState::Explore => {
                if sensors.obstacle_detected() {
                    self.fsm.dispatch(ExploreEvent::Obstacle);
                    avoid(sensors, actuators, self.speed);
                    return;
                }
                self.ticks = self.ticks.saturating_add(1);
                if self.ticks >= self.patience {
                    self.fsm.dispatch(ExploreEvent::Timeout);
                }
                self.wander(actuators);
            }
            ExploreState::NewDirection => {
                if sensors.obstacle_detected() {
                    self.fsm.dispatch(ExploreEvent::Obstacle);
                    avoid(sensors, actuators, self.speed);
                    return;
                }
                self.direction = self.rng.random_range(-PI..PI);
                self.ticks = 0;
                self.fsm.dispatch(ExploreEvent::DirectionChosen);
                self.wander(actuators);
            }
            ExploreState::CollisionAvoidance => {
                if sensors.obstacle_detected() {
                    avoid(sensors, actuators, self.speed);
                } else {
                    self.fsm.dispatch(ExploreEvent::ObstacleCleared);
                    self.recovery_left = self.recovery_ticks;
                    drive_straight(sensors, actuators, self.speed);
                }
            }
            ExploreState::CollisionRecovery => {
                if sensors.obstacle_detected() {
                    self.fsm.dispatch(ExploreEvent::Obstacle);
                    avoid(sensors, actuators, self.speed);
                } else if self.recovery_left == 0 {
                    self.direction = sensors.heading();
                    self.ticks = 0;
                    self.fsm.dispatch(ExploreEvent::RecoveryDone);
                    self.wander(actuators);
                } else {
                    self.recovery_left = self.recovery_left.saturating_sub(1);
                    drive_straight(sensors, actuators, self.speed);
                }
            }
            ExploreState::Wander => self.wander(actuators),
        }
    }

    fn wander<A: Actuation + ?Sized>(&self, actuators: &mut A) {
        actuators.set_heading(Vec2::from_angle(self.direction) * self.speed);
        actuators.leds_set_color(LedColor::Magenta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{ActuatorCommands, MotionCommand, SensorSnapshot};

    fn params(patience: u32) -> ControllerParams {
        let mut p = ControllerParams::default();
        p.motion.unsuccessful_explore_ticks = patience;
        p
    }

    #[test]
    fn starts_along_current_heading() {
        let mut e = ExploreFsm::new(&params(5), 1);
        let mut cmds = ActuatorCommands::default();
        let s = SensorSnapshot {
            heading: 1.0,
            ..SensorSnapshot::default()
        };
        e.step(&s, &mut cmds);
        assert_eq!(e.state(), ExploreState::Explore);
        assert!((e.direction() - 1.0).abs() < 1e-12);
        assert!(matches!(cmds.motion, MotionCommand::Heading(_)));
        assert_eq!(cmds.led, LedColor::Magenta);
    }

    #[test]
    fn changes_direction_after_patience_runs_out() {
        let mut e = ExploreFsm::new(&params(3), 7);
        let mut cmds = ActuatorCommands::default();
        let s = SensorSnapshot::default();
        e.step(&s, &mut cmds);
        for _ in 0..3 {
            e.step(&s, &mut cmds);
        }
        assert_eq!(e.state(), ExploreState::NewDirection);
        e.step(&s, &mut cmds);
        assert_eq!(e.state(), ExploreState::Explore);
    }

    #[test]
    fn obstacle_interrupts_any_wander_state() {
        let mut e = ExploreFsm::new(&params(1), 3);
        let mut cmds = ActuatorCommands::default();
        let clear = SensorSnapshot::default();
        e.step(&clear, &mut cmds);
        e.step(&clear, &mut cmds);
        assert_eq!(e.state(), ExploreState::NewDirection);
        let blocked = SensorSnapshot {
            diffusion: Vec2::new(1.0, 0.0),
            ..SensorSnapshot::default()
        };
        e.step(&blocked, &mut cmds);
        assert_eq!(e.state(), ExploreState::CollisionAvoidance);
        e.step(&clear, &mut cmds);
        assert_eq!(e.state(), ExploreState::CollisionRecovery);
    }

    #[test]
    fn same_seed_same_walk() {
        let mut a = ExploreFsm::new(&params(1), 11);
        let mut b = ExploreFsm::new(&params(1), 11);
        let mut cmds = ActuatorCommands::default();
        let s = SensorSnapshot::default();
        for _ in 0..6 {
            a.step(&s, &mut cmds);
            b.step(&s, &mut cmds);
        }
        assert!((a.direction() - b.direction()).abs() < 1e-12);
    }
}
