//! Find and reach a free block or an existing cache.
//!
//! On every tick spent locating, the machine asks for the best known target.
//! With one it vectors there; with none it explores. Arriving at a target
//! the ground sensor does not confirm means the belief was stale: the
//! entity is reported as vanished, excluded from further selection, and a
//! new target is chosen.

use core::mem;

use tracing::{debug, warn};

use fordyca_types::{EntityRef, Vec2};

use crate::config::ControllerParams;
use crate::hfsm::{Hfsm, HfsmState, Transition, row};
use crate::selection::{Knowledge, SelectionParams, Target, best_block, best_cache};
use crate::sensing::{Actuation, Sensing};

use super::explore::ExploreFsm;
use super::vector::{Goal, VectorFsm};

/// What the machine is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionGoal {
    /// A block lying on its own.
    FreeBlock,
    /// A cache to pick from or drop into.
    ExistingCache,
}

/// Acquisition states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireState {
    /// Nothing chosen yet.
    Start,
    /// Superstate of the searching states.
    Locate,
    /// No known target; random walk.
    Explore,
    /// Driving to a known target.
    Vector,
    /// The goal is under the robot.
    Acquired,
}

impl HfsmState for AcquireState {
    fn parent(self) -> Option<Self> {
        match self {
            Self::Explore | Self::Vector => Some(Self::Locate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireEvent {
    TargetSelected,
    NoTarget,
    Acquired,
}

const TABLE: &[Transition<AcquireState, AcquireEvent>] = &[
    row(AcquireState::Start, AcquireEvent::TargetSelected, AcquireState::Vector),
    row(AcquireState::Start, AcquireEvent::NoTarget, AcquireState::Explore),
    row(AcquireState::Explore, AcquireEvent::TargetSelected, AcquireState::Vector),
    row(AcquireState::Vector, AcquireEvent::TargetSelected, AcquireState::Vector),
    row(AcquireState::Vector, AcquireEvent::NoTarget, AcquireState::Explore),
    row(AcquireState::Start, AcquireEvent::Acquired, AcquireState::Acquired),
    row(AcquireState::Locate, AcquireEvent::Acquired, AcquireState::Acquired),
];

/// What the machine may consult this tick.
#[derive(Debug, Clone, Copy)]
pub struct AcquireContext<'a> {
    /// Known blocks and caches.
    pub knowledge: &'a Knowledge,
    /// Nest centre.
    pub nest: Vec2,
    /// Selection tuning.
    pub selection: &'a SelectionParams,
}

/// Locate-and-reach machine for one acquisition goal.
#[derive(Debug, Clone)]
pub struct AcquireGoalFsm {
    fsm: Hfsm<AcquireState, AcquireEvent>,
    goal: AcquisitionGoal,
    vector: VectorFsm,
    explore: ExploreFsm,
    target: Option<Target>,
    excluded: Vec<EntityRef>,
    vanished: Vec<EntityRef>,
    block_tolerance: f64,
    cache_tolerance: f64,
}

impl AcquireGoalFsm {
    /// Build an idle machine.
    pub fn new(params: &ControllerParams, goal: AcquisitionGoal, seed: u64) -> Self {
        Self {
            fsm: Hfsm::new("acquire", AcquireState::Start, TABLE),
            goal,
            vector: VectorFsm::new(params),
            explore: ExploreFsm::new(params, seed),
            target: None,
            excluded: Vec::new(),
            vanished: Vec::new(),
            block_tolerance: params.vector.block_tolerance,
            cache_tolerance: params.vector.cache_tolerance,
        }
    }

    /// Switch to a different goal and start over.
    pub fn set_goal(&mut self, goal: AcquisitionGoal) {
        self.goal = goal;
        self.reset();
    }

    /// The goal being sought.
    pub const fn goal(&self) -> AcquisitionGoal {
        self.goal
    }

    /// Current state.
    pub const fn state(&self) -> AcquireState {
        self.fsm.current()
    }

    /// Target being vectored to, if any.
    pub const fn target(&self) -> Option<Target> {
        self.target
    }

    /// Entities excluded from selection.
    pub fn excluded(&self) -> &[EntityRef] {
        &self.excluded
    }

    /// Whether the robot is exploring.
    pub fn is_exploring(&self) -> bool {
        matches!(self.fsm.current(), AcquireState::Explore) && self.explore.is_exploring()
    }

    /// Whether the robot is vectoring to a target.
    pub fn is_vectoring(&self) -> bool {
        matches!(self.fsm.current(), AcquireState::Vector) && self.vector.is_vectoring()
    }

    /// Whether the goal has been reached.
    pub const fn is_acquired(&self) -> bool {
        matches!(self.fsm.current(), AcquireState::Acquired)
    }

    /// Targets found missing since the last call.
    pub fn take_vanished(&mut self) -> Vec<EntityRef> {
        mem::take(&mut self.vanished)
    }

    /// Return to START, clearing the target and exclusions.
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.vector.reset();
        self.explore.reset();
        self.target = None;
        self.excluded.clear();
    }

    /// Run one tick. Returns `true` once the goal is under the robot.
    pub fn step<S, A>(&mut self, sensors: &S, actuators: &mut A, ctx: &AcquireContext<'_>) -> bool
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        match self.fsm.current() {
            AcquireState::Acquired => {
                actuators.stop();
                true
            }
            AcquireState::Start | AcquireState::Locate => {
                if self.detected(sensors) {
                    return self.acquire(actuators);
                }
                self.retarget(sensors, ctx);
                self.locate(sensors, actuators, ctx)
            }
            AcquireState::Explore | AcquireState::Vector => self.locate(sensors, actuators, ctx),
        }
    }

    fn locate<S, A>(&mut self, sensors: &S, actuators: &mut A, ctx: &AcquireContext<'_>) -> bool
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        if matches!(self.fsm.current(), AcquireState::Explore) {
            if self.detected(sensors) {
                return self.acquire(actuators);
            }
            if let Some(target) = self.select(sensors, ctx) {
                self.vector_to(target);
            } else {
                self.explore.step(sensors, actuators);
                return false;
            }
        }

        let forgotten = self
            .target
            .is_some_and(|t| ctx.knowledge.locate(t.entity).is_none());
        if forgotten {
            debug!(target = ?self.target, "Target no longer known, reselecting");
            self.retarget(sensors, ctx);
            if matches!(self.fsm.current(), AcquireState::Explore) {
                self.explore.step(sensors, actuators);
                return false;
            }
        }

        self.vector.step(sensors, actuators);
        if !self.vector.arrived() {
            return false;
        }
        if self.detected(sensors) {
            return self.acquire(actuators);
        }

        if let Some(target) = self.target.take() {
            warn!(
                target = %target.entity,
                loc = %target.loc,
                "Arrived at target but nothing detected"
            );
            self.vanished.push(target.entity);
            self.excluded.push(target.entity);
        }
        self.retarget(sensors, ctx);
        false
    }

    fn retarget<S: Sensing + ?Sized>(&mut self, sensors: &S, ctx: &AcquireContext<'_>) {
        match self.select(sensors, ctx) {
            Some(target) => self.vector_to(target),
            None => {
                self.target = None;
                self.vector.reset();
                self.explore.reset();
                self.fsm.dispatch(AcquireEvent::NoTarget);
            }
        }
    }

    fn vector_to(&mut self, target: Target) {
        let tolerance = match self.goal {
            AcquisitionGoal::FreeBlock => self.block_tolerance,
            AcquisitionGoal::ExistingCache => self.cache_tolerance,
        };
        debug!(target = %target.entity, utility = target.utility, "Target selected");
        self.target = Some(target);
        self.vector.set_goal(Goal {
            loc: target.loc,
            tolerance,
        });
        self.fsm.dispatch(AcquireEvent::TargetSelected);
    }

    fn select<S: Sensing + ?Sized>(&self, sensors: &S, ctx: &AcquireContext<'_>) -> Option<Target> {
        let pick = match self.goal {
            AcquisitionGoal::FreeBlock => best_block,
            AcquisitionGoal::ExistingCache => best_cache,
        };
        pick(
            ctx.knowledge,
            sensors.position(),
            ctx.nest,
            ctx.selection,
            &self.excluded,
        )
    }

    fn detected<S: Sensing + ?Sized>(&self, sensors: &S) -> bool {
        match self.goal {
            AcquisitionGoal::FreeBlock => sensors.block_detected(),
            AcquisitionGoal::ExistingCache => sensors.cache_detected(),
        }
    }

    fn acquire<A: Actuation + ?Sized>(&mut self, actuators: &mut A) -> bool {
        self.fsm.dispatch(AcquireEvent::Acquired);
        self.vector.reset();
        actuators.stop();
        true
    }
}

#[cfg(test)]
mod tests {
    use fordyca_types::{BlockId, BlockKind, CacheId};

    use super::*;
    use crate::selection::{BlockCandidate, CacheCandidate};
    use crate::sensing::{ActuatorCommands, SensorSnapshot};

    fn block(id: u32, x: f64, y: f64) -> BlockCandidate {
        BlockCandidate {
            id: BlockId::new(id),
            loc: Vec2::new(x, y),
            kind: BlockKind::Cube,
            density: 1.0,
        }
    }

    fn ctx<'a>(k: &'a Knowledge, sel: &'a SelectionParams) -> AcquireContext<'a> {
        AcquireContext {
            knowledge: k,
            nest: Vec2::new(0.0, 0.0),
            selection: sel,
        }
    }

    #[test]
    fn explores_when_nothing_is_known() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge::default();
        let sel = SelectionParams::default();
        assert!(!acq.step(&SensorSnapshot::default(), &mut cmds, &ctx(&k, &sel)));
        assert_eq!(acq.state(), AcquireState::Explore);
        assert!(acq.is_exploring());
    }

    #[test]
    fn vectors_to_best_known_block() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge {
            blocks: vec![block(0, 3.0, 0.0), block(1, 6.0, 0.0)],
            caches: Vec::new(),
        };
        let sel = SelectionParams::default();
        let robot = SensorSnapshot {
            position: Vec2::new(2.0, 0.0),
            ..SensorSnapshot::default()
        };
        acq.step(&robot, &mut cmds, &ctx(&k, &sel));
        assert_eq!(acq.state(), AcquireState::Vector);
        assert!(acq.is_vectoring());
        // 3 / 1 beats 6 / 4
        assert_eq!(
            acq.target().map(|t| t.entity),
            Some(EntityRef::Block(BlockId::new(0)))
        );
    }

    #[test]
    fn confirmed_arrival_acquires() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge {
            blocks: vec![block(0, 1.0, 1.0)],
            caches: Vec::new(),
        };
        let sel = SelectionParams::default();
        let c = ctx(&k, &sel);
        acq.step(&SensorSnapshot::default(), &mut cmds, &c);
        let there = SensorSnapshot {
            position: Vec2::new(1.0, 1.0),
            block_detected: true,
            ..SensorSnapshot::default()
        };
        assert!(acq.step(&there, &mut cmds, &c));
        assert!(acq.is_acquired());
    }

    #[test]
    fn missing_target_is_excluded_and_reselected() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge {
            blocks: vec![block(0, 1.0, 1.0), block(1, 4.0, 4.0)],
            caches: Vec::new(),
        };
        let sel = SelectionParams::default();
        let c = ctx(&k, &sel);
        let robot = SensorSnapshot {
            position: Vec2::new(1.5, 1.5),
            ..SensorSnapshot::default()
        };
        acq.step(&robot, &mut cmds, &c);
        let first = acq.target().map(|t| t.entity);
        assert_eq!(first, Some(EntityRef::Block(BlockId::new(0))));

        let there = SensorSnapshot {
            position: Vec2::new(1.0, 1.0),
            ..SensorSnapshot::default()
        };
        assert!(!acq.step(&there, &mut cmds, &c));
        assert_eq!(acq.excluded(), &[EntityRef::Block(BlockId::new(0))]);
        assert_eq!(acq.take_vanished(), vec![EntityRef::Block(BlockId::new(0))]);
        assert!(acq.take_vanished().is_empty());
        assert_eq!(
            acq.target().map(|t| t.entity),
            Some(EntityRef::Block(BlockId::new(1)))
        );
    }

    #[test]
    fn miss_with_nothing_else_known_falls_back_to_explore() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::ExistingCache, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge {
            blocks: Vec::new(),
            caches: vec![CacheCandidate {
                id: CacheId::new(2),
                loc: Vec2::new(2.0, 2.0),
                n_blocks: 3,
                density: 1.0,
            }],
        };
        let sel = SelectionParams::default();
        let c = ctx(&k, &sel);
        acq.step(&SensorSnapshot::default(), &mut cmds, &c);
        let there = SensorSnapshot {
            position: Vec2::new(2.0, 2.0),
            ..SensorSnapshot::default()
        };
        acq.step(&there, &mut cmds, &c);
        assert_eq!(acq.state(), AcquireState::Explore);
        assert!(acq.target().is_none());
    }

    #[test]
    fn stumbling_onto_goal_while_exploring_acquires() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge::default();
        let sel = SelectionParams::default();
        let c = ctx(&k, &sel);
        acq.step(&SensorSnapshot::default(), &mut cmds, &c);
        let on_block = SensorSnapshot {
            block_detected: true,
            ..SensorSnapshot::default()
        };
        assert!(acq.step(&on_block, &mut cmds, &c));
    }

    #[test]
    fn reset_clears_exclusions() {
        let params = ControllerParams::default();
        let mut acq = AcquireGoalFsm::new(&params, AcquisitionGoal::FreeBlock, 1);
        let mut cmds = ActuatorCommands::default();
        let k = Knowledge {
            blocks: vec![block(0, 1.0, 1.0)],
            caches: Vec::new(),
        };
        let sel = SelectionParams::default();
        let c = ctx(&k, &sel);
        acq.step(&SensorSnapshot::default(), &mut cmds, &c);
        let there = SensorSnapshot {
            position: Vec2::new(1.0, 1.0),
            ..SensorSnapshot::default()
        };
        acq.step(&there, &mut cmds, &c);
        assert!(!acq.excluded().is_empty());
        acq.reset();
        assert!(acq.excluded().is_empty());
        assert_eq!(acq.state(), AcquireState::Start);
    }
}
