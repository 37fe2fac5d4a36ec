//! The foraging controller: one robot's brain.
//!
//! A single struct composes the optional pieces each [`ControllerKind`]
//! needs: a perceived map, an oracle handle and a task executive. The
//! simulation drives it in three calls per tick:
//!
//! 1. [`ForagingController::perceive`] decays the map and fuses the
//!    robot's line of sight.
//! 2. [`ForagingController::step`] runs the foraging machine, through the
//!    task executive when there is one.
//! 3. After every robot has stepped, the arena carries out each
//!    [`ForagingController::pending_interaction`] and reports back through
//!    [`ForagingController::handle`].

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fordyca_oracle::OracleManager;
use fordyca_perception::{
    DEPOSIT, FusionStats, MapEvent, PerceivedArenaMap, PerceptionParams, process_los,
};
use fordyca_tasks::{
    EstimateOracle, ExecutiveParams, PolledTask, TaskEvent, TaskExecutive, TaskKind, TaskObserver,
};
use fordyca_types::{BlockId, CacheId, EntityRef, Nest, RobotId};
use fordyca_world::{ArenaMap, LineOfSight};

use crate::config::{ControllerKind, ControllerParams};
use crate::error::ControllerError;
use crate::fsm::acquire::AcquireContext;
use crate::fsm::foraging::{ForagingFsm, ForagingGoal, ForagingPhase, ForagingRole, Interaction};
use crate::selection::{BlockCandidate, CacheCandidate, Knowledge};
use crate::sensing::{Actuation, FirstTickFilter, Sensing};

/// Outcome of an arena interaction, reported back to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The robot picked up a free block.
    BlockPickedUp(BlockId),
    /// The robot took a block from a cache.
    CachedBlockPickedUp {
        /// The cache.
        cache: CacheId,
        /// The block taken.
        block: BlockId,
        /// Whether the pickup dissolved the cache.
        dissolved: bool,
    },
    /// The robot dropped its block in the nest.
    NestBlockDropped(BlockId),
    /// The robot dropped its block into a cache.
    CacheBlockDropped {
        /// The cache.
        cache: CacheId,
        /// The block dropped.
        block: BlockId,
    },
    /// Nothing to pick up underfoot.
    PickupFailed {
        /// The entity the robot believed was there, if any.
        stale: Option<EntityRef>,
    },
    /// Nowhere to drop underfoot.
    DropFailed {
        /// The cache the robot believed was there, if any.
        stale: Option<EntityRef>,
    },
}

/// Per-robot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// Successful pickups.
    pub pickups: u64,
    /// Pickups that found nothing.
    pub failed_pickups: u64,
    /// Blocks delivered to the nest.
    pub nest_deliveries: u64,
    /// Blocks delivered to a cache.
    pub cache_deliveries: u64,
    /// Targets found missing on arrival.
    pub vanished_targets: u64,
    /// Accumulated fusion counters.
    pub fusion: FusionStats,
}

/// Everything a controller needs besides its tuning.
#[derive(Debug, Clone)]
pub struct ControllerSetup {
    /// Robot id.
    pub id: RobotId,
    /// Seed for the robot's random streams.
    pub seed: u64,
    /// Perceived map tuning.
    pub perception: PerceptionParams,
    /// Task executive tuning.
    pub executive: ExecutiveParams,
    /// Shared oracle, if the simulation runs one.
    pub oracle: Option<Arc<OracleManager>>,
}

/// One robot's foraging controller.
#[derive(Debug)]
pub struct ForagingController {
    id: RobotId,
    kind: ControllerKind,
    params: ControllerParams,
    nest: Nest,
    resolution: f64,
    perception: Option<PerceivedArenaMap>,
    oracle: Option<Arc<OracleManager>>,
    executive: Option<TaskExecutive>,
    fsm: ForagingFsm,
    rng: SmallRng,
    carried: Option<BlockId>,
    first_step: bool,
    stats: ControllerStats,
}

impl ForagingController {
    /// Build a controller for a robot in `arena`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MissingOracle`] for an oracle-backed kind
    /// without an entity oracle, or propagates perception and executive
    /// construction failures.
    pub fn new(
        setup: ControllerSetup,
        params: &ControllerParams,
        arena: &ArenaMap,
    ) -> Result<Self, ControllerError> {
        let kind = params.kind;
        let oracle = setup.oracle;
        if kind.uses_oracle() && !oracle.as_ref().is_some_and(|o| o.params().entities) {
            return Err(ControllerError::MissingOracle { kind });
        }

        let perception = if kind.uses_perception() {
            Some(PerceivedArenaMap::for_arena(
                setup.id,
                arena,
                setup.perception,
            )?)
        } else {
            None
        };

        let executive = if kind.is_tasked() {
            let estimates = oracle
                .as_ref()
                .filter(|o| kind.uses_oracle() && o.params().tasking)
                .map(|o| Arc::clone(o) as Arc<dyn EstimateOracle>);
            Some(TaskExecutive::new(setup.id, setup.executive, estimates)?)
        } else {
            None
        };

        info!(robot = %setup.id, kind = %kind, "Controller created");
        Ok(Self {
            id: setup.id,
            kind,
            params: *params,
            nest: *arena.nest(),
            resolution: arena.resolution(),
            perception,
            oracle,
            executive,
            fsm: ForagingFsm::new(params, setup.seed),
            rng: SmallRng::seed_from_u64(setup.seed.wrapping_add(0x9e37_79b9)),
            carried: None,
            first_step: true,
            stats: ControllerStats::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Per-tick driving
    // -----------------------------------------------------------------------

    /// Decay the perceived map and fuse this tick's line of sight.
    ///
    /// # Errors
    ///
    /// Propagates fusion failures, including a failed consistency check.
    pub fn perceive(&mut self, los: &LineOfSight<'_>) -> Result<FusionStats, ControllerError> {
        let Some(map) = self.perception.as_mut() else {
            return Ok(FusionStats::default());
        };
        let forgotten = map.update();
        let stats = process_los(map, los)?;
        self.stats.fusion += stats;
        if forgotten > 0 {
            debug!(robot = %self.id, forgotten, "Beliefs decayed away");
        }
        Ok(stats)
    }

    /// Run the controller for one tick.
    ///
    /// Returns the task finish or abort that happened this tick, if any.
    ///
    /// # Errors
    ///
    /// Propagates oracle, task executive and perception failures.
    pub fn step<S, A>(
        &mut self,
        sensors: &S,
        actuators: &mut A,
    ) -> Result<Option<TaskEvent>, ControllerError>
    where
        S: Sensing + ?Sized,
        A: Actuation + ?Sized,
    {
        let filtered = FirstTickFilter::new(sensors, self.first_step);
        self.first_step = false;
        let knowledge = self.knowledge()?;
        let ctx = AcquireContext {
            knowledge: &knowledge,
            nest: self.nest.center,
            selection: &self.params.selection,
        };

        let event = match self.executive.as_mut() {
            Some(executive) => {
                let mut task = TaskStep {
                    fsm: &mut self.fsm,
                    sensors: &filtered,
                    actuators,
                    ctx,
                };
                executive.run(&mut task, &mut self.rng)?
            }
            None => {
                if matches!(
                    self.fsm.phase(),
                    ForagingPhase::Start | ForagingPhase::Finished
                ) {
                    self.fsm.start(ForagingRole::Generalist);
                }
                self.fsm.step(&filtered, actuators, &ctx);
                None
            }
        };

        for entity in self.fsm.take_vanished() {
            self.stats.vanished_targets = self.stats.vanished_targets.saturating_add(1);
            self.forget(entity)?;
        }
        Ok(event)
    }

    /// The arena interaction this robot is waiting on.
    pub const fn pending_interaction(&self) -> Option<Interaction> {
        self.fsm.pending_interaction()
    }

    /// Apply the outcome of an arena interaction.
    ///
    /// # Errors
    ///
    /// Propagates perceived map update failures.
    pub fn handle(&mut self, event: ControllerEvent) -> Result<(), ControllerError> {
        match event {
            ControllerEvent::BlockPickedUp(block) => {
                self.apply_map_event(MapEvent::BlockPickedUp(block))?;
                self.picked_up(block);
            }
            ControllerEvent::CachedBlockPickedUp {
                cache,
                block,
                dissolved,
            } => {
                self.apply_map_event(MapEvent::CachedBlockPickedUp {
                    cache,
                    block,
                    dissolved,
                })?;
                self.picked_up(block);
            }
            ControllerEvent::NestBlockDropped(block) => {
                self.carried = None;
                self.fsm.drop_done();
                self.stats.nest_deliveries = self.stats.nest_deliveries.saturating_add(1);
                info!(robot = %self.id, block = %block, "Block delivered to nest");
            }
            ControllerEvent::CacheBlockDropped { cache, block } => {
                self.apply_map_event(MapEvent::CacheBlockDropped { cache, block })?;
                self.carried = None;
                self.fsm.drop_done();
                self.stats.cache_deliveries = self.stats.cache_deliveries.saturating_add(1);
                debug!(robot = %self.id, block = %block, cache = %cache, "Block dropped in cache");
            }
            ControllerEvent::PickupFailed { stale } => {
                warn!(robot = %self.id, ?stale, "Pickup failed: nothing underfoot");
                if let Some(entity) = stale {
                    self.forget(entity)?;
                }
                self.stats.failed_pickups = self.stats.failed_pickups.saturating_add(1);
                self.fsm.pickup_failed();
            }
            ControllerEvent::DropFailed { stale } => {
                warn!(robot = %self.id, ?stale, "Drop failed: no cache underfoot");
                if let Some(entity) = stale {
                    self.forget(entity)?;
                }
                self.fsm.drop_failed();
            }
        }
        Ok(())
    }

    /// Register a task lifecycle observer. A no-op for untasked kinds.
    pub fn add_task_observer(&mut self, observer: Box<dyn TaskObserver>) {
        if let Some(executive) = self.executive.as_mut() {
            executive.add_observer(observer);
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Robot id.
    pub const fn id(&self) -> RobotId {
        self.id
    }

    /// Controller variant.
    pub const fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Current trip phase.
    pub const fn phase(&self) -> ForagingPhase {
        self.fsm.phase()
    }

    /// Whether the robot is exploring.
    pub fn is_exploring(&self) -> bool {
        self.fsm.is_exploring()
    }

    /// Whether the robot is vectoring to a known goal.
    pub fn is_vectoring(&self) -> bool {
        self.fsm.is_vectoring()
    }

    /// Whether the current goal is under the robot.
    pub const fn goal_acquired(&self) -> bool {
        self.fsm.goal_acquired()
    }

    /// What the robot is currently after.
    pub fn acquisition_goal(&self) -> Option<ForagingGoal> {
        self.fsm.acquisition_goal()
    }

    /// Block being carried.
    pub const fn carried_block(&self) -> Option<BlockId> {
        self.carried
    }

    /// Task being executed, for tasked kinds.
    pub fn current_task(&self) -> Option<TaskKind> {
        self.executive.as_ref().and_then(TaskExecutive::current_task)
    }

    /// The task executive, for tasked kinds.
    pub const fn executive(&self) -> Option<&TaskExecutive> {
        self.executive.as_ref()
    }

    /// The perceived map, for mapped kinds.
    pub const fn perception(&self) -> Option<&PerceivedArenaMap> {
        self.perception.as_ref()
    }

    /// Per-robot counters.
    pub const fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn knowledge(&self) -> Result<Knowledge, ControllerError> {
        if let Some(oracle) = self.oracle.as_ref().filter(|_| self.kind.uses_oracle()) {
            return Self::oracle_knowledge(oracle, self.resolution);
        }
        let Some(map) = &self.perception else {
            return Ok(Knowledge::default());
        };
        let res = self.resolution;
        let blocks = map
            .blocks()
            .into_iter()
            .filter_map(|b| {
                b.ent.discrete_loc.map(|c| BlockCandidate {
                    id: b.ent.id,
                    loc: c.to_real(res),
                    kind: b.ent.kind,
                    density: b.density,
                })
            })
            .collect();
        let caches = map
            .caches()
            .into_iter()
            .map(|c| CacheCandidate {
                id: c.ent.id,
                loc: c.ent.discrete_loc.to_real(res),
                n_blocks: c.ent.n_blocks(),
                density: c.density,
            })
            .collect();
        Ok(Knowledge { blocks, caches })
    }

    fn oracle_knowledge(oracle: &OracleManager, res: f64) -> Result<Knowledge, ControllerError> {
        let snapshot = oracle.snapshot()?;
        let blocks = snapshot
            .blocks
            .iter()
            .filter_map(|b| {
                b.discrete_loc.map(|c| BlockCandidate {
                    id: b.id,
                    loc: c.to_real(res),
                    kind: b.kind,
                    density: DEPOSIT,
                })
            })
            .collect();
        let caches = snapshot
            .caches
            .iter()
            .map(|c| CacheCandidate {
                id: c.id,
                loc: c.discrete_loc.to_real(res),
                n_blocks: c.n_blocks(),
                density: DEPOSIT,
            })
            .collect();
        Ok(Knowledge { blocks, caches })
    }

    fn picked_up(&mut self, block: BlockId) {
        self.carried = Some(block);
        self.fsm.pickup_done();
        self.stats.pickups = self.stats.pickups.saturating_add(1);
        debug!(robot = %self.id, block = %block, "Block picked up");
    }

    fn forget(&mut self, entity: EntityRef) -> Result<(), ControllerError> {
        let event = match entity {
            EntityRef::Block(id) => MapEvent::BlockRemoved(id),
            EntityRef::Cache(id) => MapEvent::CacheRemoved(id),
        };
        self.apply_map_event(event)
    }

    fn apply_map_event(&mut self, event: MapEvent) -> Result<(), ControllerError> {
        if let Some(map) = self.perception.as_mut() {
            map.apply(event)?;
        }
        Ok(())
    }
}

/// Adapts the foraging machine to the executive's polling interface for
/// one tick.
struct TaskStep<'a, S: ?Sized, A: ?Sized> {
    fsm: &'a mut ForagingFsm,
    sensors: &'a S,
    actuators: &'a mut A,
    ctx: AcquireContext<'a>,
}

impl<S, A> PolledTask for TaskStep<'_, S, A>
where
    S: Sensing + ?Sized,
    A: Actuation + ?Sized,
{
    type Error = ControllerError;

    fn task_start(&mut self, task: TaskKind) {
        self.fsm.start(task.into());
    }

    fn task_execute(&mut self) -> Result<(), Self::Error> {
        self.fsm.step(self.sensors, &mut *self.actuators, &self.ctx);
        Ok(())
    }

    fn task_finished(&self) -> bool {
        self.fsm.is_finished()
    }

    fn task_at_interface(&self) -> bool {
        self.fsm.at_interface()
    }

    fn task_reset(&mut self) {
        self.fsm.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fordyca_oracle::OracleParams;
    use fordyca_types::{BlockKind, Vec2};
    use fordyca_world::ArenaParams;

    use super::*;
    use crate::sensing::{ActuatorCommands, SensorSnapshot};

    fn arena_with_block(loc: Vec2) -> (ArenaMap, BlockId) {
        let mut arena = ArenaMap::new(ArenaParams::default()).unwrap();
        let id = arena.add_block(BlockKind::Cube, loc).unwrap();
        (arena, id)
    }

    fn setup(oracle: Option<Arc<OracleManager>>) -> ControllerSetup {
        ControllerSetup {
            id: RobotId::new(0),
            seed: 42,
            perception: PerceptionParams::default(),
            executive: ExecutiveParams::default(),
            oracle,
        }
    }

    fn params(kind: ControllerKind) -> ControllerParams {
        ControllerParams {
            kind,
            ..ControllerParams::default()
        }
    }

    fn at(pos: Vec2, tick: u64) -> SensorSnapshot {
        SensorSnapshot {
            position: pos,
            tick,
            ..SensorSnapshot::default()
        }
    }

    #[test]
    fn oracle_kinds_require_an_entity_oracle() {
        let (arena, _) = arena_with_block(Vec2::new(5.1, 5.1));
        let err = ForagingController::new(setup(None), &params(ControllerKind::OracleMapped), &arena)
            .unwrap_err();
        assert!(matches!(err, ControllerError::MissingOracle { .. }));

        let tasking_only = Arc::new(OracleManager::new(
            OracleParams {
                tasking: true,
                ..OracleParams::default()
            },
            TaskKind::ALL,
        ));
        let err = ForagingController::new(
            setup(Some(tasking_only)),
            &params(ControllerKind::OracleTasked),
            &arena,
        )
        .unwrap_err();
        assert!(matches!(err, ControllerError::MissingOracle { .. }));
    }

    #[test]
    fn random_walk_keeps_no_map() {
        let (arena, _) = arena_with_block(Vec2::new(5.1, 5.1));
        let mut c =
            ForagingController::new(setup(None), &params(ControllerKind::RandomWalk), &arena)
                .unwrap();
        assert!(c.perception().is_none());
        let stats = c.perceive(&arena.los(arena.discretize(Vec2::new(5.0, 5.0)), 3)).unwrap();
        assert_eq!(stats, FusionStats::default());
        let mut cmds = ActuatorCommands::default();
        c.step(&at(Vec2::new(8.0, 8.0), 0), &mut cmds).unwrap();
        assert!(c.is_exploring());
    }

    #[test]
    fn first_step_ignores_block_sensor() {
        let (arena, _) = arena_with_block(Vec2::new(5.1, 5.1));
        let mut c =
            ForagingController::new(setup(None), &params(ControllerKind::RandomWalk), &arena)
                .unwrap();
        let mut cmds = ActuatorCommands::default();
        let on_block = SensorSnapshot {
            block_detected: true,
            ..at(Vec2::new(5.1, 5.1), 0)
        };
        c.step(&on_block, &mut cmds).unwrap();
        assert_eq!(c.phase(), ForagingPhase::Acquire);
        assert!(c.pending_interaction().is_none());
        c.step(&SensorSnapshot { tick: 1, ..on_block }, &mut cmds).unwrap();
        assert_eq!(c.phase(), ForagingPhase::WaitForPickup);
        assert_eq!(c.pending_interaction(), Some(Interaction::PickupBlock));
    }

    #[test]
    fn mapped_robot_vectors_to_seen_block_and_picks_it_up() {
        let (arena, block) = arena_with_block(Vec2::new(5.1, 5.1));
        let mut c =
            ForagingController::new(setup(None), &params(ControllerKind::Mapped), &arena).unwrap();
        let robot = Vec2::new(4.7, 4.7);
        let fused = c
            .perceive(&arena.los(arena.discretize(robot), 3))
            .unwrap();
        assert_eq!(fused.block_discoveries, 1);

        let mut cmds = ActuatorCommands::default();
        c.step(&at(robot, 0), &mut cmds).unwrap();
        assert!(c.is_vectoring());
        assert_eq!(c.acquisition_goal(), Some(ForagingGoal::FreeBlock));

        let target = arena.block(block).and_then(|b| b.discrete_loc).unwrap();
        let on_block = SensorSnapshot {
            block_detected: true,
            ..at(target.to_real(arena.resolution()), 1)
        };
        c.step(&on_block, &mut cmds).unwrap();
        assert!(c.goal_acquired());

        c.handle(ControllerEvent::BlockPickedUp(block)).unwrap();
        assert_eq!(c.carried_block(), Some(block));
        assert_eq!(c.phase(), ForagingPhase::Transport);
        assert_eq!(c.perception().map(PerceivedArenaMap::n_blocks), Some(0));
        assert_eq!(c.stats().pickups, 1);

        c.handle(ControllerEvent::NestBlockDropped(block)).unwrap();
        assert!(c.carried_block().is_none());
        assert_eq!(c.stats().nest_deliveries, 1);
    }

    #[test]
    fn failed_pickup_forgets_stale_block() {
        let (arena, block) = arena_with_block(Vec2::new(5.1, 5.1));
        let mut c =
            ForagingController::new(setup(None), &params(ControllerKind::Mapped), &arena).unwrap();
        let robot = Vec2::new(4.7, 4.7);
        c.perceive(&arena.los(arena.discretize(robot), 3))
            .unwrap();
        assert_eq!(c.perception().map(PerceivedArenaMap::n_blocks), Some(1));
        c.handle(ControllerEvent::PickupFailed {
            stale: Some(EntityRef::Block(block)),
        })
        .unwrap();
        assert_eq!(c.perception().map(PerceivedArenaMap::n_blocks), Some(0));
        assert_eq!(c.stats().failed_pickups, 1);
    }

    #[test]
    fn oracle_mapped_robot_knows_unseen_blocks() {
        let (arena, _) = arena_with_block(Vec2::new(9.1, 9.1));
        let oracle = Arc::new(OracleManager::new(
            OracleParams {
                entities: true,
                ..OracleParams::default()
            },
            TaskKind::ALL,
        ));
        oracle.update(&arena, 0).unwrap();
        let mut c = ForagingController::new(
            setup(Some(oracle)),
            &params(ControllerKind::OracleMapped),
            &arena,
        )
        .unwrap();
        let mut cmds = ActuatorCommands::default();
        c.step(&at(Vec2::new(1.0, 1.0), 0), &mut cmds).unwrap();
        assert!(c.is_vectoring());
    }

    #[test]
    fn tasked_robot_allocates_a_task() {
        let (arena, _) = arena_with_block(Vec2::new(5.1, 5.1));
        let mut c =
            ForagingController::new(setup(None), &params(ControllerKind::Tasked), &arena).unwrap();
        assert!(c.current_task().is_none());
        let mut cmds = ActuatorCommands::default();
        c.step(&at(Vec2::new(8.0, 8.0), 0), &mut cmds).unwrap();
        assert_eq!(c.current_task(), Some(TaskKind::Generalist));
        assert!(c.executive().is_some());
    }
}
