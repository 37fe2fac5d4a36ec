//! Tick cycle: the five-phase loop that drives the FORDYCA simulation.
//!
//! Each tick runs through these phases:
//!
//! 1. **Oracle** -- publish a fresh ground-truth snapshot, if an oracle runs.
//!
//! 2. **Sense and control** -- for every robot, read the sensors, fuse the
//!    line of sight into its perceived map and step its controller. The
//!    arena is read-only in this phase, so robots may be stepped on scoped
//!    worker threads.
//!
//! 3. **Interaction** -- carry out the pickups and drops robots are waiting
//!    on, in robot-ID order, and report each outcome back to its robot.
//!    Blocks delivered to the nest are redistributed immediately.
//!
//! 4. **Caches** -- re-create the static cache and run the dynamic cache
//!    pass when configured.
//!
//! 5. **Motion** -- integrate each robot's motion command.
//!
//! The cycle is deterministic for a given seed whether or not robots are
//! stepped in parallel.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, info};

use fordyca_controller::{
    ActuatorCommands, ControllerError, ControllerEvent, ForagingController, Interaction,
    SensorSnapshot,
};
use fordyca_oracle::{OracleError, OracleManager};
use fordyca_tasks::TaskEvent;
use fordyca_types::{BlockId, RobotId};
use fordyca_world::{ArenaMap, CachePickup, Cell, WorldError};

use crate::config::BodyConfig;
use crate::distributor::{BlockDistributor, DistributeError};
use crate::kinematics::{Body, wall_diffusion};
use crate::metrics::SharedTaskStats;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The oracle could not publish its snapshot.
    #[error("oracle error: {source}")]
    Oracle {
        /// The underlying oracle error.
        #[from]
        source: OracleError,
    },

    /// An arena operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// A delivered block could not be placed again.
    #[error("distribution error: {source}")]
    Distribute {
        /// The underlying distribution error.
        #[from]
        source: DistributeError,
    },

    /// A robot's controller failed.
    #[error("controller error for {robot}: {source}")]
    Controller {
        /// The robot whose controller failed.
        robot: RobotId,
        /// The underlying controller error.
        source: ControllerError,
    },

    /// A robot asked to drop a block it does not hold.
    #[error("{robot} requested a drop without carrying a block")]
    NothingCarried {
        /// The robot that asked.
        robot: RobotId,
    },

    /// A robot worker thread panicked.
    #[error("robot worker thread panicked")]
    WorkerPanicked,
}

/// Per-tick settings that do not change during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSettings {
    /// Line-of-sight radius in cells.
    pub los_radius: u32,
    /// Body model.
    pub body: BodyConfig,
    /// Step robots on scoped worker threads.
    pub parallel_robots: bool,
    /// Run the dynamic cache pass.
    pub dynamic_caches: bool,
    /// Check arena consistency after every tick.
    pub verify_arena: bool,
}

/// One robot: its controller, its body and its latest outputs.
#[derive(Debug)]
pub struct Robot {
    /// The robot's controller.
    pub controller: ForagingController,
    /// Position and heading.
    pub body: Body,
    /// Outputs left by the last control step.
    pub commands: ActuatorCommands,
}

impl Robot {
    /// Robot id.
    pub const fn id(&self) -> RobotId {
        self.controller.id()
    }
}

/// Complete mutable simulation state.
#[derive(Debug)]
pub struct SimulationState {
    /// Ground-truth arena.
    pub arena: ArenaMap,
    /// Robots in ID order.
    pub robots: Vec<Robot>,
    /// Shared oracle, if one runs.
    pub oracle: Option<Arc<OracleManager>>,
    /// Re-places blocks delivered to the nest.
    pub distributor: BlockDistributor,
    /// Task lifecycle counts fed by every executive.
    pub task_stats: SharedTaskStats,
    /// Last tick executed; 0 before the first.
    pub tick: u64,
    /// Fixed per-tick settings.
    pub settings: TickSettings,
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that was executed.
    pub tick: u64,
    /// Free and cached blocks picked up.
    pub pickups: u32,
    /// Blocks delivered to the nest.
    pub nest_drops: u32,
    /// Blocks dropped into caches.
    pub cache_drops: u32,
    /// Pickups and drops that found nothing underfoot.
    pub failed_interactions: u32,
    /// Tasks completed.
    pub tasks_finished: u32,
    /// Tasks abandoned.
    pub tasks_aborted: u32,
    /// Caches created by the cache phase.
    pub caches_created: u32,
}

impl TickSummary {
    fn count_task(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Finished { .. } => {
                self.tasks_finished = self.tasks_finished.saturating_add(1);
            }
            TaskEvent::Aborted { .. } => {
                self.tasks_aborted = self.tasks_aborted.saturating_add(1);
            }
        }
    }

    fn count_interaction(&mut self, event: &ControllerEvent) {
        let counter = match event {
            ControllerEvent::BlockPickedUp(_) | ControllerEvent::CachedBlockPickedUp { .. } => {
                &mut self.pickups
            }
            ControllerEvent::NestBlockDropped(_) => &mut self.nest_drops,
            ControllerEvent::CacheBlockDropped { .. } => &mut self.cache_drops,
            ControllerEvent::PickupFailed { .. } | ControllerEvent::DropFailed { .. } => {
                &mut self.failed_interactions
            }
        };
        *counter = counter.saturating_add(1);
    }
}

/// Execute one tick.
///
/// # Errors
///
/// Returns a [`TickError`] on any structural failure; the state is then
/// partially advanced and should not be stepped further.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    state.tick = state.tick.saturating_add(1);
    let tick = state.tick;
    let mut summary = TickSummary {
        tick,
        ..TickSummary::default()
    };

    // --- Phase 1: Oracle ---
    if let Some(oracle) = &state.oracle {
        oracle.update(&state.arena, tick)?;
    }

    // --- Phase 2: Sense and control ---
    let events = control_robots(&state.arena, &mut state.robots, &state.settings, tick)?;
    for event in events.into_iter().flatten() {
        summary.count_task(event);
    }

    // --- Phase 3: Interaction ---
    for robot in &mut state.robots {
        if let Some(event) = resolve_interaction(&mut state.arena, &mut state.distributor, robot)? {
            summary.count_interaction(&event);
            let id = robot.id();
            robot
                .controller
                .handle(event)
                .map_err(|source| TickError::Controller { robot: id, source })?;
        }
    }

    // --- Phase 4: Caches ---
    if let Some(cache) = state.arena.create_static_cache(tick)? {
        info!(tick, cache = %cache, "Static cache created");
        summary.caches_created = summary.caches_created.saturating_add(1);
    }
    if state.settings.dynamic_caches {
        let created = state.arena.create_dynamic_caches(tick)?;
        if !created.is_empty() {
            info!(tick, count = created.len(), "Dynamic caches created");
        }
        let n = u32::try_from(created.len()).unwrap_or(u32::MAX);
        summary.caches_created = summary.caches_created.saturating_add(n);
    }

    // --- Phase 5: Motion ---
    let (width, height) = (state.arena.params().width, state.arena.params().height);
    for robot in &mut state.robots {
        robot
            .body
            .integrate(&robot.commands, &state.settings.body, width, height);
    }

    if state.settings.verify_arena {
        state.arena.check_consistency()?;
    }

    debug!(
        tick,
        pickups = summary.pickups,
        nest_drops = summary.nest_drops,
        cache_drops = summary.cache_drops,
        failed = summary.failed_interactions,
        "Tick complete"
    );
    Ok(summary)
}

/// What a robot's sensors report at `body`.
pub fn sense(arena: &ArenaMap, body: &Body, settings: &TickSettings, tick: u64) -> SensorSnapshot {
    let params = arena.params();
    let cell = arena.cell(arena.discretize(body.position));
    SensorSnapshot {
        position: body.position,
        heading: body.heading,
        tick,
        block_detected: cell.is_some_and(Cell::has_block),
        cache_detected: cell.is_some_and(Cell::has_cache),
        in_nest: arena.nest().contains(body.position),
        diffusion: wall_diffusion(
            body.position,
            params.width,
            params.height,
            settings.body.wall_range,
        ),
    }
}

// ---------------------------------------------------------------------------
// Phase 2
// ---------------------------------------------------------------------------

fn control_robots(
    arena: &ArenaMap,
    robots: &mut [Robot],
    settings: &TickSettings,
    tick: u64,
) -> Result<Vec<Option<TaskEvent>>, TickError> {
    if !settings.parallel_robots || robots.len() < 2 {
        return robots
            .iter_mut()
            .map(|r| control_robot(arena, r, settings, tick))
            .collect();
    }

    let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let chunk = robots.len().div_ceil(workers).max(1);
    std::thread::scope(|scope| {
        // Every worker spawns before the first join.
        #[allow(clippy::needless_collect)]
        let handles: Vec<_> = robots
            .chunks_mut(chunk)
            .map(|part| {
                scope.spawn(move || {
                    part.iter_mut()
                        .map(|r| control_robot(arena, r, settings, tick))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .collect();
        let mut events = Vec::new();
        for handle in handles {
            let part = handle.join().map_err(|_panic| TickError::WorkerPanicked)??;
            events.extend(part);
        }
        Ok(events)
    })
}

fn control_robot(
    arena: &ArenaMap,
    robot: &mut Robot,
    settings: &TickSettings,
    tick: u64,
) -> Result<Option<TaskEvent>, TickError> {
    let id = robot.id();
    let sensors = sense(arena, &robot.body, settings, tick);
    let los = arena.los(arena.discretize(robot.body.position), settings.los_radius);
    robot
        .controller
        .perceive(&los)
        .map_err(|source| TickError::Controller { robot: id, source })?;
    robot.commands.begin_tick();
    robot
        .controller
        .step(&sensors, &mut robot.commands)
        .map_err(|source| TickError::Controller { robot: id, source })
}

// ---------------------------------------------------------------------------
// Phase 3
// ---------------------------------------------------------------------------

/// Carry out the interaction `robot` is waiting on, if any.
fn resolve_interaction(
    arena: &mut ArenaMap,
    distributor: &mut BlockDistributor,
    robot: &Robot,
) -> Result<Option<ControllerEvent>, TickError> {
    let Some(interaction) = robot.controller.pending_interaction() else {
        return Ok(None);
    };
    let id = robot.id();
    let pos = robot.body.position;
    let coord = arena.discretize(pos);
    let underfoot = arena.cell(coord).copied();
    let believed = robot
        .controller
        .perception()
        .and_then(|map| map.cell(coord))
        .and_then(|c| c.cell().entity());

    let event = match interaction {
        Interaction::PickupBlock => match underfoot.and_then(|c| c.block()) {
            Some(block) => {
                arena.pickup_free_block(id, block)?;
                ControllerEvent::BlockPickedUp(block)
            }
            None => ControllerEvent::PickupFailed { stale: believed },
        },
        Interaction::PickupFromCache => match underfoot.and_then(|c| c.cache()) {
            Some(cache) => {
                let CachePickup { block, dissolved } = arena.pickup_from_cache(id, cache)?;
                ControllerEvent::CachedBlockPickedUp {
                    cache,
                    block,
                    dissolved,
                }
            }
            None => ControllerEvent::PickupFailed { stale: believed },
        },
        Interaction::DropInNest => {
            let block = carried(robot)?;
            if arena.nest().contains(pos) {
                arena.drop_in_nest(id, block)?;
                distributor.redistribute(arena, block)?;
                ControllerEvent::NestBlockDropped(block)
            } else {
                ControllerEvent::DropFailed { stale: None }
            }
        }
        Interaction::DropInCache => {
            let block = carried(robot)?;
            match underfoot.and_then(|c| c.cache()) {
                Some(cache) => {
                    arena.drop_in_cache(id, block, cache)?;
                    ControllerEvent::CacheBlockDropped { cache, block }
                }
                None => ControllerEvent::DropFailed { stale: believed },
            }
        }
    };
    Ok(Some(event))
}

fn carried(robot: &Robot) -> Result<BlockId, TickError> {
    robot
        .controller
        .carried_block()
        .ok_or(TickError::NothingCarried { robot: robot.id() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fordyca_controller::{ControllerKind, ControllerParams, ControllerSetup};
    use fordyca_perception::PerceptionParams;
    use fordyca_tasks::ExecutiveParams;
    use fordyca_types::{BlockKind, Vec2};
    use fordyca_world::ArenaParams;

    use super::*;

    fn settings() -> TickSettings {
        TickSettings {
            los_radius: 3,
            body: BodyConfig::default(),
            parallel_robots: false,
            dynamic_caches: false,
            verify_arena: true,
        }
    }

    fn state_with_robot(kind: ControllerKind, at: Vec2) -> SimulationState {
        let arena = ArenaMap::new(ArenaParams::default()).unwrap();
        let params = ControllerParams {
            kind,
            ..ControllerParams::default()
        };
        let setup = ControllerSetup {
            id: RobotId::new(0),
            seed: 1,
            perception: PerceptionParams::default(),
            executive: ExecutiveParams::default(),
            oracle: None,
        };
        let controller = ForagingController::new(setup, &params, &arena).unwrap();
        SimulationState {
            arena,
            robots: vec![Robot {
                controller,
                body: Body::new(at, 0.0),
                commands: ActuatorCommands::default(),
            }],
            oracle: None,
            distributor: BlockDistributor::new(9, 0.5),
            task_stats: SharedTaskStats::default(),
            tick: 0,
            settings: settings(),
        }
    }

    #[test]
    fn sensors_report_cell_and_nest() {
        let mut arena = ArenaMap::new(ArenaParams::default()).unwrap();
        arena.add_block(BlockKind::Cube, Vec2::new(5.1, 5.1)).unwrap();
        let s = settings();

        let on_block = sense(&arena, &Body::new(Vec2::new(5.05, 5.15), 0.0), &s, 4);
        assert!(on_block.block_detected);
        assert!(!on_block.in_nest);
        assert_eq!(on_block.tick, 4);

        let in_nest = sense(&arena, &Body::new(Vec2::new(2.0, 5.0), 0.0), &s, 4);
        assert!(in_nest.in_nest);
        assert!(!in_nest.block_detected);
        assert!(in_nest.diffusion.length() < 1e-9);
    }

    #[test]
    fn tick_counter_advances() {
        let mut state = state_with_robot(ControllerKind::RandomWalk, Vec2::new(5.0, 5.0));
        let first = run_tick(&mut state).unwrap();
        let second = run_tick(&mut state).unwrap();
        assert_eq!((first.tick, second.tick), (1, 2));
        assert_eq!(state.tick, 2);
    }

    #[test]
    fn mapped_robot_fetches_seen_block() {
        let mut state = state_with_robot(ControllerKind::Mapped, Vec2::new(4.7, 4.7));
        let block = state
            .arena
            .add_block(BlockKind::Cube, Vec2::new(5.1, 5.1))
            .unwrap();

        let mut picked = false;
        for _ in 0..300 {
            let summary = run_tick(&mut state).unwrap();
            if summary.pickups > 0 {
                picked = true;
                break;
            }
        }
        assert!(picked);
        let robot = state.robots.first().unwrap();
        assert_eq!(robot.controller.carried_block(), Some(block));
        assert!(state.arena.block(block).unwrap().is_carried());
    }

    #[test]
    fn parallel_and_serial_stepping_agree() {
        let build = |parallel: bool| {
            let mut state = state_with_robot(ControllerKind::RandomWalk, Vec2::new(5.0, 5.0));
            let params = ControllerParams {
                kind: ControllerKind::RandomWalk,
                ..ControllerParams::default()
            };
            for i in 1..4 {
                let setup = ControllerSetup {
                    id: RobotId::new(i),
                    seed: u64::from(i),
                    perception: PerceptionParams::default(),
                    executive: ExecutiveParams::default(),
                    oracle: None,
                };
                let controller = ForagingController::new(setup, &params, &state.arena).unwrap();
                state.robots.push(Robot {
                    controller,
                    body: Body::new(Vec2::new(4.0 + f64::from(i), 3.0), 0.0),
                    commands: ActuatorCommands::default(),
                });
            }
            state.settings.parallel_robots = parallel;
            state
        };
        let mut serial = build(false);
        let mut parallel = build(true);
        for _ in 0..30 {
            run_tick(&mut serial).unwrap();
            run_tick(&mut parallel).unwrap();
        }
        let bodies = |s: &SimulationState| s.robots.iter().map(|r| r.body).collect::<Vec<_>>();
        assert_eq!(bodies(&serial), bodies(&parallel));
    }
}
