//! Build a ready-to-run [`SimulationState`] from configuration.
//!
//! Populates the arena with blocks, creates the static cache when one is
//! configured, starts the oracle, and spawns robots at random poses inside
//! the nest. Every random stream is derived from the configured seed.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use fordyca_controller::{ActuatorCommands, ControllerError, ControllerSetup, ForagingController};
use fordyca_oracle::{OracleError, OracleManager};
use fordyca_tasks::TaskKind;
use fordyca_types::{Nest, RobotId, Vec2};
use fordyca_world::{ArenaMap, WorldError};

use crate::config::{ConfigError, SimulationConfig};
use crate::distributor::{BlockDistributor, DistributeError};
use crate::kinematics::Body;
use crate::metrics::{SharedTaskStats, TaskStatsObserver};
use crate::tick::{Robot, SimulationState, TickSettings};

/// Mixed into the master seed for the block distributor's stream.
const DISTRIBUTOR_STREAM: u64 = 0x5eed_b10c;

/// Spacing between per-robot seeds.
const ROBOT_SEED_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fraction of the nest's half extent robots may start in.
const NEST_SPAWN_SPREAD: f64 = 0.8;

/// Errors that can occur while assembling a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The configuration is unusable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The arena could not be built.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// The initial blocks could not be placed.
    #[error("distribution error: {source}")]
    Distribute {
        /// The underlying distribution error.
        #[from]
        source: DistributeError,
    },

    /// The oracle could not take its first snapshot.
    #[error("oracle error: {source}")]
    Oracle {
        /// The underlying oracle error.
        #[from]
        source: OracleError,
    },

    /// A controller could not be created.
    #[error("controller error for {robot}: {source}")]
    Controller {
        /// The robot being spawned.
        robot: RobotId,
        /// The underlying controller error.
        source: ControllerError,
    },

    /// More robots than robot IDs.
    #[error("too many robots: {count}")]
    TooManyRobots {
        /// Requested robot count.
        count: usize,
    },
}

/// Assemble the full simulation state described by `config`.
///
/// # Errors
///
/// Returns a [`SpawnError`] if the config is invalid or any part of the
/// world cannot be built.
pub fn build_simulation(config: &SimulationConfig) -> Result<SimulationState, SpawnError> {
    config.validate()?;
    let seed = config.simulation.seed;

    let mut arena = ArenaMap::new(config.arena.arena_params())?;
    let margin = config.body.wall_range + config.arena.resolution;
    let mut distributor = BlockDistributor::new(seed ^ DISTRIBUTOR_STREAM, margin);
    distributor.distribute(&mut arena, config.arena.n_blocks, config.arena.ramp_fraction)?;
    if let Some(cache) = arena.create_static_cache(0)? {
        info!(cache = %cache, "Static cache created");
    }

    let oracle = if config.oracle.enabled() {
        let oracle = OracleManager::new(config.oracle, TaskKind::ALL);
        oracle.update(&arena, 0)?;
        info!(
            entities = config.oracle.entities,
            tasking = config.oracle.tasking,
            "Oracle started"
        );
        Some(Arc::new(oracle))
    } else {
        None
    };

    let task_stats = SharedTaskStats::default();
    let robots = spawn_robots(config, &arena, oracle.as_ref(), &task_stats)?;
    info!(
        robots = robots.len(),
        blocks = arena.blocks().len(),
        kind = %config.controller.kind,
        "Simulation assembled"
    );

    Ok(SimulationState {
        arena,
        robots,
        oracle,
        distributor,
        task_stats,
        tick: 0,
        settings: TickSettings {
            los_radius: config.perception.los_radius,
            body: config.body,
            parallel_robots: config.simulation.parallel_robots,
            dynamic_caches: config.arena.dynamic_caches,
            verify_arena: config.perception.verify,
        },
    })
}

fn spawn_robots(
    config: &SimulationConfig,
    arena: &ArenaMap,
    oracle: Option<&Arc<OracleManager>>,
    task_stats: &SharedTaskStats,
) -> Result<Vec<Robot>, SpawnError> {
    let count = config.simulation.n_robots;
    let seed = config.simulation.seed;
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut robots = Vec::with_capacity(count);

    for i in 0..count {
        let index = u32::try_from(i).map_err(|_err| SpawnError::TooManyRobots { count })?;
        let id = RobotId::new(index);
        let setup = ControllerSetup {
            id,
            seed: seed.wrapping_add(u64::from(index).wrapping_mul(ROBOT_SEED_STRIDE)),
            perception: config.perception.params(),
            executive: config.tasks,
            oracle: oracle.map(Arc::clone),
        };
        let mut controller = ForagingController::new(setup, &config.controller, arena)
            .map_err(|source| SpawnError::Controller { robot: id, source })?;
        controller.add_task_observer(Box::new(TaskStatsObserver::new(Arc::clone(task_stats))));

        let body = Body::new(
            random_point_in(arena.nest(), &mut rng),
            rng.random_range(-core::f64::consts::PI..core::f64::consts::PI),
        );
        robots.push(Robot {
            controller,
            body,
            commands: ActuatorCommands::default(),
        });
    }
    Ok(robots)
}

fn random_point_in<R: Rng + ?Sized>(nest: &Nest, rng: &mut R) -> Vec2 {
    let spread = nest.half_extent * NEST_SPAWN_SPREAD;
    let dx = if spread.x > 0.0 {
        rng.random_range(-spread.x..=spread.x)
    } else {
        0.0
    };
    let dy = if spread.y > 0.0 {
        rng.random_range(-spread.y..=spread.y)
    } else {
        0.0
    };
    nest.center + Vec2::new(dx, dy)
}
