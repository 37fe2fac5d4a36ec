//! The oracle manager.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fordyca_tasks::{EstimateOracle, EstimationMethod, TaskError, TaskKind, TaskTiming, TimeEstimate};
use fordyca_types::{Block, Cache};
use fordyca_world::ArenaMap;

use crate::error::OracleError;

/// Which oracle tables are live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleParams {
    /// Publish ground-truth block and cache lists.
    #[serde(default)]
    pub entities: bool,
    /// Maintain swarm-wide task estimates.
    #[serde(default)]
    pub tasking: bool,
    /// How swarm-wide estimates are folded.
    #[serde(default = "default_oracle_estimation")]
    pub estimation: EstimationMethod,
}

const fn default_oracle_estimation() -> EstimationMethod {
    EstimationMethod::Exponential { alpha: 0.5 }
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            entities: false,
            tasking: false,
            estimation: default_oracle_estimation(),
        }
    }
}

impl OracleParams {
    /// Whether any oracle table is live.
    pub const fn enabled(&self) -> bool {
        self.entities || self.tasking
    }
}

/// Ground-truth entities as of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Tick the snapshot was taken on.
    pub tick: u64,
    /// Free blocks, in ID order.
    pub blocks: Vec<Block>,
    /// Caches, in ID order.
    pub caches: Vec<Cache>,
}

/// A parsed oracle query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleQuery {
    /// `entities.blocks`
    Blocks,
    /// `entities.caches`
    Caches,
    /// `exec_est.<task>`
    ExecEstimate(TaskKind),
    /// `interface_est.<task>`
    InterfaceEstimate(TaskKind),
}

impl OracleQuery {
    /// Parse a query key.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NoSuchTask`] for an estimate query naming an
    /// unknown task, or [`OracleError::UnknownQuery`] for anything else that
    /// does not parse.
    pub fn parse(key: &str) -> Result<Self, OracleError> {
        match key {
            "entities.blocks" => return Ok(Self::Blocks),
            "entities.caches" => return Ok(Self::Caches),
            _ => {}
        }
        let (table, task) = key
            .split_once('.')
            .ok_or_else(|| OracleError::UnknownQuery(key.to_owned()))?;
        let parse_task = || {
            task.parse::<TaskKind>()
                .map_err(|_err| OracleError::NoSuchTask(task.to_owned()))
        };
        match table {
            "exec_est" => Ok(Self::ExecEstimate(parse_task()?)),
            "interface_est" => Ok(Self::InterfaceEstimate(parse_task()?)),
            _ => Err(OracleError::UnknownQuery(key.to_owned())),
        }
    }
}

/// An oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleAnswer {
    /// Ground-truth free blocks.
    Blocks(Vec<Block>),
    /// Ground-truth caches.
    Caches(Vec<Cache>),
    /// A swarm-wide estimate, `None` until a robot has reported.
    Estimate(Option<f64>),
}

#[derive(Debug, Clone)]
struct TaskEstimates {
    exec: TimeEstimate,
    interface: TimeEstimate,
}

/// Shared oracle state.
///
/// The entity snapshot sits behind an `RwLock` so that many robots can read
/// it while the simulation is between updates; estimates sit behind a
/// `Mutex` because every report writes.
#[derive(Debug)]
pub struct OracleManager {
    params: OracleParams,
    entities: RwLock<Arc<EntitySnapshot>>,
    estimates: Mutex<BTreeMap<TaskKind, TaskEstimates>>,
}

impl OracleManager {
    /// Build an oracle tracking estimates for `tasks`.
    pub fn new(params: OracleParams, tasks: impl IntoIterator<Item = TaskKind>) -> Self {
        let estimates = tasks
            .into_iter()
            .map(|t| {
                (
                    t,
                    TaskEstimates {
                        exec: TimeEstimate::new(params.estimation),
                        interface: TimeEstimate::new(params.estimation),
                    },
                )
            })
            .collect();
        info!(entities = params.entities, tasking = params.tasking, "Oracle created");
        Self {
            params,
            entities: RwLock::new(Arc::new(EntitySnapshot::default())),
            estimates: Mutex::new(estimates),
        }
    }

    /// Oracle parameters.
    pub const fn params(&self) -> &OracleParams {
        &self.params
    }

    /// Publish a fresh entity snapshot. Called once per tick before robots
    /// step; a no-op when entities are disabled.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Poisoned`] if the snapshot lock is poisoned.
    pub fn update(&self, arena: &ArenaMap, tick: u64) -> Result<(), OracleError> {
        if !self.params.entities {
            return Ok(());
        }
        let snapshot = Arc::new(EntitySnapshot {
            tick,
            blocks: arena.free_blocks().cloned().collect(),
            caches: arena.caches().cloned().collect(),
        });
        let n_blocks = snapshot.blocks.len();
        let n_caches = snapshot.caches.len();
        *self
            .entities
            .write()
            .map_err(|_err| OracleError::Poisoned { what: "entities" })? = snapshot;
        debug!(tick, n_blocks, n_caches, "Oracle snapshot published");
        Ok(())
    }

    /// The latest entity snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Disabled`] when entities are off, or
    /// [`OracleError::Poisoned`].
    pub fn snapshot(&self) -> Result<Arc<EntitySnapshot>, OracleError> {
        if !self.params.entities {
            return Err(OracleError::Disabled { what: "entities" });
        }
        self.entities
            .read()
            .map(|s| Arc::clone(&*s))
            .map_err(|_err| OracleError::Poisoned { what: "entities" })
    }

    /// Answer a string-keyed query.
    ///
    /// # Errors
    ///
    /// See [`OracleQuery::parse`]; also fails if the addressed table is
    /// disabled or the task is not tracked.
    pub fn ask(&self, key: &str) -> Result<OracleAnswer, OracleError> {
        match OracleQuery::parse(key)? {
            OracleQuery::Blocks => Ok(OracleAnswer::Blocks(self.snapshot()?.blocks.clone())),
            OracleQuery::Caches => Ok(OracleAnswer::Caches(self.snapshot()?.caches.clone())),
            OracleQuery::ExecEstimate(task) => {
                self.estimate(task, |e| &e.exec).map(OracleAnswer::Estimate)
            }
            OracleQuery::InterfaceEstimate(task) => self
                .estimate(task, |e| &e.interface)
                .map(OracleAnswer::Estimate),
        }
    }

    /// Fold a robot's finish or abort into the swarm-wide estimates.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NoSuchTask`] for an untracked task,
    /// [`OracleError::Disabled`] when tasking is off, or
    /// [`OracleError::Poisoned`].
    #[allow(clippy::cast_precision_loss)]
    pub fn report_task(&self, task: TaskKind, timing: &TaskTiming) -> Result<(), OracleError> {
        if !self.params.tasking {
            return Err(OracleError::Disabled { what: "task estimates" });
        }
        let mut table = self
            .estimates
            .lock()
            .map_err(|_err| OracleError::Poisoned { what: "estimates" })?;
        let entry = table
            .get_mut(&task)
            .ok_or_else(|| OracleError::NoSuchTask(task.as_str().to_owned()))?;
        entry.exec.update(timing.exec_ticks as f64);
        if timing.interface_ticks > 0 {
            entry.interface.update(timing.interface_ticks as f64);
        }
        debug!(task = %task, exec = entry.exec.value(), "Oracle estimate updated");
        Ok(())
    }

    fn estimate(
        &self,
        task: TaskKind,
        pick: impl Fn(&TaskEstimates) -> &TimeEstimate,
    ) -> Result<Option<f64>, OracleError> {
        if !self.params.tasking {
            return Err(OracleError::Disabled { what: "task estimates" });
        }
        let table = self
            .estimates
            .lock()
            .map_err(|_err| OracleError::Poisoned { what: "estimates" })?;
        let entry = table
            .get(&task)
            .ok_or_else(|| OracleError::NoSuchTask(task.as_str().to_owned()))?;
        let est = pick(entry);
        Ok(est.has_samples().then(|| est.value()))
    }

    fn ask_estimate(&self, prefix: &str, task: &str) -> Result<Option<f64>, TaskError> {
        match self.ask(&format!("{prefix}.{task}")).map_err(into_task_error)? {
            OracleAnswer::Estimate(v) => Ok(v),
            OracleAnswer::Blocks(_) | OracleAnswer::Caches(_) => Err(TaskError::OracleUnavailable {
                reason: format!("{prefix}.{task} did not yield an estimate"),
            }),
        }
    }
}

fn into_task_error(err: OracleError) -> TaskError {
    match err {
        OracleError::NoSuchTask(task) => TaskError::NoSuchTask(task),
        other => TaskError::OracleUnavailable {
            reason: other.to_string(),
        },
    }
}

impl EstimateOracle for OracleManager {
    fn exec_estimate(&self, task: &str) -> Result<Option<f64>, TaskError> {
        self.ask_estimate("exec_est", task)
    }

    fn interface_estimate(&self, task: &str) -> Result<Option<f64>, TaskError> {
        self.ask_estimate("interface_est", task)
    }

    fn report(&self, task: &str, timing: &TaskTiming) -> Result<(), TaskError> {
        let kind = task.parse::<TaskKind>()?;
        self.report_task(kind, timing).map_err(into_task_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fordyca_types::{BlockKind, RobotId, Vec2};
    use fordyca_world::ArenaParams;

    use super::*;

    fn full_params() -> OracleParams {
        OracleParams {
            entities: true,
            tasking: true,
            ..OracleParams::default()
        }
    }

    #[test]
    fn query_keys_parse() {
        assert_eq!(OracleQuery::parse("entities.blocks").unwrap(), OracleQuery::Blocks);
        assert_eq!(
            OracleQuery::parse("exec_est.harvester").unwrap(),
            OracleQuery::ExecEstimate(TaskKind::Harvester)
        );
        assert!(matches!(
            OracleQuery::parse("exec_est.forager"),
            Err(OracleError::NoSuchTask(t)) if t == "forager"
        ));
        assert!(matches!(
            OracleQuery::parse("weather.today"),
            Err(OracleError::UnknownQuery(_))
        ));
        assert!(matches!(
            OracleQuery::parse("blocks"),
            Err(OracleError::UnknownQuery(_))
        ));
    }

    #[test]
    fn snapshot_tracks_free_blocks() {
        let mut arena = ArenaMap::new(ArenaParams::default()).unwrap();
        let a = arena.add_block(BlockKind::Cube, Vec2::new(6.0, 6.0)).unwrap();
        let b = arena.add_block(BlockKind::Ramp, Vec2::new(8.0, 2.0)).unwrap();
        let oracle = OracleManager::new(full_params(), TaskKind::ALL);

        oracle.update(&arena, 1).unwrap();
        let OracleAnswer::Blocks(blocks) = oracle.ask("entities.blocks").unwrap() else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.iter().map(|b| b.id).collect::<Vec<_>>(), vec![a, b]);

        arena.pickup_free_block(RobotId::new(0), a).unwrap();
        // Stale until the next update.
        assert_eq!(oracle.snapshot().unwrap().blocks.len(), 2);
        oracle.update(&arena, 2).unwrap();
        let snap = oracle.snapshot().unwrap();
        assert_eq!(snap.tick, 2);
        assert_eq!(snap.blocks.len(), 1);
    }

    #[test]
    fn disabled_tables_refuse_queries() {
        let oracle = OracleManager::new(OracleParams::default(), TaskKind::ALL);
        assert!(!oracle.params().enabled());
        assert!(matches!(
            oracle.ask("entities.caches"),
            Err(OracleError::Disabled { .. })
        ));
        assert!(matches!(
            oracle.ask("exec_est.generalist"),
            Err(OracleError::Disabled { .. })
        ));
    }

    #[test]
    fn estimates_aggregate_reports() {
        let oracle = OracleManager::new(full_params(), [TaskKind::Generalist]);
        assert_eq!(
            oracle.ask("exec_est.generalist").unwrap(),
            OracleAnswer::Estimate(None)
        );
        let timing = TaskTiming {
            exec_ticks: 100,
            interface_ticks: 10,
        };
        EstimateOracle::report(&oracle, "generalist", &timing).unwrap();
        let timing = TaskTiming {
            exec_ticks: 50,
            interface_ticks: 0,
        };
        EstimateOracle::report(&oracle, "generalist", &timing).unwrap();
        let exec = oracle.exec_estimate("generalist").unwrap().unwrap();
        assert!((exec - 75.0).abs() < 1e-9);
        let interface = oracle.interface_estimate("generalist").unwrap().unwrap();
        assert!((interface - 10.0).abs() < 1e-9);
    }

    #[test]
    fn untracked_task_is_no_such_task() {
        let oracle = OracleManager::new(full_params(), [TaskKind::Generalist]);
        assert!(matches!(
            oracle.ask("exec_est.collector"),
            Err(OracleError::NoSuchTask(_))
        ));
        assert!(matches!(
            oracle.exec_estimate("collector"),
            Err(TaskError::NoSuchTask(_))
        ));
        assert!(matches!(
            oracle.exec_estimate("nonsense"),
            Err(TaskError::NoSuchTask(_))
        ));
    }
}
