//! The task executive.
//!
//! Each tick [`TaskExecutive::run`]:
//!
//! 1. Allocates a task if none is current and starts it.
//! 2. Draws against the abort probability. An abort counts the elapsed time
//!    against the task's estimate and frees the robot for reallocation.
//! 3. Steps the task. If it finished, its estimates are updated, observers
//!    and the oracle are told, and the next tick allocates afresh.
//!
//! Estimates change only in steps 2 and 3, never mid-execution.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fordyca_types::RobotId;

use crate::error::TaskError;
use crate::estimate::EstimationMethod;
use crate::graph::TaskGraph;
use crate::policy::{AbortParams, AllocationPolicy, CostView, PartitionParams, abort_probability};
use crate::task::{PolledTask, TaskKind};

/// Executive tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveParams {
    /// How task estimates are maintained.
    #[serde(default)]
    pub estimation: EstimationMethod,
    /// How the next task is chosen.
    #[serde(default)]
    pub policy: AllocationPolicy,
    /// Abort curve.
    #[serde(default)]
    pub abort: AbortParams,
    /// Partition and subtask selection curves.
    #[serde(default)]
    pub partition: PartitionParams,
}

/// How long a task ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    /// Ticks from start to finish or abort.
    pub exec_ticks: u64,
    /// Ticks of that spent at the task's interface.
    pub interface_ticks: u64,
}

/// A task ending, as reported by [`TaskExecutive::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// The task completed.
    Finished {
        /// Which task.
        task: TaskKind,
        /// How long it took.
        timing: TaskTiming,
    },
    /// The task was abandoned.
    Aborted {
        /// Which task.
        task: TaskKind,
        /// How long it ran.
        timing: TaskTiming,
    },
}

/// Receives task lifecycle notifications.
pub trait TaskObserver: Send {
    /// A task was allocated and started.
    fn task_started(&mut self, _robot: RobotId, _task: TaskKind) {}
    /// A task completed.
    fn task_finished(&mut self, _robot: RobotId, _task: TaskKind, _timing: &TaskTiming) {}
    /// A task was abandoned.
    fn task_aborted(&mut self, _robot: RobotId, _task: TaskKind, _timing: &TaskTiming) {}
}

/// A source of task-time estimates that overrides local estimation.
///
/// Queries are by task name, as they are on the oracle itself.
pub trait EstimateOracle: Send + Sync + fmt::Debug {
    /// Execution estimate for `task`, `None` until one is known.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoSuchTask`] for a name the oracle does not track.
    fn exec_estimate(&self, task: &str) -> Result<Option<f64>, TaskError>;

    /// Interface estimate for `task`, `None` until one is known.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoSuchTask`] for a name the oracle does not track.
    fn interface_estimate(&self, task: &str) -> Result<Option<f64>, TaskError>;

    /// Fold one finish or abort into the oracle's estimates.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoSuchTask`] for a name the oracle does not track.
    fn report(&self, task: &str, timing: &TaskTiming) -> Result<(), TaskError>;
}

/// Owns a robot's task graph and steps its current task.
pub struct TaskExecutive {
    robot: RobotId,
    params: ExecutiveParams,
    graph: TaskGraph,
    current: Option<TaskKind>,
    elapsed: u64,
    interface_ticks: u64,
    n_finished: u64,
    n_aborted: u64,
    observers: Vec<Box<dyn TaskObserver>>,
    oracle: Option<Arc<dyn EstimateOracle>>,
}

impl fmt::Debug for TaskExecutive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutive")
            .field("robot", &self.robot)
            .field("current", &self.current)
            .field("elapsed", &self.elapsed)
            .field("observers", &self.observers.len())
            .field("oracle", &self.oracle.is_some())
            .finish_non_exhaustive()
    }
}

impl TaskExecutive {
    /// Build an executive.
    ///
    /// With an oracle attached, every task in the graph is looked up once so
    /// a mismatch between the oracle and the graph fails here rather than
    /// mid-run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] for unusable estimation
    /// parameters, or the oracle's error for a task it does not know.
    pub fn new(
        robot: RobotId,
        params: ExecutiveParams,
        oracle: Option<Arc<dyn EstimateOracle>>,
    ) -> Result<Self, TaskError> {
        if !params.estimation.is_valid() {
            return Err(TaskError::InvalidConfig {
                reason: format!("unusable estimation method {:?}", params.estimation),
            });
        }
        let graph = TaskGraph::new(params.estimation, params.partition.enabled);
        if let Some(oracle) = &oracle {
            for task in graph.tasks() {
                oracle.exec_estimate(task.as_str())?;
                oracle.interface_estimate(task.as_str())?;
            }
        }
        Ok(Self {
            robot,
            params,
            graph,
            current: None,
            elapsed: 0,
            interface_ticks: 0,
            n_finished: 0,
            n_aborted: 0,
            observers: Vec::new(),
            oracle,
        })
    }

    /// Register an observer.
    pub fn add_observer(&mut self, observer: Box<dyn TaskObserver>) {
        self.observers.push(observer);
    }

    /// The task being executed, if one has been allocated.
    pub const fn current_task(&self) -> Option<TaskKind> {
        self.current
    }

    /// Ticks the current task has run.
    pub const fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// The task graph and its estimates.
    pub const fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Number of tasks finished.
    pub const fn n_finished(&self) -> u64 {
        self.n_finished
    }

    /// Number of tasks aborted.
    pub const fn n_aborted(&self) -> u64 {
        self.n_aborted
    }

    /// Task costs the policy sees: the oracle's when attached, otherwise the
    /// graph's own.
    ///
    /// # Errors
    ///
    /// Propagates oracle lookup failures.
    pub fn costs(&self) -> Result<CostView, TaskError> {
        let Some(oracle) = &self.oracle else {
            return Ok(CostView::from_graph(&self.graph));
        };
        let cost = |task: TaskKind| -> Result<Option<f64>, TaskError> {
            if !self.graph.contains(task) {
                return Ok(None);
            }
            let exec = oracle.exec_estimate(task.as_str())?;
            let interface = oracle.interface_estimate(task.as_str())?.unwrap_or(0.0);
            Ok(exec.map(|e| e + interface))
        };
        Ok(CostView {
            generalist: cost(TaskKind::Generalist)?,
            harvester: cost(TaskKind::Harvester)?,
            collector: cost(TaskKind::Collector)?,
        })
    }

    /// Step the current task by one tick, allocating one first if needed.
    ///
    /// Returns the finish or abort that happened this tick, if any.
    ///
    /// # Errors
    ///
    /// Propagates the task's own errors and oracle failures.
    pub fn run<P, R>(&mut self, task: &mut P, rng: &mut R) -> Result<Option<TaskEvent>, P::Error>
    where
        P: PolledTask,
        P::Error: From<TaskError>,
        R: Rng + ?Sized,
    {
        let current = match self.current {
            Some(t) => t,
            None => self.allocate(task, rng)?,
        };

        // Interaction outcomes can complete a task between ticks.
        if task.task_finished() {
            let timing = self.conclude(current, false)?;
            return Ok(Some(TaskEvent::Finished {
                task: current,
                timing,
            }));
        }

        if !task.task_at_interface() {
            let estimate = self.exec_estimate(current)?;
            let p = abort_probability(&self.params.abort, self.elapsed, estimate);
            if rng.random::<f64>() < p {
                task.task_reset();
                let timing = self.conclude(current, true)?;
                return Ok(Some(TaskEvent::Aborted {
                    task: current,
                    timing,
                }));
            }
        }

        task.task_execute()?;
        self.elapsed = self.elapsed.saturating_add(1);
        if task.task_at_interface() {
            self.interface_ticks = self.interface_ticks.saturating_add(1);
        }

        if task.task_finished() {
            let timing = self.conclude(current, false)?;
            return Ok(Some(TaskEvent::Finished {
                task: current,
                timing,
            }));
        }
        Ok(None)
    }

    fn allocate<P, R>(&mut self, task: &mut P, rng: &mut R) -> Result<TaskKind, TaskError>
    where
        P: PolledTask,
        R: Rng + ?Sized,
    {
        let costs = self.costs()?;
        let samples = self
            .graph
            .node(TaskKind::Generalist)
            .map_or(0, |n| n.exec_estimate.n_samples());
        let next = self
            .params
            .policy
            .select(&self.graph, &costs, &self.params.partition, samples, rng);
        task.task_start(next);
        self.current = Some(next);
        self.elapsed = 0;
        self.interface_ticks = 0;
        for observer in &mut self.observers {
            observer.task_started(self.robot, next);
        }
        debug!(robot = %self.robot, task = %next, ?costs, "Task allocated");
        Ok(next)
    }

    fn exec_estimate(&self, task: TaskKind) -> Result<f64, TaskError> {
        if let Some(oracle) = &self.oracle {
            return Ok(oracle.exec_estimate(task.as_str())?.unwrap_or(0.0));
        }
        Ok(self
            .graph
            .node(task)
            .map_or(0.0, |n| n.exec_estimate.value()))
    }

    #[allow(clippy::cast_precision_loss)]
    fn conclude(&mut self, task: TaskKind, aborted: bool) -> Result<TaskTiming, TaskError> {
        let timing = TaskTiming {
            exec_ticks: self.elapsed,
            interface_ticks: self.interface_ticks,
        };
        let node = self
            .graph
            .node_mut(task)
            .ok_or_else(|| TaskError::NoSuchTask(task.as_str().to_owned()))?;
        node.exec_estimate.update(timing.exec_ticks as f64);
        if timing.interface_ticks > 0 {
            node.interface_estimate.update(timing.interface_ticks as f64);
        }
        let estimate = node.exec_estimate.value();

        for observer in &mut self.observers {
            if aborted {
                observer.task_aborted(self.robot, task, &timing);
            } else {
                observer.task_finished(self.robot, task, &timing);
            }
        }
        if let Some(oracle) = &self.oracle {
            oracle.report(task.as_str(), &timing)?;
        }

        if aborted {
            self.n_aborted = self.n_aborted.saturating_add(1);
            info!(robot = %self.robot, task = %task, ticks = timing.exec_ticks, estimate, "Task aborted");
        } else {
            self.n_finished = self.n_finished.saturating_add(1);
            info!(robot = %self.robot, task = %task, ticks = timing.exec_ticks, estimate, "Task finished");
        }
        self.current = None;
        self.elapsed = 0;
        self.interface_ticks = 0;
        Ok(timing)
    }
}
