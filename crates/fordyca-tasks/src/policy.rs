//! Allocation policies and the probabilities they draw on.
//!
//! All probabilities are logistic curves over a ratio of time estimates:
//!
//! - abort: `1 / (1 + exp(reactivity * (offset - elapsed / estimate)))`;
//!   rises as a task overruns its estimate.
//! - partition: `1 / (1 + exp(reactivity * (subtasks / whole - 1)))`; above
//!   one half when harvester plus collector is cheaper than generalist.
//! - subtask: `1 / (1 + exp(reactivity * (harvester / collector - 1)))`;
//!   the probability of picking the harvester.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::TaskGraph;
use crate::task::TaskKind;

/// Task abort tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbortParams {
    /// Whether running tasks may be aborted at all.
    #[serde(default = "default_abort_enabled")]
    pub enabled: bool,
    /// Steepness of the abort curve.
    #[serde(default = "default_abort_reactivity")]
    pub reactivity: f64,
    /// Overrun ratio at which abort probability reaches one half.
    #[serde(default = "default_abort_offset")]
    pub offset: f64,
}

const fn default_abort_enabled() -> bool {
    true
}

const fn default_abort_reactivity() -> f64 {
    8.0
}

const fn default_abort_offset() -> f64 {
    3.0
}

impl Default for AbortParams {
    fn default() -> Self {
        Self {
            enabled: default_abort_enabled(),
            reactivity: default_abort_reactivity(),
            offset: default_abort_offset(),
        }
    }
}

/// Partitioning tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionParams {
    /// Whether the generalist task may be partitioned at all.
    #[serde(default = "default_partitioning")]
    pub enabled: bool,
    /// Steepness of the partition curve.
    #[serde(default = "default_partition_reactivity")]
    pub reactivity: f64,
    /// Steepness of the subtask selection curve.
    #[serde(default = "default_subtask_reactivity")]
    pub subtask_reactivity: f64,
    /// Generalist samples required before partitioning is considered.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

const fn default_partitioning() -> bool {
    true
}

const fn default_partition_reactivity() -> f64 {
    1.5
}

const fn default_subtask_reactivity() -> f64 {
    2.0
}

const fn default_min_samples() -> u64 {
    1
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            enabled: default_partitioning(),
            reactivity: default_partition_reactivity(),
            subtask_reactivity: default_subtask_reactivity(),
            min_samples: default_min_samples(),
        }
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + x.exp())
}

/// Probability of aborting a task that has run `elapsed` ticks against an
/// estimate of `estimate` ticks. An estimate of zero counts as no overrun.
#[allow(clippy::cast_precision_loss)]
pub fn abort_probability(params: &AbortParams, elapsed: u64, estimate: f64) -> f64 {
    if !params.enabled {
        return 0.0;
    }
    let ratio = if estimate > 0.0 {
        elapsed as f64 / estimate
    } else {
        0.0
    };
    logistic(params.reactivity * (params.offset - ratio))
}

/// Probability of choosing a subtask over the whole task. One half when
/// either side has no estimate yet.
pub fn partition_probability(whole: Option<f64>, subtasks: Option<f64>, reactivity: f64) -> f64 {
    match (whole, subtasks) {
        (Some(w), Some(s)) if w > 0.0 => logistic(reactivity * (s / w - 1.0)),
        _ => 0.5,
    }
}

/// Probability of choosing the harvester over the collector. One half when
/// either side has no estimate yet.
pub fn subtask_probability(
    harvester: Option<f64>,
    collector: Option<f64>,
    reactivity: f64,
) -> f64 {
    match (harvester, collector) {
        (Some(h), Some(c)) if c > 0.0 => logistic(reactivity * (h / c - 1.0)),
        _ => 0.5,
    }
}

/// How the next task is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Uniformly random over every task in the graph.
    Random,
    /// Partition with the partition probability, then pick a subtask with
    /// the subtask selection probability.
    #[default]
    StochasticNeighborhood,
    /// Always take the cheapest option; unsampled tasks count as free so
    /// they are tried first.
    StrictGreedy,
}

/// Per-task costs as seen by the policy (local estimates or oracle).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostView {
    /// Generalist cost, if known.
    pub generalist: Option<f64>,
    /// Harvester cost, if known.
    pub harvester: Option<f64>,
    /// Collector cost, if known.
    pub collector: Option<f64>,
}

impl CostView {
    /// Costs taken from the graph's own estimates.
    pub fn from_graph(graph: &TaskGraph) -> Self {
        Self {
            generalist: graph.cost(TaskKind::Generalist),
            harvester: graph.cost(TaskKind::Harvester),
            collector: graph.cost(TaskKind::Collector),
        }
    }

    fn subtask_sum(&self) -> Option<f64> {
        Some(self.harvester? + self.collector?)
    }
}

impl AllocationPolicy {
    /// Choose the next task.
    pub fn select<R: Rng + ?Sized>(
        self,
        graph: &TaskGraph,
        costs: &CostView,
        params: &PartitionParams,
        generalist_samples: u64,
        rng: &mut R,
    ) -> TaskKind {
        if !graph.is_partitioned() {
            return TaskKind::Generalist;
        }
        match self {
            Self::Random => {
                let tasks: Vec<TaskKind> = graph.tasks().collect();
                let i = rng.random_range(0..tasks.len());
                tasks.get(i).copied().unwrap_or(TaskKind::Generalist)
            }
            Self::StochasticNeighborhood => {
                if generalist_samples < params.min_samples {
                    return TaskKind::Generalist;
                }
                let p = partition_probability(
                    costs.generalist,
                    costs.subtask_sum(),
                    params.reactivity,
                );
                if rng.random::<f64>() >= p {
                    return TaskKind::Generalist;
                }
                let h = subtask_probability(
                    costs.harvester,
                    costs.collector,
                    params.subtask_reactivity,
                );
                if rng.random::<f64>() < h {
                    TaskKind::Harvester
                } else {
                    TaskKind::Collector
                }
            }
            Self::StrictGreedy => {
                let whole = costs.generalist.unwrap_or(0.0);
                let h = costs.harvester.unwrap_or(0.0);
                let c = costs.collector.unwrap_or(0.0);
                if h + c < whole {
                    if h <= c {
                        TaskKind::Harvester
                    } else {
                        TaskKind::Collector
                    }
                } else {
                    TaskKind::Generalist
                }
            }
        }
    }
}
