//! Task names and the polled-task seam.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// A node of the task graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Find a block and bring it to the nest.
    Generalist,
    /// Find a block and bring it to a cache.
    Harvester,
    /// Fetch a block from a cache and bring it to the nest.
    Collector,
}

impl TaskKind {
    /// Every task, root first.
    pub const ALL: [Self; 3] = [Self::Generalist, Self::Harvester, Self::Collector];

    /// Name used in oracle queries and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generalist => "generalist",
            Self::Harvester => "harvester",
            Self::Collector => "collector",
        }
    }

    /// Whether this is one of the partitioned subtasks.
    pub const fn is_subtask(self) -> bool {
        matches!(self, Self::Harvester | Self::Collector)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaskError::NoSuchTask(s.to_owned()))
    }
}

/// A behaviour the executive can step once per tick.
///
/// The executive decides *which* task runs; the implementor decides *how*.
pub trait PolledTask {
    /// Error raised while executing a step.
    type Error;

    /// Begin executing `task` from its initial state.
    fn task_start(&mut self, task: TaskKind);

    /// Advance the current task by one tick.
    ///
    /// # Errors
    ///
    /// Implementation-defined; surfaces structural failures only.
    fn task_execute(&mut self) -> Result<(), Self::Error>;

    /// Whether the current task has completed.
    fn task_finished(&self) -> bool;

    /// Whether the task is at its interface (handing a block over at a
    /// cache or the nest). Time spent here feeds the interface estimate.
    fn task_at_interface(&self) -> bool;

    /// Abandon the current task, returning to the initial state.
    fn task_reset(&mut self);
}
