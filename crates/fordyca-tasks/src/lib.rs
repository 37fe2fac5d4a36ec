//! Task allocation for FORDYCA robots.
//!
//! A robot's work is decomposed into a small task graph: the *generalist*
//! task (fetch a block and bring it to the nest) may be partitioned into a
//! *harvester* (block to cache) and a *collector* (cache to nest). The
//! [`TaskExecutive`] steps the current task every tick, tracks how long it
//! has run, and on finish or abort updates the task's rolling time
//! estimates before asking the [`AllocationPolicy`] for the next task.
//!
//! # Modules
//!
//! - [`estimate`] -- Exponential and windowed [`TimeEstimate`]s.
//! - [`task`] -- [`TaskKind`] names and the [`PolledTask`] seam.
//! - [`graph`] -- The [`TaskGraph`] decomposition tree and per-node state.
//! - [`policy`] -- [`AllocationPolicy`] plus the abort, partition and
//!   subtask-selection probabilities.
//! - [`executive`] -- [`TaskExecutive`], [`TaskObserver`] callbacks and the
//!   [`EstimateOracle`] seam.
//! - [`error`] -- Error types for task operations.

pub mod error;
pub mod estimate;
pub mod executive;
pub mod graph;
pub mod policy;
pub mod task;

pub use error::TaskError;
pub use estimate::{EstimationMethod, TimeEstimate};
pub use executive::{
    EstimateOracle, ExecutiveParams, TaskEvent, TaskExecutive, TaskObserver, TaskTiming,
};
pub use graph::{TaskGraph, TaskNode};
pub use policy::{AbortParams, AllocationPolicy, CostView, PartitionParams};
pub use task::{PolledTask, TaskKind};
