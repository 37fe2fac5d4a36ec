//! Configuration, tick cycle, and orchestration for the FORDYCA simulation.
//!
//! This crate owns the headless driver around the controllers: it builds
//! the arena and the swarm from configuration, runs the five-phase tick
//! cycle, moves robot bodies, redistributes delivered blocks, and rolls up
//! swarm-wide metrics.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `fordyca-config.yaml` into
//!   strongly-typed structs.
//! - [`kinematics`] -- Point-robot body model and wall sensing.
//! - [`distributor`] -- Uniform random block (re)distribution.
//! - [`spawn`] -- Assembles a [`SimulationState`] from a config.
//! - [`tick`] -- The tick cycle.
//! - [`runner`] -- Bounded, stoppable run loop.
//! - [`metrics`] -- Task lifecycle counts and [`SwarmMetrics`].

pub mod config;
pub mod distributor;
pub mod kinematics;
pub mod metrics;
pub mod runner;
pub mod spawn;
pub mod tick;

pub use config::{ConfigError, SimulationConfig};
pub use metrics::{SharedTaskStats, SwarmMetrics, TaskStats, TaskStatsObserver};
pub use runner::{RunControl, RunnerError, SimulationEndReason, SimulationResult, TickCallback};
pub use spawn::{SpawnError, build_simulation};
pub use tick::{Robot, SimulationState, TickError, TickSummary, run_tick};
