//! Foraging controllers for FORDYCA robots.
//!
//! A controller turns sensor readings into motor commands. It owns the
//! robot's perceived map (when it has one), chooses targets by utility,
//! and runs a stack of hierarchical state machines: vectoring and
//! exploration at the bottom, goal acquisition above them, and a foraging
//! trip on top. Tasked variants put a task executive over the trip.
//!
//! # Modules
//!
//! - [`config`] -- [`ControllerKind`] and the tuning tree.
//! - [`sensing`] -- [`Sensing`] / [`Actuation`] seams and their plain-data
//!   implementations.
//! - [`pid`] -- Discrete PID loop.
//! - [`hfsm`] -- Table-driven hierarchical state machine engine.
//! - [`utility`] -- Block and cache utility functions.
//! - [`selection`] -- Best-target selection over known entities.
//! - [`fsm`] -- Vector, explore, acquire and foraging machines.
//! - [`controller`] -- [`ForagingController`], composing all of the above.
//! - [`error`] -- [`ControllerError`].

pub mod config;
pub mod controller;
pub mod error;
pub mod fsm;
pub mod hfsm;
pub mod pid;
pub mod selection;
pub mod sensing;
pub mod utility;

pub use config::{ControllerKind, ControllerParams, MotionParams, VectorParams};
pub use controller::{ControllerEvent, ControllerSetup, ControllerStats, ForagingController};
pub use error::ControllerError;
pub use fsm::acquire::{AcquireGoalFsm, AcquireState, AcquisitionGoal};
pub use fsm::explore::{ExploreFsm, ExploreState};
pub use fsm::foraging::{ForagingFsm, ForagingGoal, ForagingPhase, ForagingRole, Interaction};
pub use fsm::vector::{Goal, VectorFsm, VectorState};
pub use pid::{PidGains, PidLoop};
pub use selection::{Knowledge, SelectionParams, Target};
pub use sensing::{ActuatorCommands, Actuation, MotionCommand, SensorSnapshot, Sensing};
pub use utility::{BlockPriorities, UtilityModel};
