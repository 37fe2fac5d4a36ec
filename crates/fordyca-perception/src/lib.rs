//! Per-robot perception: a decaying belief about the arena.
//!
//! Every robot owns a [`PerceivedArenaMap`], a dense grid of cells that
//! mirrors the arena as the robot last saw it. Each cell carries a
//! [`PheromoneDensity`] that is reinforced whenever the cell is observed and
//! decays geometrically every tick; once it falls below [`EPSILON`] the cell
//! is forgotten and reverts to unknown.
//!
//! Each tick the simulation calls [`PerceivedArenaMap::update`] (decay) and
//! then [`fusion::process_los`] to reconcile the robot's line of sight with
//! its belief.
//!
//! # Modules
//!
//! - [`pheromone`] -- [`PheromoneDensity`] deposit and decay.
//! - [`perceived_map`] -- [`PerceivedArenaMap`], [`PerceivedCell`] and the
//!   [`MapEvent`] dispatcher.
//! - [`fusion`] -- Line-of-sight reconciliation and its consistency check.
//! - [`stats`] -- World-model accuracy and fusion counters.
//! - [`error`] -- Error types for perception operations.

pub mod error;
pub mod fusion;
pub mod perceived_map;
pub mod pheromone;
pub mod stats;

pub use error::PerceptionError;
pub use fusion::process_los;
pub use perceived_map::{MapEvent, PerceivedArenaMap, PerceivedCell, PerceivedEntity, PerceptionParams};
pub use pheromone::{DEPOSIT, EPSILON, PheromoneDensity};
pub use stats::{AccuracyStats, FusionStats};
