//! Ground-truth arena, occupancy cells, and line-of-sight windows.
//!
//! This crate models the physical world robots forage in: a dense grid of
//! cells, each driven by a small occupancy state machine, the blocks and
//! caches the arena owns, and the nest. Robots never read the arena
//! directly; each tick they receive a [`LineOfSight`] window over it.
//!
//! # Modules
//!
//! - [`cell`] -- [`Cell`] occupancy state machine and the [`CellEvent`]
//!   dispatcher.
//! - [`grid`] -- Generic dense 2D [`Grid2D`] container.
//! - [`arena`] -- [`ArenaMap`]: authoritative blocks, caches, pickups, drops,
//!   cache creation and dissolution.
//! - [`los`] -- [`LineOfSight`] read-only window centred on a robot.
//! - [`error`] -- Error types for arena operations.

pub mod arena;
pub mod cell;
pub mod error;
pub mod grid;
pub mod los;

// Re-export primary types at crate root.
pub use arena::{ArenaMap, ArenaParams, CachePickup, StaticCacheParams};
pub use cell::{Cell, CellEvent, CellKind, CellState};
pub use error::WorldError;
pub use grid::Grid2D;
pub use los::LineOfSight;
