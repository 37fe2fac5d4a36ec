//! Shared type definitions for the FORDYCA foraging simulation.
//!
//! This crate is the single source of truth for the plain data types that
//! flow between the arena, the per-robot perception subsystem, the foraging
//! controllers and the task executive.
//!
//! # Modules
//!
//! - [`ids`] -- Index newtypes for blocks, caches and robots, plus the
//!   [`EntityRef`] tagged union used by grid cells.
//! - [`geometry`] -- Real-valued [`Vec2`] and discrete [`DiscreteCoord`]
//!   arena coordinates.
//! - [`enums`] -- Block kinds and LED colours.
//! - [`entities`] -- [`Block`], [`Cache`] and [`Nest`] entity structs.
//!
//! Blocks and caches are owned by the ground-truth arena and addressed by
//! index everywhere else; nothing outside the arena holds a pointer to an
//! entity.

pub mod entities;
pub mod enums;
pub mod geometry;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use entities::{Block, Cache, Nest};
pub use enums::{BlockKind, LedColor};
pub use geometry::{DiscreteCoord, Vec2, normalize_angle};
pub use ids::{BlockId, CacheId, EntityRef, RobotId};
