//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// The physical kind of a block.
///
/// Ramp blocks are larger and, in the priority-weighted utility model, can be
/// made more or less attractive than cubes through configured priorities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A cube block occupying one grid cell.
    #[default]
    Cube,
    /// A ramp block.
    Ramp,
}

/// LED colours a controller can display.
///
/// Colours are pure output; they only matter to an external visualiser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    /// LEDs off.
    #[default]
    Black,
    /// Exploring.
    Magenta,
    /// Vectoring to a known goal.
    Blue,
    /// Avoiding a collision.
    Red,
    /// Carrying a block.
    Green,
    /// Waiting at an interface (pickup/drop).
    Yellow,
    /// Leaving the nest.
    White,
}
