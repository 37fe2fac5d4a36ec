//! Utility functions that rank known blocks and caches.
//!
//! Blocks score `(|e - nest| / |e - robot|) * f(density, priority)`, favouring
//! blocks far from the nest but close to the robot. Caches score
//! `exp(density) * n_blocks / (|c - robot| + |c - nest|)`.

use serde::{Deserialize, Serialize};

use fordyca_types::{BlockKind, Vec2};

/// Smallest distance used as a divisor, so a target under the robot scores
/// very high instead of infinite.
const MIN_DIVISOR: f64 = 1e-6;

/// How pheromone density weighs into block utility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityModel {
    /// `exp(-density)`: fresher sightings score lower.
    Legacy,
    /// `exp(density * priority)`: fresher sightings and higher-priority
    /// kinds score higher.
    #[default]
    PriorityWeighted,
}

/// Per-kind block priorities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockPriorities {
    /// Cube priority.
    #[serde(default = "default_cube_priority")]
    pub cube: f64,
    /// Ramp priority.
    #[serde(default = "default_ramp_priority")]
    pub ramp: f64,
}

const fn default_cube_priority() -> f64 {
    1.0
}

const fn default_ramp_priority() -> f64 {
    1.5
}

impl Default for BlockPriorities {
    fn default() -> Self {
        Self {
            cube: default_cube_priority(),
            ramp: default_ramp_priority(),
        }
    }
}

impl BlockPriorities {
    /// Priority of `kind`.
    pub const fn of(&self, kind: BlockKind) -> f64 {
        match kind {
            BlockKind::Cube => self.cube,
            BlockKind::Ramp => self.ramp,
        }
    }
}

/// Utility of a block at `loc`.
pub fn block_utility(
    model: UtilityModel,
    loc: Vec2,
    robot: Vec2,
    nest: Vec2,
    density: f64,
    priority: f64,
) -> f64 {
    let ratio = loc.distance(nest) / loc.distance(robot).max(MIN_DIVISOR);
    let weight = match model {
        UtilityModel::Legacy => (-density).exp(),
        UtilityModel::PriorityWeighted => (density * priority).exp(),
    };
    ratio * weight
}

/// Utility of a cache at `loc` holding `n_blocks` blocks.
#[allow(clippy::cast_precision_loss)]
pub fn cache_utility(loc: Vec2, robot: Vec2, nest: Vec2, density: f64, n_blocks: usize) -> f64 {
    let span = (loc.distance(robot) + loc.distance(nest)).max(MIN_DIVISOR);
    density.exp() * n_blocks as f64 / span
}
