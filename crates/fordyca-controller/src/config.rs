//! Controller tuning, deserialized from the `controller` config section.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::pid::PidGains;
use crate::selection::SelectionParams;

/// Which controller a robot runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// No world model; blocks are found only by exploring.
    RandomWalk,
    /// Perceived map with pheromone decay; generalist task only.
    #[default]
    Mapped,
    /// Like `Mapped`, but entity knowledge comes from the oracle.
    OracleMapped,
    /// Perceived map plus the task executive over the partitioned graph.
    Tasked,
    /// Like `Tasked`, with oracle entities and task estimates.
    OracleTasked,
}

impl ControllerKind {
    /// Whether the robot keeps a perceived map.
    pub const fn uses_perception(self) -> bool {
        !matches!(self, Self::RandomWalk)
    }

    /// Whether entity knowledge comes from the oracle.
    pub const fn uses_oracle(self) -> bool {
        matches!(self, Self::OracleMapped | Self::OracleTasked)
    }

    /// Whether a task executive drives the foraging FSM.
    pub const fn is_tasked(self) -> bool {
        matches!(self, Self::Tasked | Self::OracleTasked)
    }

    /// Config name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RandomWalk => "random_walk",
            Self::Mapped => "mapped",
            Self::OracleMapped => "oracle_mapped",
            Self::Tasked => "tasked",
            Self::OracleTasked => "oracle_tasked",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arrival tolerances and steering loops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorParams {
    /// Distance at which a block target counts as reached.
    #[serde(default = "default_block_tolerance")]
    pub block_tolerance: f64,
    /// Distance at which a cache target counts as reached.
    #[serde(default = "default_cache_tolerance")]
    pub cache_tolerance: f64,
    /// Distance from the nest centre that counts as home.
    #[serde(default = "default_nest_tolerance")]
    pub nest_tolerance: f64,
    /// Heading error to turn rate.
    #[serde(default = "default_angular_gains")]
    pub angular: PidGains,
    /// Distance to forward speed.
    #[serde(default = "default_linear_gains")]
    pub linear: PidGains,
}

const fn default_block_tolerance() -> f64 {
    0.05
}

const fn default_cache_tolerance() -> f64 {
    0.05
}

const fn default_nest_tolerance() -> f64 {
    0.2
}

const fn default_angular_gains() -> PidGains {
    PidGains {
        kp: 0.8,
        ki: 0.0,
        kd: 0.1,
        min: -0.6,
        max: 0.6,
    }
}

const fn default_linear_gains() -> PidGains {
    PidGains {
        kp: 0.5,
        ki: 0.0,
        kd: 0.0,
        min: 0.0,
        max: 0.05,
    }
}

impl Default for VectorParams {
    fn default() -> Self {
        Self {
            block_tolerance: default_block_tolerance(),
            cache_tolerance: default_cache_tolerance(),
            nest_tolerance: default_nest_tolerance(),
            angular: default_angular_gains(),
            linear: default_linear_gains(),
        }
    }
}

/// Speeds and behaviour timers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    /// Cruising speed while exploring or avoiding, in metres per tick.
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    /// Ticks spent driving straight after an obstacle clears.
    #[serde(default = "default_collision_recovery_ticks")]
    pub collision_recovery_ticks: u32,
    /// Ticks of fruitless exploring before picking a new direction.
    #[serde(default = "default_unsuccessful_explore_ticks")]
    pub unsuccessful_explore_ticks: u32,
}

const fn default_max_speed() -> f64 {
    0.05
}

const fn default_collision_recovery_ticks() -> u32 {
    10
}

const fn default_unsuccessful_explore_ticks() -> u32 {
    50
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            collision_recovery_ticks: default_collision_recovery_ticks(),
            unsuccessful_explore_ticks: default_unsuccessful_explore_ticks(),
        }
    }
}

/// All controller tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerParams {
    /// Controller variant.
    #[serde(default)]
    pub kind: ControllerKind,
    /// Speeds and timers.
    #[serde(default)]
    pub motion: MotionParams,
    /// Vectoring.
    #[serde(default)]
    pub vector: VectorParams,
    /// Target selection.
    #[serde(default)]
    pub selection: SelectionParams,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::utility::UtilityModel;

    #[test]
    fn empty_section_uses_defaults() {
        let p: ControllerParams = serde_yml::from_str("{}").unwrap();
        assert_eq!(p, ControllerParams::default());
        assert_eq!(p.kind, ControllerKind::Mapped);
    }

    #[test]
    fn partial_section_overrides_fields() {
        let yaml = r"
kind: oracle_tasked
motion:
  collision_recovery_ticks: 4
selection:
  model: legacy
  priorities:
    ramp: 3.0
";
        let p: ControllerParams = serde_yml::from_str(yaml).unwrap();
        assert_eq!(p.kind, ControllerKind::OracleTasked);
        assert!(p.kind.uses_oracle() && p.kind.is_tasked());
        assert_eq!(p.motion.collision_recovery_ticks, 4);
        assert_eq!(p.motion.unsuccessful_explore_ticks, 50);
        assert_eq!(p.selection.model, UtilityModel::Legacy);
        assert!((p.selection.priorities.ramp - 3.0).abs() < 1e-12);
        assert!((p.selection.priorities.cube - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_walk_has_no_map() {
        assert!(!ControllerKind::RandomWalk.uses_perception());
        assert!(ControllerKind::OracleMapped.uses_perception());
        assert_eq!(ControllerKind::Tasked.to_string(), "tasked");
    }
}
