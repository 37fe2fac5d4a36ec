//! Configuration loading and typed config structures for the FORDYCA
//! simulation.
//!
//! The canonical configuration lives in `fordyca-config.yaml` at the project
//! root. Every section and every field is optional: anything missing falls
//! back to the defaults defined here, so an empty file is a valid config.

use std::path::Path;

use serde::Deserialize;

use fordyca_controller::ControllerParams;
use fordyca_oracle::OracleParams;
use fordyca_perception::PerceptionParams;
use fordyca_tasks::ExecutiveParams;
use fordyca_types::{Nest, Vec2};
use fordyca_world::{ArenaParams, StaticCacheParams};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but cannot drive a simulation.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `fordyca-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Arena geometry, blocks and caches.
    #[serde(default)]
    pub arena: ArenaConfig,

    /// Perceived map tuning.
    #[serde(default)]
    pub perception: PerceptionConfig,

    /// Controller variant and tuning.
    #[serde(default)]
    pub controller: ControllerParams,

    /// Task executive tuning (tasked controllers only).
    #[serde(default)]
    pub tasks: ExecutiveParams,

    /// Which oracle tables run.
    #[serde(default)]
    pub oracle: OracleParams,

    /// Robot body model used by the headless driver.
    #[serde(default)]
    pub body: BodyConfig,

    /// Run bounds, seeding and parallelism.
    #[serde(default)]
    pub simulation: RunConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rho = self.perception.rho;
        if !(rho > 0.0 && rho <= 1.0) {
            return Err(invalid(format!("perception.rho must be in (0, 1], got {rho}")));
        }
        let ramp = self.arena.ramp_fraction;
        if !(0.0..=1.0).contains(&ramp) {
            return Err(invalid(format!(
                "arena.ramp_fraction must be in [0, 1], got {ramp}"
            )));
        }
        if self.simulation.n_robots == 0 {
            return Err(invalid("simulation.n_robots must be at least 1".to_owned()));
        }
        if !self.arena.nest_inside() {
            return Err(invalid("arena.nest must lie inside the arena".to_owned()));
        }
        if self.body.max_turn <= 0.0 {
            return Err(invalid("body.max_turn must be positive".to_owned()));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Arena geometry, block population and cache policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArenaConfig {
    /// Arena width in metres.
    #[serde(default = "default_arena_extent")]
    pub width: f64,

    /// Arena height in metres.
    #[serde(default = "default_arena_extent")]
    pub height: f64,

    /// Metres per grid cell.
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Nest centre.
    #[serde(default = "default_nest_center")]
    pub nest_center: Vec2,

    /// Nest width in metres.
    #[serde(default = "default_nest_extent")]
    pub nest_width: f64,

    /// Nest height in metres.
    #[serde(default = "default_nest_extent")]
    pub nest_height: f64,

    /// Number of blocks in the arena.
    #[serde(default = "default_n_blocks")]
    pub n_blocks: usize,

    /// Fraction of blocks that are ramps; the rest are cubes.
    #[serde(default)]
    pub ramp_fraction: f64,

    /// Minimum number of blocks a cache may hold.
    #[serde(default = "default_cache_min_blocks")]
    pub cache_min_blocks: usize,

    /// Maximum spacing of blocks merged into a dynamic cache.
    #[serde(default = "default_cache_dimension")]
    pub cache_dimension: f64,

    /// Static cache, re-created whenever it dissolves.
    #[serde(default)]
    pub static_cache: Option<StaticCacheParams>,

    /// Run the dynamic cache creation pass every tick.
    #[serde(default)]
    pub dynamic_caches: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: default_arena_extent(),
            height: default_arena_extent(),
            resolution: default_resolution(),
            nest_center: default_nest_center(),
            nest_width: default_nest_extent(),
            nest_height: default_nest_extent(),
            n_blocks: default_n_blocks(),
            ramp_fraction: 0.0,
            cache_min_blocks: default_cache_min_blocks(),
            cache_dimension: default_cache_dimension(),
            static_cache: None,
            dynamic_caches: false,
        }
    }
}

impl ArenaConfig {
    /// The nest this section describes.
    pub fn nest(&self) -> Nest {
        Nest::new(self.nest_center, self.nest_width, self.nest_height)
    }

    /// Parameters for building the ground-truth arena.
    pub fn arena_params(&self) -> ArenaParams {
        ArenaParams {
            width: self.width,
            height: self.height,
            resolution: self.resolution,
            nest: self.nest(),
            cache_min_blocks: self.cache_min_blocks,
            cache_dimension: self.cache_dimension,
            static_cache: self.static_cache,
        }
    }

    fn nest_inside(&self) -> bool {
        let nest = self.nest();
        let lo = nest.center - nest.half_extent;
        let hi = nest.center + nest.half_extent;
        lo.x >= 0.0 && lo.y >= 0.0 && hi.x <= self.width && hi.y <= self.height
    }
}

const fn default_arena_extent() -> f64 {
    10.0
}

const fn default_resolution() -> f64 {
    0.2
}

const fn default_nest_center() -> Vec2 {
    Vec2::new(2.0, 5.0)
}

const fn default_nest_extent() -> f64 {
    2.0
}

const fn default_n_blocks() -> usize {
    20
}

const fn default_cache_min_blocks() -> usize {
    2
}

const fn default_cache_dimension() -> f64 {
    0.6
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

/// Perceived map and line-of-sight settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PerceptionConfig {
    /// Per-tick pheromone decay factor.
    #[serde(default = "default_rho")]
    pub rho: f64,

    /// Whether re-sightings deposit on top of existing density.
    #[serde(default)]
    pub repeat_deposit: bool,

    /// Line-of-sight radius in cells.
    #[serde(default = "default_los_radius")]
    pub los_radius: u32,

    /// Check every fused map against its line of sight.
    #[serde(default)]
    pub verify: bool,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            rho: default_rho(),
            repeat_deposit: false,
            los_radius: default_los_radius(),
            verify: false,
        }
    }
}

impl PerceptionConfig {
    /// Parameters for each robot's perceived map.
    pub const fn params(&self) -> PerceptionParams {
        PerceptionParams {
            rho: self.rho,
            repeat_deposit: self.repeat_deposit,
            verify_fusion: self.verify,
        }
    }
}

const fn default_rho() -> f64 {
    0.99
}

const fn default_los_radius() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Differential-drive body model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BodyConfig {
    /// Largest heading change per tick, in radians.
    #[serde(default = "default_max_turn")]
    pub max_turn: f64,

    /// Distance at which walls register on the proximity sensors.
    #[serde(default = "default_wall_range")]
    pub wall_range: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_turn: default_max_turn(),
            wall_range: default_wall_range(),
        }
    }
}

const fn default_max_turn() -> f64 {
    0.6
}

const fn default_wall_range() -> f64 {
    0.3
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run bounds, seeding and parallelism.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Master seed. Robot and distributor streams derive from it.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of robots.
    #[serde(default = "default_n_robots")]
    pub n_robots: usize,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Wall-clock pause between ticks, in milliseconds.
    #[serde(default)]
    pub tick_interval_ms: u64,

    /// Step robots on scoped worker threads.
    #[serde(default)]
    pub parallel_robots: bool,

    /// Ticks between metrics reports (0 = never).
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    /// Where the engine writes its run summary.
    #[serde(default = "default_summary_path")]
    pub summary_path: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            n_robots: default_n_robots(),
            max_ticks: default_max_ticks(),
            tick_interval_ms: 0,
            parallel_robots: false,
            stats_interval: default_stats_interval(),
            summary_path: default_summary_path(),
        }
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_n_robots() -> usize {
    8
}

const fn default_max_ticks() -> u64 {
    5000
}

const fn default_stats_interval() -> u64 {
    500
}

fn default_summary_path() -> String {
    "fordyca-summary.json".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fordyca_controller::ControllerKind;
    use fordyca_tasks::AllocationPolicy;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.perception.los_radius, 3);
        assert_eq!(config.arena.n_blocks, 20);
        assert_eq!(config.controller.kind, ControllerKind::Mapped);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
arena:
  width: 12.0
  height: 8.0
  resolution: 0.25
  nest_center: { x: 1.5, y: 4.0 }
  nest_width: 1.0
  nest_height: 2.0
  n_blocks: 30
  ramp_fraction: 0.5
  static_cache:
    center: { x: 6.0, y: 4.0 }
    size: 4

perception:
  rho: 0.9
  repeat_deposit: true
  los_radius: 5
  verify: true

controller:
  kind: oracle_tasked

tasks:
  policy: strict_greedy

oracle:
  entities: true
  tasking: true

body:
  max_turn: 0.3

simulation:
  seed: 7
  n_robots: 16
  max_ticks: 100
  parallel_robots: true
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert!((config.arena.width - 12.0).abs() < f64::EPSILON);
        assert_eq!(config.arena.n_blocks, 30);
        assert_eq!(config.arena.static_cache.unwrap().size, 4);
        assert!(config.perception.repeat_deposit);
        assert_eq!(config.perception.los_radius, 5);
        assert_eq!(config.controller.kind, ControllerKind::OracleTasked);
        assert_eq!(config.tasks.policy, AllocationPolicy::StrictGreedy);
        assert!(config.oracle.entities && config.oracle.tasking);
        assert!((config.body.max_turn - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.simulation.seed, 7);
        assert!(config.simulation.parallel_robots);
        // Untouched fields keep their defaults.
        assert!((config.body.wall_range - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.simulation.stats_interval, 500);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("simulation:\n  seed: 9\n").unwrap();
        assert_eq!(config.simulation.seed, 9);
        assert_eq!(config.arena, ArenaConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(SimulationConfig::parse("").unwrap(), SimulationConfig::default());
    }

    #[test]
    fn rejects_out_of_range_rho() {
        let err = SimulationConfig::parse("perception:\n  rho: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        let err = SimulationConfig::parse("perception:\n  rho: 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_nest_outside_arena() {
        let yaml = "arena:\n  nest_center: { x: 9.5, y: 5.0 }\n";
        let err = SimulationConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("nest"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = SimulationConfig::parse("arena: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn arena_params_carry_nest_and_cache_settings() {
        let arena = ArenaConfig::default();
        let params = arena.arena_params();
        assert!(params.nest.contains(Vec2::new(2.0, 5.0)));
        assert_eq!(params.cache_min_blocks, 2);
        assert!(params.static_cache.is_none());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fordyca-config.yaml");
        let config = SimulationConfig::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
    }
}
