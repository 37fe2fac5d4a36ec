//! Error types for the `fordyca-perception` crate.

use fordyca_types::{BlockId, DiscreteCoord, RobotId};
use fordyca_world::{CellKind, WorldError};

/// Errors raised by the perception subsystem.
///
/// All of these are structural: a correctly wired simulation never produces
/// them, and the runner stops when one surfaces.
#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    /// The decay factor is outside `(0, 1]`.
    #[error("pheromone rho {0} must lie in (0, 1]")]
    InvalidRho(f64),

    /// A coordinate outside the perceived grid was addressed.
    #[error("coordinate {0} is outside the perceived map")]
    OutOfBounds(DiscreteCoord),

    /// A block reported as visible is marked out of sight.
    #[error("block {0} is visible but marked out of sight")]
    BlockOutOfSight(BlockId),

    /// After fusion a line-of-sight cell disagrees with the perceived map.
    #[error(
        "robot {robot}: cell {coord} is {expected:?} in line of sight but {actual:?} in perception"
    )]
    LosMismatch {
        /// Robot whose belief diverged.
        robot: RobotId,
        /// The offending cell.
        coord: DiscreteCoord,
        /// State in the line of sight.
        expected: CellKind,
        /// State in the perceived map.
        actual: CellKind,
    },

    /// Building the perceived grid failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
