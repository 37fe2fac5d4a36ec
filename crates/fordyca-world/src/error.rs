//! Error types for the `fordyca-world` crate.
//!
//! Every variant describes a request that is structurally impossible given
//! the arena's state (a programming error in the caller), not an expected
//! runtime condition.

use fordyca_types::{BlockId, CacheId, DiscreteCoord, RobotId};

/// Errors that can occur during arena operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Arena dimensions or resolution are unusable.
    #[error("invalid arena dimensions: {reason}")]
    InvalidDimensions {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A coordinate lies outside the arena grid.
    #[error("coordinate {0} is outside the arena")]
    OutOfBounds(DiscreteCoord),

    /// A block index does not exist.
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// A cache index does not exist.
    #[error("cache not found: {0}")]
    CacheNotFound(CacheId),

    /// The target cell already holds an entity.
    #[error("cell {0} is already occupied")]
    CellOccupied(DiscreteCoord),

    /// The block is not free (carried or inside a cache).
    #[error("{block} is not a free block")]
    BlockNotFree {
        /// The block that was requested.
        block: BlockId,
    },

    /// The block is not carried by the robot that tried to drop it.
    #[error("{block} is not carried by {robot}")]
    BlockNotCarried {
        /// The block being dropped.
        block: BlockId,
        /// The robot attempting the drop.
        robot: RobotId,
    },

    /// A pickup was attempted from an empty cache.
    #[error("{0} is empty")]
    CacheEmpty(CacheId),

    /// No free cell was available to place an entity.
    #[error("no free cell available near {0}")]
    NoFreeCell(DiscreteCoord),
}
