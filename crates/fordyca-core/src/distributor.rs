//! Uniform random block distribution.
//!
//! Blocks are placed on the centre of a uniformly chosen free cell that is
//! outside the nest and clear of the walls' sensing band. The same rule
//! seeds the arena at startup and re-places every block a robot delivers
//! to the nest, so the number of blocks on the ground stays constant.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use fordyca_types::{BlockId, BlockKind, DiscreteCoord};
use fordyca_world::{ArenaMap, WorldError};

/// Errors that can occur while distributing blocks.
#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    /// Every candidate cell is taken.
    #[error("no free cell left to place a block")]
    NoFreeCell,

    /// The arena rejected a placement.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}

/// Places blocks at random free cells.
#[derive(Debug, Clone)]
pub struct BlockDistributor {
    rng: SmallRng,
    margin: f64,
}

impl BlockDistributor {
    /// A distributor keeping blocks at least `margin` metres from the walls.
    pub fn new(seed: u64, margin: f64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            margin: margin.max(0.0),
        }
    }

    /// Create `n_blocks` new blocks, a `ramp_fraction` share of them ramps.
    ///
    /// # Errors
    ///
    /// Returns [`DistributeError::NoFreeCell`] if the arena fills up first.
    pub fn distribute(
        &mut self,
        arena: &mut ArenaMap,
        n_blocks: usize,
        ramp_fraction: f64,
    ) -> Result<Vec<BlockId>, DistributeError> {
        let mut ids = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            let kind = if self.rng.random_bool(ramp_fraction.clamp(0.0, 1.0)) {
                BlockKind::Ramp
            } else {
                BlockKind::Cube
            };
            let coord = self.pick_cell(arena)?;
            let id = arena.add_block(kind, coord.to_real(arena.resolution()))?;
            ids.push(id);
        }
        debug!(count = ids.len(), "Blocks distributed");
        Ok(ids)
    }

    /// Put a block that was delivered to the nest back on the ground.
    ///
    /// # Errors
    ///
    /// Returns [`DistributeError::NoFreeCell`] if no candidate cell is left,
    /// or a world error if the block is not out of sight.
    pub fn redistribute(
        &mut self,
        arena: &mut ArenaMap,
        block: BlockId,
    ) -> Result<DiscreteCoord, DistributeError> {
        let coord = self.pick_cell(arena)?;
        arena.place_block(block, coord.to_real(arena.resolution()))?;
        debug!(block = %block, coord = %coord, "Block redistributed");
        Ok(coord)
    }

    fn pick_cell(&mut self, arena: &ArenaMap) -> Result<DiscreteCoord, DistributeError> {
        let candidates = self.candidates(arena);
        if candidates.is_empty() {
            return Err(DistributeError::NoFreeCell);
        }
        let index = self.rng.random_range(0..candidates.len());
        candidates
            .get(index)
            .copied()
            .ok_or(DistributeError::NoFreeCell)
    }

    fn candidates(&self, arena: &ArenaMap) -> Vec<DiscreteCoord> {
        let params = arena.params();
        let res = params.resolution;
        arena
            .grid()
            .iter()
            .map(|cell| cell.coord)
            .filter(|&coord| {
                let p = coord.to_real(res);
                p.x >= self.margin
                    && p.y >= self.margin
                    && params.width - p.x >= self.margin
                    && params.height - p.y >= self.margin
                    && arena.is_free(coord)
            })
            .collect()
    }
}
