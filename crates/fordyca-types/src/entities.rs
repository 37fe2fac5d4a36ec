//! Arena entities: blocks, caches and the nest.
//!
//! These are plain data. The ground-truth arena owns the authoritative copies;
//! a robot's perception subsystem holds snapshots taken at the time of the
//! last sighting.

use serde::{Deserialize, Serialize};

use crate::enums::BlockKind;
use crate::geometry::{DiscreteCoord, Vec2};
use crate::ids::{BlockId, CacheId, RobotId};

/// A block that robots forage for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Index in the arena's block table.
    pub id: BlockId,
    /// Physical kind of the block.
    pub kind: BlockKind,
    /// Real-valued position of the block centre.
    pub real_loc: Vec2,
    /// Grid cell the block occupies, or `None` while it is carried
    /// (out of sight).
    pub discrete_loc: Option<DiscreteCoord>,
    /// Number of times the block has been transported.
    pub carries: u32,
    /// Robot currently carrying the block, if any.
    pub robot: Option<RobotId>,
}

impl Block {
    /// Create a free block placed at `real_loc` / `discrete_loc`.
    pub const fn new(
        id: BlockId,
        kind: BlockKind,
        real_loc: Vec2,
        discrete_loc: DiscreteCoord,
    ) -> Self {
        Self {
            id,
            kind,
            real_loc,
            discrete_loc: Some(discrete_loc),
            carries: 0,
            robot: None,
        }
    }

    /// Whether the block has been moved out of sight (it is being carried).
    pub const fn is_out_of_sight(&self) -> bool {
        self.discrete_loc.is_none()
    }

    /// Whether a robot currently holds the block.
    pub const fn is_carried(&self) -> bool {
        self.robot.is_some()
    }

    /// Mark the block as picked up by `robot` and move it out of sight.
    pub const fn pick_up(&mut self, robot: RobotId) {
        self.robot = Some(robot);
        self.discrete_loc = None;
    }

    /// Place the block at a new location, releasing it from any robot and
    /// counting the completed transport.
    pub const fn place(&mut self, real_loc: Vec2, discrete_loc: DiscreteCoord) {
        if self.robot.is_some() {
            self.carries = self.carries.saturating_add(1);
        }
        self.robot = None;
        self.real_loc = real_loc;
        self.discrete_loc = Some(discrete_loc);
    }
}

/// A cache: several blocks aggregated at one discrete location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    /// Index in the arena's cache table.
    pub id: CacheId,
    /// Real-valued position of the cache centre.
    pub real_loc: Vec2,
    /// Grid cell the cache occupies.
    pub discrete_loc: DiscreteCoord,
    /// Blocks currently held, in drop order (oldest first).
    pub blocks: Vec<BlockId>,
    /// Number of blocks picked up from this cache over its lifetime.
    pub n_block_pickups: u32,
    /// Number of blocks dropped into this cache over its lifetime.
    pub n_block_drops: u32,
    /// Tick on which the cache was created.
    pub creation_tick: u64,
}

impl Cache {
    /// Create a cache holding `blocks`.
    pub const fn new(
        id: CacheId,
        real_loc: Vec2,
        discrete_loc: DiscreteCoord,
        blocks: Vec<BlockId>,
        creation_tick: u64,
    ) -> Self {
        Self {
            id,
            real_loc,
            discrete_loc,
            blocks,
            n_block_pickups: 0,
            n_block_drops: 0,
            creation_tick,
        }
    }

    /// Number of blocks currently in the cache.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache holds `block`.
    pub fn contains_block(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// Add a dropped block to the cache.
    pub fn block_add(&mut self, block: BlockId) {
        if !self.contains_block(block) {
            self.blocks.push(block);
            self.n_block_drops = self.n_block_drops.saturating_add(1);
        }
    }

    /// Remove and return the oldest block in the cache.
    pub fn block_take(&mut self) -> Option<BlockId> {
        if self.blocks.is_empty() {
            return None;
        }
        let block = self.blocks.remove(0);
        self.n_block_pickups = self.n_block_pickups.saturating_add(1);
        Some(block)
    }
}

/// The nest: a rectangular region blocks are returned to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nest {
    /// Centre of the nest.
    pub center: Vec2,
    /// Half the nest's width (x) and height (y).
    pub half_extent: Vec2,
}

impl Nest {
    /// Create a nest centred at `center` with the given full dimensions.
    pub fn new(center: Vec2, width: f64, height: f64) -> Self {
        Self {
            center,
            half_extent: Vec2::new(width / 2.0, height / 2.0),
        }
    }

    /// Whether `pos` lies inside the nest.
    pub fn contains(&self, pos: Vec2) -> bool {
        (pos.x - self.center.x).abs() <= self.half_extent.x
            && (pos.y - self.center.y).abs() <= self.half_extent.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block() -> Block {
        Block::new(
            BlockId::new(0),
            BlockKind::Cube,
            Vec2::new(1.0, 1.0),
            DiscreteCoord::new(5, 5),
        )
    }

    #[test]
    fn pickup_moves_block_out_of_sight() {
        let mut block = make_block();
        assert!(!block.is_out_of_sight());
        block.pick_up(RobotId::new(3));
        assert!(block.is_out_of_sight());
        assert_eq!(block.robot, Some(RobotId::new(3)));
    }

    #[test]
    fn place_counts_transport_only_when_carried() {
        let mut block = make_block();
        block.place(Vec2::new(2.0, 2.0), DiscreteCoord::new(10, 10));
        assert_eq!(block.carries, 0);
        block.pick_up(RobotId::new(1));
        block.place(Vec2::new(3.0, 3.0), DiscreteCoord::new(15, 15));
        assert_eq!(block.carries, 1);
        assert!(!block.is_carried());
        assert_eq!(block.discrete_loc, Some(DiscreteCoord::new(15, 15)));
    }

    #[test]
    fn cache_takes_oldest_block_first() {
        let mut cache = Cache::new(
            CacheId::new(0),
            Vec2::new(1.0, 1.0),
            DiscreteCoord::new(5, 5),
            vec![BlockId::new(4), BlockId::new(9)],
            0,
        );
        cache.block_add(BlockId::new(2));
        cache.block_add(BlockId::new(2));
        assert_eq!(cache.n_blocks(), 3);
        assert_eq!(cache.n_block_drops, 1);
        assert_eq!(cache.block_take(), Some(BlockId::new(4)));
        assert_eq!(cache.n_block_pickups, 1);
        assert!(!cache.contains_block(BlockId::new(4)));
    }

    #[test]
    fn nest_containment() {
        let nest = Nest::new(Vec2::new(2.0, 2.0), 1.0, 2.0);
        assert!(nest.contains(Vec2::new(2.4, 2.9)));
        assert!(!nest.contains(Vec2::new(2.6, 2.0)));
        assert!(!nest.contains(Vec2::new(2.0, 3.1)));
    }
}
