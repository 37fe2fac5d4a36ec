//! The ground-truth arena map.
//!
//! [`ArenaMap`] owns every block and cache in the simulation along with a
//! dense grid of [`Cell`]s that mirrors where they are. It is mutated only by
//! the simulation loop, once per tick and sequentially, in response to robot
//! pickups and drops. Robots read it through [`LineOfSight`] windows.
//!
//! Blocks are stored in a `Vec` indexed by [`BlockId`]; blocks are never
//! destroyed, only moved out of sight while carried and placed again when
//! dropped. Caches live in a `BTreeMap` keyed by [`CacheId`] and are removed
//! when they dissolve, so cache IDs are never reused.
//!
//! # Cache lifecycle
//!
//! - Created by [`ArenaMap::create_static_cache`] (a fixed location, used by
//!   depth-1 experiments) or [`ArenaMap::create_dynamic_caches`] (clusters of
//!   nearby free blocks).
//! - Dissolved as soon as a pickup leaves fewer than `cache_min_blocks`
//!   blocks in it; the remaining blocks become free blocks around the former
//!   cache location.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fordyca_types::{
    Block, BlockId, BlockKind, Cache, CacheId, DiscreteCoord, EntityRef, Nest, RobotId, Vec2,
};

use crate::cell::{Cell, CellEvent};
use crate::error::WorldError;
use crate::grid::Grid2D;
use crate::los::LineOfSight;

/// Parameters of a statically placed cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticCacheParams {
    /// Where the cache is (re-)created.
    pub center: Vec2,
    /// Number of blocks the cache is created with.
    pub size: usize,
}

/// Geometry and cache parameters of the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaParams {
    /// Arena width in metres.
    pub width: f64,
    /// Arena height in metres.
    pub height: f64,
    /// Metres per grid cell.
    pub resolution: f64,
    /// The nest.
    pub nest: Nest,
    /// Minimum number of blocks a cache may hold.
    pub cache_min_blocks: usize,
    /// Maximum distance between blocks merged by the dynamic cache pass.
    pub cache_dimension: f64,
    /// Static cache location and size, if the arena has one.
    pub static_cache: Option<StaticCacheParams>,
}

impl Default for ArenaParams {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 10.0,
            resolution: 0.2,
            nest: Nest::new(Vec2::new(2.0, 5.0), 2.0, 2.0),
            cache_min_blocks: 2,
            cache_dimension: 0.6,
            static_cache: None,
        }
    }
}

/// Outcome of taking a block out of a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePickup {
    /// The block that was taken.
    pub block: BlockId,
    /// Whether the pickup dissolved the cache.
    pub dissolved: bool,
}

/// The authoritative arena: grid, blocks, caches and nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaMap {
    params: ArenaParams,
    grid: Grid2D<Cell>,
    blocks: Vec<Block>,
    caches: BTreeMap<CacheId, Cache>,
    /// Which cache, if any, each cached block is in.
    cached_blocks: BTreeMap<BlockId, CacheId>,
    next_cache_id: u32,
}

impl ArenaMap {
    /// Create an empty arena.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if the dimensions or the
    /// resolution are not positive and finite, or if the cache minimum is
    /// below 2.
    pub fn new(params: ArenaParams) -> Result<Self, WorldError> {
        let (width, height) = grid_dimensions(&params)?;
        if params.cache_min_blocks < 2 {
            return Err(WorldError::InvalidDimensions {
                reason: "cache_min_blocks must be at least 2".to_owned(),
            });
        }
        info!(
            width = params.width,
            height = params.height,
            resolution = params.resolution,
            grid_width = width,
            grid_height = height,
            "Arena created"
        );
        Ok(Self {
            params,
            grid: Grid2D::new(width, height, Cell::empty),
            blocks: Vec::new(),
            caches: BTreeMap::new(),
            cached_blocks: BTreeMap::new(),
            next_cache_id: 0,
        })
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Arena parameters.
    pub const fn params(&self) -> &ArenaParams {
        &self.params
    }

    /// Metres per grid cell.
    pub const fn resolution(&self) -> f64 {
        self.params.resolution
    }

    /// The nest.
    pub const fn nest(&self) -> &Nest {
        &self.params.nest
    }

    /// Grid width in cells.
    pub const fn grid_width(&self) -> u32 {
        self.grid.width()
    }

    /// Grid height in cells.
    pub const fn grid_height(&self) -> u32 {
        self.grid.height()
    }

    /// The underlying cell grid.
    pub const fn grid(&self) -> &Grid2D<Cell> {
        &self.grid
    }

    /// The cell at `coord`.
    pub fn cell(&self, coord: DiscreteCoord) -> Option<&Cell> {
        self.grid.get(coord)
    }

    /// Map a real position onto the arena grid.
    pub fn discretize(&self, pos: Vec2) -> DiscreteCoord {
        DiscreteCoord::from_real(pos, self.params.resolution)
    }

    /// Whether `pos` lies inside the arena.
    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x < self.params.width && pos.y < self.params.height
    }

    /// Whether a block may be placed at `coord`: the cell exists, is empty,
    /// and is not inside the nest.
    pub fn is_free(&self, coord: DiscreteCoord) -> bool {
        self.grid.get(coord).is_some_and(Cell::is_empty)
            && !self.params.nest.contains(coord.to_real(self.params.resolution))
    }

    /// All blocks, indexed by ID.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.as_usize())
    }

    /// Blocks that are on the ground: neither carried nor inside a cache.
    pub fn free_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| {
            !b.is_carried() && !b.is_out_of_sight() && !self.cached_blocks.contains_key(&b.id)
        })
    }

    /// The cache holding `block`, if any.
    pub fn cache_of(&self, block: BlockId) -> Option<CacheId> {
        self.cached_blocks.get(&block).copied()
    }

    /// All live caches in ID order.
    pub fn caches(&self) -> impl Iterator<Item = &Cache> {
        self.caches.values()
    }

    /// Look up a cache.
    pub fn cache(&self, id: CacheId) -> Option<&Cache> {
        self.caches.get(&id)
    }

    /// Number of live caches.
    pub fn n_caches(&self) -> usize {
        self.caches.len()
    }

    /// A read-only window of `radius` cells around `center`.
    pub fn los(&self, center: DiscreteCoord, radius: u32) -> LineOfSight<'_> {
        LineOfSight::new(self, center, radius)
    }

    // -------------------------------------------------------------------
    // Block operations
    // -------------------------------------------------------------------

    /// Create a new free block at `real_loc`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] if the position is outside the
    /// grid, or [`WorldError::CellOccupied`] if the cell is not empty.
    pub fn add_block(&mut self, kind: BlockKind, real_loc: Vec2) -> Result<BlockId, WorldError> {
        let coord = self.discretize(real_loc);
        self.require_empty(coord)?;
        let index = u32::try_from(self.blocks.len()).map_err(|_err| {
            WorldError::InvalidDimensions {
                reason: "block table exceeds u32 range".to_owned(),
            }
        })?;
        let id = BlockId::new(index);
        self.blocks.push(Block::new(id, kind, real_loc, coord));
        self.set_cell(coord, CellEvent::Found(EntityRef::Block(id)))?;
        Ok(id)
    }

    /// Place a carried block back on the ground at `real_loc`.
    ///
    /// This is how a distributor re-places a block after a nest drop.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BlockNotFound`] for an unknown block,
    /// [`WorldError::BlockNotFree`] if the block is not out of sight, or a
    /// placement error if the target cell is unusable.
    pub fn place_block(&mut self, id: BlockId, real_loc: Vec2) -> Result<(), WorldError> {
        let coord = self.discretize(real_loc);
        let block = self.block(id).ok_or(WorldError::BlockNotFound(id))?;
        if !block.is_out_of_sight() {
            return Err(WorldError::BlockNotFree { block: id });
        }
        self.require_empty(coord)?;
        self.block_mut(id)?.place(real_loc, coord);
        self.set_cell(coord, CellEvent::Found(EntityRef::Block(id)))?;
        debug!(block = %id, coord = %coord, "Block placed");
        Ok(())
    }

    /// A robot picks up a free block.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BlockNotFound`] or [`WorldError::BlockNotFree`].
    pub fn pickup_free_block(&mut self, robot: RobotId, id: BlockId) -> Result<(), WorldError> {
        let block = self.block(id).ok_or(WorldError::BlockNotFound(id))?;
        let coord = match block.discrete_loc {
            Some(coord) if !block.is_carried() && !self.cached_blocks.contains_key(&id) => coord,
            _ => return Err(WorldError::BlockNotFree { block: id }),
        };
        self.set_cell(coord, CellEvent::Empty)?;
        self.block_mut(id)?.pick_up(robot);
        debug!(robot = %robot, block = %id, coord = %coord, "Free block picked up");
        Ok(())
    }

    /// A robot takes the oldest block out of a cache. Dissolves the cache if
    /// fewer than `cache_min_blocks` blocks remain.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CacheNotFound`] or [`WorldError::CacheEmpty`].
    pub fn pickup_from_cache(
        &mut self,
        robot: RobotId,
        cache_id: CacheId,
    ) -> Result<CachePickup, WorldError> {
        let cache = self
            .caches
            .get_mut(&cache_id)
            .ok_or(WorldError::CacheNotFound(cache_id))?;
        let block = cache.block_take().ok_or(WorldError::CacheEmpty(cache_id))?;
        let remaining = cache.n_blocks();
        self.cached_blocks.remove(&block);
        self.block_mut(block)?.pick_up(robot);
        debug!(robot = %robot, cache = %cache_id, block = %block, remaining, "Cached block picked up");

        let dissolved = remaining < self.params.cache_min_blocks;
        if dissolved {
            self.dissolve_cache(cache_id)?;
        }
        Ok(CachePickup { block, dissolved })
    }

    /// A robot drops the block it carries into a cache.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BlockNotCarried`] if `robot` is not carrying the
    /// block, or a lookup error for unknown IDs.
    pub fn drop_in_cache(
        &mut self,
        robot: RobotId,
        block_id: BlockId,
        cache_id: CacheId,
    ) -> Result<(), WorldError> {
        let block = self.block(block_id).ok_or(WorldError::BlockNotFound(block_id))?;
        if block.robot != Some(robot) {
            return Err(WorldError::BlockNotCarried {
                block: block_id,
                robot,
            });
        }
        let cache = self
            .caches
            .get_mut(&cache_id)
            .ok_or(WorldError::CacheNotFound(cache_id))?;
        cache.block_add(block_id);
        let (loc, coord) = (cache.real_loc, cache.discrete_loc);
        self.cached_blocks.insert(block_id, cache_id);
        self.block_mut(block_id)?.place(loc, coord);
        debug!(robot = %robot, cache = %cache_id, block = %block_id, "Block dropped in cache");
        Ok(())
    }

    /// Release the block a robot carries into the nest: the block stays out
    /// of sight until a distributor places it again.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::BlockNotCarried`] if `robot` does not hold it.
    pub fn drop_in_nest(&mut self, robot: RobotId, block_id: BlockId) -> Result<(), WorldError> {
        let block = self.block_mut(block_id)?;
        if block.robot != Some(robot) {
            return Err(WorldError::BlockNotCarried {
                block: block_id,
                robot,
            });
        }
        block.robot = None;
        block.carries = block.carries.saturating_add(1);
        debug!(robot = %robot, block = %block_id, "Block dropped in nest");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Cache operations
    // -------------------------------------------------------------------

    /// (Re-)create the static cache if the arena has one and no cache
    /// currently occupies its cell.
    ///
    /// The cache is built from the free blocks closest to its centre. Returns
    /// `Ok(None)` when there is nothing to do or too few free blocks exist.
    ///
    /// # Errors
    ///
    /// Returns a [`WorldError`] if the cache cell is outside the arena.
    pub fn create_static_cache(&mut self, tick: u64) -> Result<Option<CacheId>, WorldError> {
        let Some(params) = self.params.static_cache else {
            return Ok(None);
        };
        let coord = self.discretize(params.center);
        let cell = self.cell(coord).ok_or(WorldError::OutOfBounds(coord))?;
        if cell.has_cache() {
            return Ok(None);
        }

        let target = params.size.max(self.params.cache_min_blocks);
        let mut candidates: Vec<(f64, BlockId)> = self
            .free_blocks()
            .map(|b| (b.real_loc.distance(params.center), b.id))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut chosen: Vec<BlockId> = candidates.iter().take(target).map(|c| c.1).collect();

        // A free block already sitting on the cache cell must join the cache.
        if let Some(occupant) = cell.block() {
            if !chosen.contains(&occupant) {
                if chosen.len() >= target {
                    chosen.pop();
                }
                chosen.insert(0, occupant);
            }
        }
        if chosen.len() < self.params.cache_min_blocks {
            debug!(available = chosen.len(), "Not enough free blocks for static cache");
            return Ok(None);
        }
        let id = self.make_cache(&chosen, params.center, coord, tick)?;
        Ok(Some(id))
    }

    /// Merge clusters of nearby free blocks into caches.
    ///
    /// Seeds are visited in block-ID order; each seed collects every
    /// unassigned free block within `cache_dimension` of it, and clusters of
    /// at least `cache_min_blocks` become a cache at their centroid.
    ///
    /// # Errors
    ///
    /// Propagates placement errors from cache construction.
    pub fn create_dynamic_caches(&mut self, tick: u64) -> Result<Vec<CacheId>, WorldError> {
        let free: Vec<(BlockId, Vec2, DiscreteCoord)> = self
            .free_blocks()
            .filter_map(|b| b.discrete_loc.map(|c| (b.id, b.real_loc, c)))
            .collect();
        let mut assigned: BTreeSet<BlockId> = BTreeSet::new();
        let mut created = Vec::new();

        for &(seed, seed_loc, seed_coord) in &free {
            if assigned.contains(&seed) {
                continue;
            }
            let cluster: Vec<(BlockId, Vec2)> = free
                .iter()
                .filter(|(id, loc, _)| {
                    !assigned.contains(id) && loc.distance(seed_loc) <= self.params.cache_dimension
                })
                .map(|&(id, loc, _)| (id, loc))
                .collect();
            if cluster.len() < self.params.cache_min_blocks {
                continue;
            }

            let centroid = centroid(cluster.iter().map(|c| c.1));
            let ids: Vec<BlockId> = cluster.iter().map(|c| c.0).collect();
            let mut coord = self.discretize(centroid);
            let mut loc = centroid;
            let usable = self
                .cell(coord)
                .is_some_and(|c| c.is_empty() || c.block().is_some_and(|b| ids.contains(&b)));
            if !usable {
                coord = seed_coord;
                loc = seed_loc;
            }
            let id = self.make_cache(&ids, loc, coord, tick)?;
            assigned.extend(ids);
            created.push(id);
        }
        Ok(created)
    }

    /// Remove a cache from the arena, scattering its remaining blocks as free
    /// blocks: the first on the cache cell, the rest on the nearest free
    /// cells.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CacheNotFound`] or [`WorldError::NoFreeCell`].
    pub fn dissolve_cache(&mut self, cache_id: CacheId) -> Result<Vec<BlockId>, WorldError> {
        let cache = self
            .caches
            .remove(&cache_id)
            .ok_or(WorldError::CacheNotFound(cache_id))?;
        self.set_cell(cache.discrete_loc, CellEvent::Empty)?;

        for (i, &block) in cache.blocks.iter().enumerate() {
            self.cached_blocks.remove(&block);
            let (coord, loc) = if i == 0 {
                (cache.discrete_loc, cache.real_loc)
            } else {
                let c = self
                    .nearest_free_cell(cache.discrete_loc)
                    .ok_or(WorldError::NoFreeCell(cache.discrete_loc))?;
                (c, c.to_real(self.params.resolution))
            };
            let b = self.block_mut(block)?;
            b.real_loc = loc;
            b.discrete_loc = Some(coord);
            self.set_cell(coord, CellEvent::Found(EntityRef::Block(block)))?;
        }
        info!(cache = %cache_id, freed = cache.blocks.len(), "Cache dissolved");
        Ok(cache.blocks)
    }

    /// The free cell closest (Chebyshev distance, then row-major order) to
    /// `coord`.
    pub fn nearest_free_cell(&self, coord: DiscreteCoord) -> Option<DiscreteCoord> {
        let max_radius = self.grid.width().max(self.grid.height());
        (0..=max_radius).find_map(|r| {
            self.grid
                .window(coord, r)
                .filter(|c| c.chebyshev(coord) == r)
                .find(|&c| self.is_free(c))
        })
    }

    /// Check that every free block and every cache is reflected by the cell
    /// it occupies.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellOccupied`] naming the first inconsistent
    /// cell.
    pub fn check_consistency(&self) -> Result<(), WorldError> {
        for block in self.free_blocks() {
            if let Some(coord) = block.discrete_loc {
                if self.cell(coord).and_then(Cell::block) != Some(block.id) {
                    return Err(WorldError::CellOccupied(coord));
                }
            }
        }
        for cache in self.caches.values() {
            if self.cell(cache.discrete_loc).and_then(Cell::cache) != Some(cache.id) {
                return Err(WorldError::CellOccupied(cache.discrete_loc));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, WorldError> {
        self.blocks
            .get_mut(id.as_usize())
            .ok_or(WorldError::BlockNotFound(id))
    }

    fn require_empty(&self, coord: DiscreteCoord) -> Result<(), WorldError> {
        let cell = self.cell(coord).ok_or(WorldError::OutOfBounds(coord))?;
        if cell.is_empty() {
            Ok(())
        } else {
            Err(WorldError::CellOccupied(coord))
        }
    }

    fn set_cell(&mut self, coord: DiscreteCoord, event: CellEvent) -> Result<(), WorldError> {
        self.grid
            .get_mut(coord)
            .ok_or(WorldError::OutOfBounds(coord))?
            .apply(event);
        Ok(())
    }

    fn make_cache(
        &mut self,
        blocks: &[BlockId],
        real_loc: Vec2,
        coord: DiscreteCoord,
        tick: u64,
    ) -> Result<CacheId, WorldError> {
        // Nothing is touched until the target cell and every block check out.
        let target = self.cell(coord).ok_or(WorldError::OutOfBounds(coord))?;
        if !(target.is_empty() || target.block().is_some_and(|b| blocks.contains(&b))) {
            return Err(WorldError::CellOccupied(coord));
        }
        for &block in blocks {
            let b = self.block(block).ok_or(WorldError::BlockNotFound(block))?;
            if b.is_carried() || self.cached_blocks.contains_key(&block) {
                return Err(WorldError::BlockNotFree { block });
            }
        }

        for &block in blocks {
            if let Some(old) = self.block(block).and_then(|b| b.discrete_loc) {
                self.set_cell(old, CellEvent::Empty)?;
            }
        }

        let id = CacheId::new(self.next_cache_id);
        self.next_cache_id = self.next_cache_id.saturating_add(1);
        for &block in blocks {
            let b = self.block_mut(block)?;
            b.real_loc = real_loc;
            b.discrete_loc = Some(coord);
            self.cached_blocks.insert(block, id);
        }
        self.caches
            .insert(id, Cache::new(id, real_loc, coord, blocks.to_vec(), tick));
        self.set_cell(coord, CellEvent::Found(EntityRef::Cache(id)))?;
        info!(cache = %id, coord = %coord, n_blocks = blocks.len(), tick, "Cache created");
        Ok(id)
    }
}

/// Compute the grid dimensions for the given parameters.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_dimensions(params: &ArenaParams) -> Result<(u32, u32), WorldError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(params.width) || !valid(params.height) || !valid(params.resolution) {
        return Err(WorldError::InvalidDimensions {
            reason: format!(
                "width {}, height {} and resolution {} must be positive",
                params.width, params.height, params.resolution
            ),
        });
    }
    let cells = |extent: f64| -> Result<u32, WorldError> {
        let n = (extent / params.resolution).ceil();
        if n > f64::from(u32::MAX) {
            return Err(WorldError::InvalidDimensions {
                reason: "grid exceeds u32 cells per axis".to_owned(),
            });
        }
        Ok(n as u32)
    };
    Ok((cells(params.width)?, cells(params.height)?))
}

/// Mean of a set of positions (zero for an empty set).
fn centroid(points: impl Iterator<Item = Vec2>) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut n: u32 = 0;
    for p in points {
        sum += p;
        n = n.saturating_add(1);
    }
    if n == 0 {
        Vec2::ZERO
    } else {
        sum * (1.0 / f64::from(n))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_arena() -> ArenaMap {
        ArenaMap::new(ArenaParams::default()).unwrap()
    }

    #[test]
    fn rejects_bad_dimensions() {
        let params = ArenaParams {
            resolution: 0.0,
            ..ArenaParams::default()
        };
        assert!(matches!(
            ArenaMap::new(params),
            Err(WorldError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn grid_covers_arena() {
        let arena = make_arena();
        assert_eq!(arena.grid_width(), 50);
        assert_eq!(arena.grid_height(), 50);
    }

    #[test]
    fn failed_cache_creation_leaves_arena_untouched() {
        let mut arena = make_arena();
        let a = arena.add_block(BlockKind::Cube, Vec2::new(3.1, 3.1)).unwrap();
        let b = arena.add_block(BlockKind::Ramp, Vec2::new(3.3, 3.1)).unwrap();
        let blocker = arena.add_block(BlockKind::Cube, Vec2::new(5.1, 5.1)).unwrap();
        let blocked = arena.discretize(Vec2::new(5.1, 5.1));
        let before = arena.blocks().to_vec();

        let err = arena
            .make_cache(&[a, b], Vec2::new(5.1, 5.1), blocked, 7)
            .unwrap_err();
        assert!(matches!(err, WorldError::CellOccupied(c) if c == blocked));
        assert_eq!(arena.blocks(), before.as_slice());
        assert_eq!(arena.n_caches(), 0);
        for id in [a, b, blocker] {
            let coord = arena.block(id).and_then(|blk| blk.discrete_loc).unwrap();
            assert_eq!(arena.cell(coord).and_then(Cell::block), Some(id));
        }
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn cache_may_form_on_a_member_cell() {
        let mut arena = make_arena();
        let a = arena.add_block(BlockKind::Cube, Vec2::new(3.1, 3.1)).unwrap();
        let b = arena.add_block(BlockKind::Cube, Vec2::new(3.3, 3.1)).unwrap();
        let coord = arena.discretize(Vec2::new(3.1, 3.1));

        let id = arena.make_cache(&[a, b], Vec2::new(3.1, 3.1), coord, 1).unwrap();
        assert_eq!(arena.cell(coord).and_then(Cell::cache), Some(id));
        assert!(arena.cell(arena.discretize(Vec2::new(3.3, 3.1))).unwrap().is_empty());
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn add_block_marks_cell() {
        let mut arena = make_arena();
        let id = arena.add_block(BlockKind::Cube, Vec2::new(6.1, 6.1)).unwrap();
        let coord = arena.discretize(Vec2::new(6.1, 6.1));
        assert_eq!(arena.cell(coord).and_then(Cell::block), Some(id));
        assert!(matches!(
            arena.add_block(BlockKind::Cube, Vec2::new(6.15, 6.15)),
            Err(WorldError::CellOccupied(_))
        ));
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn pickup_and_place_roundtrip() {
        let mut arena = make_arena();
        let robot = RobotId::new(0);
        let id = arena.add_block(BlockKind::Cube, Vec2::new(7.0, 7.0)).unwrap();
        arena.pickup_free_block(robot, id).unwrap();
        assert!(arena.block(id).unwrap().is_out_of_sight());
        assert_eq!(arena.free_blocks().count(), 0);
        assert!(matches!(
            arena.pickup_free_block(robot, id),
            Err(WorldError::BlockNotFree { .. })
        ));

        arena.drop_in_nest(robot, id).unwrap();
        arena.place_block(id, Vec2::new(8.0, 8.0)).unwrap();
        let block = arena.block(id).unwrap();
        assert_eq!(block.carries, 1);
        assert_eq!(arena.free_blocks().count(), 1);
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn drop_in_nest_requires_carrier() {
        let mut arena = make_arena();
        let id = arena.add_block(BlockKind::Cube, Vec2::new(7.0, 7.0)).unwrap();
        arena.pickup_free_block(RobotId::new(1), id).unwrap();
        assert!(matches!(
            arena.drop_in_nest(RobotId::new(2), id),
            Err(WorldError::BlockNotCarried { .. })
        ));
    }

    #[test]
    fn static_cache_uses_closest_blocks() {
        let params = ArenaParams {
            static_cache: Some(StaticCacheParams {
                center: Vec2::new(5.0, 5.0),
                size: 2,
            }),
            ..ArenaParams::default()
        };
        let mut arena = ArenaMap::new(params).unwrap();
        let near_a = arena.add_block(BlockKind::Cube, Vec2::new(5.5, 5.1)).unwrap();
        let far = arena.add_block(BlockKind::Cube, Vec2::new(9.0, 9.0)).unwrap();
        let near_b = arena.add_block(BlockKind::Ramp, Vec2::new(4.5, 5.1)).unwrap();

        let cache = arena.create_static_cache(3).unwrap().unwrap();
        let c = arena.cache(cache).unwrap();
        assert_eq!(c.n_blocks(), 2);
        assert!(c.contains_block(near_a));
        assert!(c.contains_block(near_b));
        assert_eq!(c.creation_tick, 3);
        assert_eq!(arena.free_blocks().map(|b| b.id).collect::<Vec<_>>(), vec![far]);
        assert!(arena.check_consistency().is_ok());

        // Already present: no second cache.
        assert!(arena.create_static_cache(4).unwrap().is_none());
    }

    #[test]
    fn cache_pickup_below_minimum_dissolves() {
        let params = ArenaParams {
            static_cache: Some(StaticCacheParams {
                center: Vec2::new(5.0, 5.0),
                size: 3,
            }),
            ..ArenaParams::default()
        };
        let mut arena = ArenaMap::new(params).unwrap();
        for x in [4.0, 5.5, 6.0] {
            arena.add_block(BlockKind::Cube, Vec2::new(x, 5.0)).unwrap();
        }
        let cache = arena.create_static_cache(0).unwrap().unwrap();
        let robot = RobotId::new(0);

        let first = arena.pickup_from_cache(robot, cache).unwrap();
        assert!(!first.dissolved);
        assert_eq!(arena.cache(cache).unwrap().n_blocks(), 2);

        let second = arena.pickup_from_cache(robot, cache).unwrap();
        assert!(second.dissolved);
        assert!(arena.cache(cache).is_none());
        assert_eq!(arena.n_caches(), 0);
        // The last block is now a free block on the old cache cell.
        let coord = arena.discretize(Vec2::new(5.0, 5.0));
        assert!(arena.cell(coord).unwrap().has_block());
        assert_eq!(arena.free_blocks().count(), 1);
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn drop_in_cache_adds_block() {
        let params = ArenaParams {
            static_cache: Some(StaticCacheParams {
                center: Vec2::new(5.0, 5.0),
                size: 2,
            }),
            ..ArenaParams::default()
        };
        let mut arena = ArenaMap::new(params).unwrap();
        arena.add_block(BlockKind::Cube, Vec2::new(5.5, 5.0)).unwrap();
        arena.add_block(BlockKind::Cube, Vec2::new(4.5, 5.0)).unwrap();
        let extra = arena.add_block(BlockKind::Cube, Vec2::new(8.0, 8.0)).unwrap();
        let cache = arena.create_static_cache(0).unwrap().unwrap();

        let robot = RobotId::new(4);
        arena.pickup_free_block(robot, extra).unwrap();
        arena.drop_in_cache(robot, extra, cache).unwrap();
        assert_eq!(arena.cache(cache).unwrap().n_blocks(), 3);
        assert_eq!(arena.cache_of(extra), Some(cache));
        assert_eq!(arena.block(extra).unwrap().carries, 1);
    }

    #[test]
    fn dynamic_caches_cluster_nearby_blocks() {
        let mut arena = make_arena();
        arena.add_block(BlockKind::Cube, Vec2::new(7.0, 7.0)).unwrap();
        arena.add_block(BlockKind::Cube, Vec2::new(7.3, 7.0)).unwrap();
        arena.add_block(BlockKind::Cube, Vec2::new(9.5, 1.0)).unwrap();

        let created = arena.create_dynamic_caches(10).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(arena.free_blocks().count(), 1);
        assert!(arena.check_consistency().is_ok());
    }

    #[test]
    fn nearest_free_cell_skips_occupied() {
        let mut arena = make_arena();
        let loc = Vec2::new(7.1, 7.1);
        arena.add_block(BlockKind::Cube, loc).unwrap();
        let coord = arena.discretize(loc);
        let free = arena.nearest_free_cell(coord).unwrap();
        assert_eq!(free.chebyshev(coord), 1);
    }
}
