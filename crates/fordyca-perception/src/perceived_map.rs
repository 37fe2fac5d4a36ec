//! The perceived arena map: one robot's decaying belief about the arena.
//!
//! The map is a dense grid of [`PerceivedCell`]s, each a [`Cell`] paired
//! with a [`PheromoneDensity`], plus snapshots of the blocks and caches the
//! robot believes exist. Cells and snapshots are kept in step: a snapshot is
//! present iff the cell at its location names it.
//!
//! All mutations go through [`PerceivedArenaMap::apply`], which dispatches
//! over [`MapEvent`]. Decay runs once per tick in
//! [`PerceivedArenaMap::update`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use fordyca_types::{Block, BlockId, Cache, CacheId, DiscreteCoord, EntityRef, RobotId};
use fordyca_world::{ArenaMap, Cell, CellEvent, CellKind, CellState, Grid2D, WorldError};

use crate::error::PerceptionError;
use crate::pheromone::PheromoneDensity;

/// Perception tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptionParams {
    /// Per-tick decay factor, in `(0, 1]`.
    pub rho: f64,
    /// Whether repeated sightings may push density above 1.0.
    pub repeat_deposit: bool,
    /// Run the post-fusion consistency check in release builds too.
    pub verify_fusion: bool,
}

impl Default for PerceptionParams {
    fn default() -> Self {
        Self {
            rho: 0.99,
            repeat_deposit: false,
            verify_fusion: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Perceived cell
// ---------------------------------------------------------------------------

/// A cell of the perceived map together with its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceivedCell {
    cell: Cell,
    density: PheromoneDensity,
}

impl PerceivedCell {
    /// An unknown cell with zero density.
    pub const fn new(coord: DiscreteCoord) -> Self {
        Self {
            cell: Cell::unknown(coord),
            density: PheromoneDensity::new(),
        }
    }

    /// The underlying cell.
    pub const fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Grid coordinate.
    pub const fn coord(&self) -> DiscreteCoord {
        self.cell.coord
    }

    /// Current pheromone density.
    pub const fn density(&self) -> PheromoneDensity {
        self.density
    }

    /// Occupancy state.
    pub const fn state(&self) -> CellState {
        self.cell.state()
    }

    /// Occupancy discriminant.
    pub const fn kind(&self) -> CellKind {
        self.cell.kind()
    }

    /// Whether anything is believed about the cell.
    pub const fn is_known(&self) -> bool {
        self.cell.is_known()
    }

    /// The block believed to be here.
    pub const fn block(&self) -> Option<BlockId> {
        self.cell.block()
    }

    /// The cache believed to be here.
    pub const fn cache(&self) -> Option<CacheId> {
        self.cell.cache()
    }

    /// Apply a cell event. `Found` and `Empty` deposit pheromone; `Unknown`
    /// clears the density. Returns whether the occupancy state changed.
    pub fn apply(&mut self, event: CellEvent, repeat_deposit: bool) -> bool {
        match event {
            CellEvent::Found(_) | CellEvent::Empty => self.density.deposit(repeat_deposit),
            CellEvent::Unknown => self.density.reset(),
        }
        self.cell.apply(event)
    }

    /// Decay one tick. Returns the entity that was forgotten if the cell
    /// dropped below the relevance threshold while holding one.
    fn decay(&mut self, rho: f64) -> Option<Forgotten> {
        if !self.cell.is_known() {
            return None;
        }
        self.density.decay(rho);
        if self.density.is_relevant() {
            return None;
        }
        let entity = self.cell.entity();
        self.apply(CellEvent::Unknown, false);
        Some(Forgotten(entity))
    }
}

/// A cell that decayed to unknown, with the entity it held.
struct Forgotten(Option<EntityRef>);

/// An entity snapshot paired with the density of the cell it occupies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceivedEntity<'a, T> {
    /// The believed entity.
    pub ent: &'a T,
    /// Density of its cell at the time of the query.
    pub density: f64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events that mutate a perceived map.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// A block was sighted at its current location.
    BlockFound(Block),
    /// A cache was sighted; its block list replaces the stored one.
    CacheFound(Cache),
    /// A block is no longer where it was believed to be.
    BlockRemoved(BlockId),
    /// A cache is no longer where it was believed to be.
    CacheRemoved(CacheId),
    /// A cell was observed to be empty.
    CellEmpty(DiscreteCoord),
    /// This robot picked up a free block.
    BlockPickedUp(BlockId),
    /// This robot took a block from a cache.
    CachedBlockPickedUp {
        /// The cache.
        cache: CacheId,
        /// The block taken.
        block: BlockId,
        /// Whether the pickup dissolved the cache.
        dissolved: bool,
    },
    /// This robot dropped a block into a cache.
    CacheBlockDropped {
        /// The cache.
        cache: CacheId,
        /// The block dropped.
        block: BlockId,
    },
}

// ---------------------------------------------------------------------------
// Perceived arena map
// ---------------------------------------------------------------------------

/// One robot's belief about the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceivedArenaMap {
    robot: RobotId,
    params: PerceptionParams,
    resolution: f64,
    grid: Grid2D<PerceivedCell>,
    blocks: BTreeMap<BlockId, Block>,
    caches: BTreeMap<CacheId, Cache>,
}

impl PerceivedArenaMap {
    /// Create an all-unknown map of `width x height` cells.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::InvalidRho`] if `rho` is outside `(0, 1]`,
    /// or a world error for an empty grid.
    pub fn new(
        robot: RobotId,
        width: u32,
        height: u32,
        resolution: f64,
        params: PerceptionParams,
    ) -> Result<Self, PerceptionError> {
        if !(params.rho > 0.0 && params.rho <= 1.0) {
            return Err(PerceptionError::InvalidRho(params.rho));
        }
        if width == 0 || height == 0 {
            return Err(WorldError::InvalidDimensions {
                reason: format!("perceived map must be non-empty, got {width}x{height}"),
            }
            .into());
        }
        Ok(Self {
            robot,
            params,
            resolution,
            grid: Grid2D::new(width, height, PerceivedCell::new),
            blocks: BTreeMap::new(),
            caches: BTreeMap::new(),
        })
    }

    /// Create a map sized to match `arena`.
    ///
    /// # Errors
    ///
    /// See [`PerceivedArenaMap::new`].
    pub fn for_arena(
        robot: RobotId,
        arena: &ArenaMap,
        params: PerceptionParams,
    ) -> Result<Self, PerceptionError> {
        Self::new(
            robot,
            arena.grid_width(),
            arena.grid_height(),
            arena.resolution(),
            params,
        )
    }

    /// The robot owning this map.
    pub const fn robot(&self) -> RobotId {
        self.robot
    }

    /// Perception parameters.
    pub const fn params(&self) -> &PerceptionParams {
        &self.params
    }

    /// Metres per cell.
    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    /// The perceived grid.
    pub const fn grid(&self) -> &Grid2D<PerceivedCell> {
        &self.grid
    }

    /// The perceived cell at `coord`.
    pub fn cell(&self, coord: DiscreteCoord) -> Option<&PerceivedCell> {
        self.grid.get(coord)
    }

    /// Density of the cell at `coord`, zero outside the grid.
    pub fn density_at(&self, coord: DiscreteCoord) -> f64 {
        self.cell(coord).map_or(0.0, |c| c.density().value())
    }

    /// Known blocks with the density of their cells, in ID order.
    pub fn blocks(&self) -> Vec<PerceivedEntity<'_, Block>> {
        self.blocks
            .values()
            .map(|b| PerceivedEntity {
                ent: b,
                density: b.discrete_loc.map_or(0.0, |c| self.density_at(c)),
            })
            .collect()
    }

    /// Known caches with the density of their cells, in ID order.
    pub fn caches(&self) -> Vec<PerceivedEntity<'_, Cache>> {
        self.caches
            .values()
            .map(|c| PerceivedEntity {
                ent: c,
                density: self.density_at(c.discrete_loc),
            })
            .collect()
    }

    /// A known block.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// A known cache.
    pub fn cache(&self, id: CacheId) -> Option<&Cache> {
        self.caches.get(&id)
    }

    /// Number of known blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of known caches.
    pub fn n_caches(&self) -> usize {
        self.caches.len()
    }

    /// Number of cells with any belief.
    pub fn n_known_cells(&self) -> usize {
        self.grid.iter().filter(|c| c.is_known()).count()
    }

    // -------------------------------------------------------------------
    // Tick-level operations
    // -------------------------------------------------------------------

    /// Decay every known cell by one tick, forgetting cells (and the
    /// entities they held) that drop below the relevance threshold.
    ///
    /// Returns the number of cells forgotten.
    pub fn update(&mut self) -> usize {
        let rho = self.params.rho;
        let mut forgotten_blocks = Vec::new();
        let mut forgotten_caches = Vec::new();
        let mut forgotten = 0_usize;
        for cell in self.grid.iter_mut() {
            if let Some(Forgotten(entity)) = cell.decay(rho) {
                forgotten = forgotten.saturating_add(1);
                match entity {
                    Some(EntityRef::Block(id)) => forgotten_blocks.push(id),
                    Some(EntityRef::Cache(id)) => forgotten_caches.push(id),
                    None => {}
                }
            }
        }
        for id in &forgotten_blocks {
            self.blocks.remove(id);
        }
        for id in &forgotten_caches {
            self.caches.remove(id);
        }
        if forgotten > 0 {
            trace!(
                robot = %self.robot,
                forgotten,
                blocks = forgotten_blocks.len(),
                caches = forgotten_caches.len(),
                "Perceived cells decayed to unknown"
            );
        }
        forgotten
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        for cell in self.grid.iter_mut() {
            cell.apply(CellEvent::Unknown, false);
        }
        self.blocks.clear();
        self.caches.clear();
        debug!(robot = %self.robot, "Perceived map reset");
    }

    // -------------------------------------------------------------------
    // Event dispatch
    // -------------------------------------------------------------------

    /// Apply a [`MapEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::BlockOutOfSight`] for a sighting of a
    /// carried block, or [`PerceptionError::OutOfBounds`] for a location
    /// outside the grid.
    pub fn apply(&mut self, event: MapEvent) -> Result<(), PerceptionError> {
        match event {
            MapEvent::BlockFound(block) => self.block_found(block),
            MapEvent::CacheFound(cache) => self.cache_found(cache),
            MapEvent::BlockRemoved(id) | MapEvent::BlockPickedUp(id) => {
                self.block_remove(id, CellEvent::Empty)
            }
            MapEvent::CacheRemoved(id) => self.cache_remove(id, CellEvent::Empty),
            MapEvent::CellEmpty(coord) => self.cell_empty(coord),
            MapEvent::CachedBlockPickedUp {
                cache,
                block,
                dissolved,
            } => {
                if dissolved {
                    self.cache_remove(cache, CellEvent::Empty)
                } else {
                    if let Some(c) = self.caches.get_mut(&cache) {
                        c.blocks.retain(|b| *b != block);
                        c.n_block_pickups = c.n_block_pickups.saturating_add(1);
                    }
                    Ok(())
                }
            }
            MapEvent::CacheBlockDropped { cache, block } => {
                if let Some(c) = self.caches.get_mut(&cache) {
                    c.block_add(block);
                }
                Ok(())
            }
        }
    }

    fn block_found(&mut self, block: Block) -> Result<(), PerceptionError> {
        let coord = block
            .discrete_loc
            .ok_or(PerceptionError::BlockOutOfSight(block.id))?;
        let id = block.id;

        // Believed elsewhere: the old location is stale.
        if self
            .blocks
            .get(&id)
            .and_then(|b| b.discrete_loc)
            .is_some_and(|old| old != coord)
        {
            self.block_remove(id, CellEvent::Unknown)?;
        }
        self.evict(coord, EntityRef::Block(id))?;

        self.blocks.insert(id, block);
        self.cell_event(coord, CellEvent::Found(EntityRef::Block(id)))
    }

    fn cache_found(&mut self, cache: Cache) -> Result<(), PerceptionError> {
        let coord = cache.discrete_loc;
        let id = cache.id;

        if self
            .caches
            .get(&id)
            .is_some_and(|c| c.discrete_loc != coord)
        {
            self.cache_remove(id, CellEvent::Unknown)?;
        }
        // Blocks now inside the cache are no longer free blocks.
        for block in &cache.blocks {
            if self.blocks.contains_key(block) {
                self.block_remove(*block, CellEvent::Unknown)?;
            }
        }
        self.evict(coord, EntityRef::Cache(id))?;

        self.caches.insert(id, cache);
        self.cell_event(coord, CellEvent::Found(EntityRef::Cache(id)))
    }

    fn cell_empty(&mut self, coord: DiscreteCoord) -> Result<(), PerceptionError> {
        let state = self
            .cell(coord)
            .ok_or(PerceptionError::OutOfBounds(coord))?
            .state();
        match state {
            CellState::HasBlock(id) => {
                self.blocks.remove(&id);
            }
            CellState::HasCache(id) => {
                self.caches.remove(&id);
            }
            CellState::Unknown | CellState::Empty => {}
        }
        self.cell_event(coord, CellEvent::Empty)
    }

    /// Remove a block snapshot and apply `event` to its cell if the cell
    /// still names it.
    fn block_remove(&mut self, id: BlockId, event: CellEvent) -> Result<(), PerceptionError> {
        let Some(block) = self.blocks.remove(&id) else {
            return Ok(());
        };
        let holder = block
            .discrete_loc
            .filter(|c| self.cell(*c).and_then(PerceivedCell::block) == Some(id));
        if let Some(coord) = holder {
            self.cell_event(coord, event)?;
        }
        debug!(robot = %self.robot, block = %id, "Block removed from perception");
        Ok(())
    }

    fn cache_remove(&mut self, id: CacheId, event: CellEvent) -> Result<(), PerceptionError> {
        let Some(cache) = self.caches.remove(&id) else {
            return Ok(());
        };
        if self.cell(cache.discrete_loc).and_then(PerceivedCell::cache) == Some(id) {
            self.cell_event(cache.discrete_loc, event)?;
        }
        debug!(robot = %self.robot, cache = %id, "Cache removed from perception");
        Ok(())
    }

    /// Drop whatever other entity the cell at `coord` currently names.
    fn evict(&mut self, coord: DiscreteCoord, keep: EntityRef) -> Result<(), PerceptionError> {
        let current = self
            .cell(coord)
            .ok_or(PerceptionError::OutOfBounds(coord))?
            .cell()
            .entity();
        match current {
            Some(EntityRef::Block(id)) if EntityRef::Block(id) != keep => {
                self.blocks.remove(&id);
            }
            Some(EntityRef::Cache(id)) if EntityRef::Cache(id) != keep => {
                self.caches.remove(&id);
            }
            _ => {}
        }
        Ok(())
    }

    fn cell_event(&mut self, coord: DiscreteCoord, event: CellEvent) -> Result<(), PerceptionError> {
        let repeat = self.params.repeat_deposit;
        self.grid
            .get_mut(coord)
            .ok_or(PerceptionError::OutOfBounds(coord))?
            .apply(event, repeat);
        Ok(())
    }
}
