//! Line-of-sight windows into the arena.
//!
//! A [`LineOfSight`] is a borrowed, read-only square of cells centred on a
//! robot. It is what a robot "sees" on one tick, and is consumed by the
//! perception subsystem to update that robot's map.

use fordyca_types::{Block, BlockId, Cache, CacheId, DiscreteCoord};

use crate::arena::ArenaMap;
use crate::cell::Cell;

/// A read-only window of arena cells around a robot.
#[derive(Debug, Clone, Copy)]
pub struct LineOfSight<'a> {
    arena: &'a ArenaMap,
    center: DiscreteCoord,
    ll: DiscreteCoord,
    ur: DiscreteCoord,
}

impl<'a> LineOfSight<'a> {
    pub(crate) fn new(arena: &'a ArenaMap, center: DiscreteCoord, radius: u32) -> Self {
        let (ll, ur) = arena.grid().window_bounds(center, radius);
        Self {
            arena,
            center,
            ll,
            ur,
        }
    }

    /// Cell the window is centred on.
    pub const fn center(&self) -> DiscreteCoord {
        self.center
    }

    /// Inclusive lower-left corner.
    pub const fn lower_left(&self) -> DiscreteCoord {
        self.ll
    }

    /// Inclusive upper-right corner.
    pub const fn upper_right(&self) -> DiscreteCoord {
        self.ur
    }

    /// Metres per cell of the underlying arena.
    pub const fn resolution(&self) -> f64 {
        self.arena.resolution()
    }

    /// Whether `coord` is inside the window.
    pub const fn contains(&self, coord: DiscreteCoord) -> bool {
        coord.x >= self.ll.x && coord.x <= self.ur.x && coord.y >= self.ll.y && coord.y <= self.ur.y
    }

    /// The cell at `coord`, if it is inside the window.
    pub fn cell(&self, coord: DiscreteCoord) -> Option<&'a Cell> {
        if self.contains(coord) {
            self.arena.cell(coord)
        } else {
            None
        }
    }

    /// All cells in the window, row-major.
    pub fn cells(&self) -> impl Iterator<Item = &'a Cell> + use<'a> {
        let arena = self.arena;
        let (ll, ur) = (self.ll, self.ur);
        (ll.y..=ur.y)
            .flat_map(move |y| (ll.x..=ur.x).map(move |x| DiscreteCoord::new(x, y)))
            .filter_map(move |c| arena.cell(c))
    }

    /// Free blocks visible in the window.
    pub fn blocks(&self) -> Vec<&'a Block> {
        self.cells()
            .filter_map(Cell::block)
            .filter_map(|id| self.arena.block(id))
            .collect()
    }

    /// Caches visible in the window.
    pub fn caches(&self) -> Vec<&'a Cache> {
        self.cells()
            .filter_map(Cell::cache)
            .filter_map(|id| self.arena.cache(id))
            .collect()
    }

    /// A visible block by ID.
    pub fn block(&self, id: BlockId) -> Option<&'a Block> {
        let block = self.arena.block(id)?;
        let coord = block.discrete_loc?;
        (self.contains(coord) && self.arena.cell(coord).and_then(Cell::block) == Some(id))
            .then_some(block)
    }

    /// A visible cache by ID.
    pub fn cache(&self, id: CacheId) -> Option<&'a Cache> {
        self.arena
            .cache(id)
            .filter(|c| self.contains(c.discrete_loc))
    }
}
