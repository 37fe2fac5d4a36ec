//! Per-cell occupancy state machine.
//!
//! A cell is in one of four states: unknown, empty, holding a block, or
//! holding a cache. The occupying entity is carried inside the state variant,
//! so a cell can never claim to hold a block without naming it.
//!
//! ```text
//!            Found(block)            Found(cache)
//!   any ───────────────► HasBlock   any ───────────► HasCache
//!   any ───── Empty ───► Empty
//!   known ─── Unknown ─► Unknown      (no-op when already unknown)
//! ```
//!
//! All transitions go through [`Cell::apply`], the single dispatcher for
//! [`CellEvent`]s.

use serde::{Deserialize, Serialize};

use fordyca_types::{BlockId, CacheId, DiscreteCoord, EntityRef};

/// Occupancy state of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// Nothing is known about the cell.
    #[default]
    Unknown,
    /// The cell is known to be empty.
    Empty,
    /// The cell holds the given block.
    HasBlock(BlockId),
    /// The cell holds the given cache.
    HasCache(CacheId),
}

/// State discriminant without the entity payload, for comparisons and
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// See [`CellState::Unknown`].
    Unknown,
    /// See [`CellState::Empty`].
    Empty,
    /// See [`CellState::HasBlock`].
    Block,
    /// See [`CellState::HasCache`].
    Cache,
}

impl CellState {
    /// Return the state discriminant.
    pub const fn kind(self) -> CellKind {
        match self {
            Self::Unknown => CellKind::Unknown,
            Self::Empty => CellKind::Empty,
            Self::HasBlock(_) => CellKind::Block,
            Self::HasCache(_) => CellKind::Cache,
        }
    }

    /// Return the occupying entity, if any.
    pub const fn entity(self) -> Option<EntityRef> {
        match self {
            Self::HasBlock(id) => Some(EntityRef::Block(id)),
            Self::HasCache(id) => Some(EntityRef::Cache(id)),
            Self::Unknown | Self::Empty => None,
        }
    }
}

/// Events that drive a cell's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellEvent {
    /// An entity was sighted in (or placed into) the cell.
    Found(EntityRef),
    /// The cell was confirmed empty.
    Empty,
    /// Knowledge of the cell expired.
    Unknown,
}

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Location of the cell in the grid.
    pub coord: DiscreteCoord,
    /// Current occupancy state.
    state: CellState,
}

impl Cell {
    /// Create a cell in the given initial state.
    pub const fn new(coord: DiscreteCoord, state: CellState) -> Self {
        Self { coord, state }
    }

    /// Create a cell whose contents are unknown.
    pub const fn unknown(coord: DiscreteCoord) -> Self {
        Self::new(coord, CellState::Unknown)
    }

    /// Create a cell known to be empty.
    pub const fn empty(coord: DiscreteCoord) -> Self {
        Self::new(coord, CellState::Empty)
    }

    /// Current occupancy state.
    pub const fn state(&self) -> CellState {
        self.state
    }

    /// Current state discriminant.
    pub const fn kind(&self) -> CellKind {
        self.state.kind()
    }

    /// Whether anything is known about the cell.
    pub const fn is_known(&self) -> bool {
        !matches!(self.state, CellState::Unknown)
    }

    /// Whether the cell is known to be empty.
    pub const fn is_empty(&self) -> bool {
        matches!(self.state, CellState::Empty)
    }

    /// Whether the cell holds a block.
    pub const fn has_block(&self) -> bool {
        matches!(self.state, CellState::HasBlock(_))
    }

    /// Whether the cell holds a cache.
    pub const fn has_cache(&self) -> bool {
        matches!(self.state, CellState::HasCache(_))
    }

    /// The block in the cell, if any.
    pub const fn block(&self) -> Option<BlockId> {
        match self.state {
            CellState::HasBlock(id) => Some(id),
            _ => None,
        }
    }

    /// The cache in the cell, if any.
    pub const fn cache(&self) -> Option<CacheId> {
        match self.state {
            CellState::HasCache(id) => Some(id),
            _ => None,
        }
    }

    /// The entity in the cell, if any.
    pub const fn entity(&self) -> Option<EntityRef> {
        self.state.entity()
    }

    /// Apply an event to the cell. Returns `true` if the state changed.
    ///
    /// `Unknown` on a cell that is already unknown is ignored without
    /// touching the state.
    pub fn apply(&mut self, event: CellEvent) -> bool {
        let next = match event {
            CellEvent::Found(EntityRef::Block(id)) => CellState::HasBlock(id),
            CellEvent::Found(EntityRef::Cache(id)) => CellState::HasCache(id),
            CellEvent::Empty => CellState::Empty,
            CellEvent::Unknown => {
                if !self.is_known() {
                    return false;
                }
                CellState::Unknown
            }
        };
        let changed = next != self.state;
        self.state = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> DiscreteCoord {
        DiscreteCoord::new(3, 4)
    }

    #[test]
    fn found_block_sets_entity() {
        let mut cell = Cell::unknown(coord());
        assert!(cell.apply(CellEvent::Found(EntityRef::Block(BlockId::new(7)))));
        assert!(cell.has_block());
        assert_eq!(cell.block(), Some(BlockId::new(7)));
        assert_eq!(cell.entity(), Some(EntityRef::Block(BlockId::new(7))));
        assert!(cell.is_known());
    }

    #[test]
    fn found_cache_sets_entity() {
        let mut cell = Cell::empty(coord());
        cell.apply(CellEvent::Found(EntityRef::Cache(CacheId::new(2))));
        assert!(cell.has_cache());
        assert_eq!(cell.cache(), Some(CacheId::new(2)));
        assert_eq!(cell.block(), None);
    }

    #[test]
    fn empty_clears_entity() {
        let mut cell = Cell::new(coord(), CellState::HasBlock(BlockId::new(1)));
        cell.apply(CellEvent::Empty);
        assert!(cell.is_empty());
        assert_eq!(cell.entity(), None);
    }

    #[test]
    fn unknown_on_unknown_is_noop() {
        let mut cell = Cell::unknown(coord());
        assert!(!cell.apply(CellEvent::Unknown));
        assert!(!cell.is_known());
    }

    #[test]
    fn unknown_forgets_known_cell() {
        let mut cell = Cell::new(coord(), CellState::HasCache(CacheId::new(0)));
        assert!(cell.apply(CellEvent::Unknown));
        assert_eq!(cell.state(), CellState::Unknown);
        assert_eq!(cell.entity(), None);
    }

    #[test]
    fn refound_same_entity_reports_no_change() {
        let mut cell = Cell::new(coord(), CellState::HasBlock(BlockId::new(5)));
        assert!(!cell.apply(CellEvent::Found(EntityRef::Block(BlockId::new(5)))));
        assert!(cell.apply(CellEvent::Found(EntityRef::Block(BlockId::new(6)))));
    }

    #[test]
    fn kind_discriminant() {
        assert_eq!(CellState::Unknown.kind(), CellKind::Unknown);
        assert_eq!(CellState::HasBlock(BlockId::new(0)).kind(), CellKind::Block);
        assert_eq!(CellState::HasCache(CacheId::new(0)).kind(), CellKind::Cache);
    }
}
