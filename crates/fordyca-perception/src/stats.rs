//! World-model accuracy and fusion counters.

use core::ops::AddAssign;

use serde::{Deserialize, Serialize};

use fordyca_world::ArenaMap;

use crate::perceived_map::PerceivedArenaMap;

/// Counters produced by one or more fusion passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    /// Blocks seen in a cell that did not already name them.
    pub block_discoveries: u32,
    /// Caches seen in a cell that did not already name them.
    pub cache_discoveries: u32,
    /// Believed blocks found missing from their cell.
    pub block_discrepancies: u32,
    /// Believed caches found missing from their cell.
    pub cache_discrepancies: u32,
    /// Unknown cells newly confirmed empty.
    pub cells_confirmed_empty: u32,
}

impl AddAssign for FusionStats {
    fn add_assign(&mut self, rhs: Self) {
        self.block_discoveries = self.block_discoveries.saturating_add(rhs.block_discoveries);
        self.cache_discoveries = self.cache_discoveries.saturating_add(rhs.cache_discoveries);
        self.block_discrepancies = self
            .block_discrepancies
            .saturating_add(rhs.block_discrepancies);
        self.cache_discrepancies = self
            .cache_discrepancies
            .saturating_add(rhs.cache_discrepancies);
        self.cells_confirmed_empty = self
            .cells_confirmed_empty
            .saturating_add(rhs.cells_confirmed_empty);
    }
}

/// How well a perceived map matches the arena.
///
/// A known cell is counted as a mismatch when its state (kind or entity)
/// differs from the arena's cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyStats {
    /// Cells in the grid.
    pub total_cells: u64,
    /// Cells with any belief.
    pub known_cells: u64,
    /// Known cells that disagree with the arena.
    pub mismatched_cells: u64,
    /// Blocks in the perceived map.
    pub known_blocks: u64,
    /// Caches in the perceived map.
    pub known_caches: u64,
}

impl AccuracyStats {
    /// Compare `map` against the ground truth.
    pub fn measure(map: &PerceivedArenaMap, arena: &ArenaMap) -> Self {
        let mut stats = Self {
            known_blocks: u64::try_from(map.n_blocks()).unwrap_or(u64::MAX),
            known_caches: u64::try_from(map.n_caches()).unwrap_or(u64::MAX),
            ..Self::default()
        };
        for belief in map.grid().iter() {
            stats.total_cells = stats.total_cells.saturating_add(1);
            if !belief.is_known() {
                continue;
            }
            stats.known_cells = stats.known_cells.saturating_add(1);
            let agrees = arena
                .cell(belief.coord())
                .is_some_and(|truth| truth.state() == belief.state());
            if !agrees {
                stats.mismatched_cells = stats.mismatched_cells.saturating_add(1);
            }
        }
        stats
    }

    /// Unknown cells.
    pub const fn unknown_cells(&self) -> u64 {
        self.total_cells.saturating_sub(self.known_cells)
    }

    /// Percentage of cells with any belief.
    pub fn known_pct(&self) -> f64 {
        pct(self.known_cells, self.total_cells)
    }

    /// Percentage of cells with no belief.
    pub fn unknown_pct(&self) -> f64 {
        pct(self.unknown_cells(), self.total_cells)
    }

    /// Percentage of known cells that disagree with the arena.
    pub fn mismatch_pct(&self) -> f64 {
        pct(self.mismatched_cells, self.known_cells)
    }
}

impl AddAssign for AccuracyStats {
    fn add_assign(&mut self, rhs: Self) {
        self.total_cells = self.total_cells.saturating_add(rhs.total_cells);
        self.known_cells = self.known_cells.saturating_add(rhs.known_cells);
        self.mismatched_cells = self.mismatched_cells.saturating_add(rhs.mismatched_cells);
        self.known_blocks = self.known_blocks.saturating_add(rhs.known_blocks);
        self.known_caches = self.known_caches.saturating_add(rhs.known_caches);
    }
}

#[allow(clippy::cast_precision_loss)]
fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
