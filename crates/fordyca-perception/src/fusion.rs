//! Line-of-sight fusion.
//!
//! Reconciles a robot's [`LineOfSight`] with its [`PerceivedArenaMap`]:
//!
//! 1. Believed blocks that are no longer in their LOS cell are removed (the
//!    block was taken by another robot).
//! 2. Believed caches that are no longer in their LOS cell are removed.
//! 3. LOS cells that are empty and unknown to the robot are marked empty.
//! 4. Every visible block is (re-)found, reinforcing its density.
//! 5. Every visible cache is (re-)found, refreshing its block list.
//!
//! Afterwards every LOS cell agrees with the perceived cell in state and
//! entity. That agreement is checked in debug builds, or whenever
//! `verify_fusion` is set, and a disagreement is a hard error.

use tracing::{debug, error};

use fordyca_world::{Cell, LineOfSight};

use crate::error::PerceptionError;
use crate::perceived_map::{MapEvent, PerceivedArenaMap, PerceivedCell};
use crate::stats::FusionStats;

/// Fuse one tick of line of sight into the perceived map.
///
/// # Errors
///
/// Returns [`PerceptionError::BlockOutOfSight`] if a visible block is marked
/// as carried, or [`PerceptionError::LosMismatch`] if the consistency check
/// fails.
pub fn process_los(
    map: &mut PerceivedArenaMap,
    los: &LineOfSight<'_>,
) -> Result<FusionStats, PerceptionError> {
    let mut stats = FusionStats::default();

    for truth in los.cells() {
        let coord = truth.coord;
        let Some(belief) = map.cell(coord).copied() else {
            return Err(PerceptionError::OutOfBounds(coord));
        };

        if let Some(believed) = belief.block() {
            if truth.block() != Some(believed) {
                debug!(robot = %map.robot(), block = %believed, coord = %coord, "Believed block vanished");
                map.apply(MapEvent::BlockRemoved(believed))?;
                stats.block_discrepancies = stats.block_discrepancies.saturating_add(1);
            }
        }
        if let Some(believed) = belief.cache() {
            if truth.cache() != Some(believed) {
                debug!(robot = %map.robot(), cache = %believed, coord = %coord, "Believed cache vanished");
                map.apply(MapEvent::CacheRemoved(believed))?;
                stats.cache_discrepancies = stats.cache_discrepancies.saturating_add(1);
            }
        }

        let now_known = map.cell(coord).is_some_and(PerceivedCell::is_known);
        if truth.is_empty() && !now_known {
            map.apply(MapEvent::CellEmpty(coord))?;
            stats.cells_confirmed_empty = stats.cells_confirmed_empty.saturating_add(1);
        }
    }

    for block in los.blocks() {
        let coord = block
            .discrete_loc
            .ok_or(PerceptionError::BlockOutOfSight(block.id))?;
        if map.cell(coord).and_then(PerceivedCell::block) != Some(block.id) {
            stats.block_discoveries = stats.block_discoveries.saturating_add(1);
        }
        map.apply(MapEvent::BlockFound(block.clone()))?;
    }

    for cache in los.caches() {
        if map.cell(cache.discrete_loc).and_then(PerceivedCell::cache) != Some(cache.id) {
            stats.cache_discoveries = stats.cache_discoveries.saturating_add(1);
        }
        map.apply(MapEvent::CacheFound(cache.clone()))?;
    }

    if cfg!(debug_assertions) || map.params().verify_fusion {
        verify(map, los)?;
    }
    Ok(stats)
}

/// Check that every LOS cell matches the perceived cell in state and entity.
///
/// # Errors
///
/// Returns [`PerceptionError::LosMismatch`] for the first disagreeing cell.
pub fn verify(map: &PerceivedArenaMap, los: &LineOfSight<'_>) -> Result<(), PerceptionError> {
    for truth in los.cells() {
        let belief = map
            .cell(truth.coord)
            .ok_or(PerceptionError::OutOfBounds(truth.coord))?;
        if !agrees(truth, belief) {
            error!(
                robot = %map.robot(),
                coord = %truth.coord,
                expected = ?truth.state(),
                actual = ?belief.state(),
                "Perception diverged from line of sight"
            );
            return Err(PerceptionError::LosMismatch {
                robot: map.robot(),
                coord: truth.coord,
                expected: truth.kind(),
                actual: belief.kind(),
            });
        }
    }
    Ok(())
}

fn agrees(truth: &Cell, belief: &PerceivedCell) -> bool {
    truth.state() == belief.state()
}
