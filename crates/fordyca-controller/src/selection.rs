//! Choosing the best known block or cache.
//!
//! Candidates come from whatever the robot knows: its perceived map, or the
//! oracle's ground-truth snapshot. Selection is a linear scan keeping the
//! first candidate with the strictly highest utility, so ties resolve to the
//! lowest id.

use serde::{Deserialize, Serialize};

use fordyca_types::{BlockId, BlockKind, CacheId, EntityRef, Vec2};

use crate::utility::{BlockPriorities, UtilityModel, block_utility, cache_utility};

/// A block the robot knows about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockCandidate {
    /// Block id.
    pub id: BlockId,
    /// Target position (cell centre).
    pub loc: Vec2,
    /// Block kind.
    pub kind: BlockKind,
    /// Pheromone density of the belief.
    pub density: f64,
}

/// A cache the robot knows about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheCandidate {
    /// Cache id.
    pub id: CacheId,
    /// Target position (cell centre).
    pub loc: Vec2,
    /// Blocks in the cache when last seen.
    pub n_blocks: usize,
    /// Pheromone density of the belief.
    pub density: f64,
}

/// Everything a robot knows this tick, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Knowledge {
    /// Known free blocks.
    pub blocks: Vec<BlockCandidate>,
    /// Known caches.
    pub caches: Vec<CacheCandidate>,
}

impl Knowledge {
    /// Where a known entity is, if it is still known.
    pub fn locate(&self, entity: EntityRef) -> Option<Vec2> {
        match entity {
            EntityRef::Block(id) => self.blocks.iter().find(|b| b.id == id).map(|b| b.loc),
            EntityRef::Cache(id) => self.caches.iter().find(|c| c.id == id).map(|c| c.loc),
        }
    }
}

/// A chosen target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    /// The entity to go to.
    pub entity: EntityRef,
    /// Where it is.
    pub loc: Vec2,
    /// Its utility at selection time.
    pub utility: f64,
}

/// Selection tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Block utility model.
    #[serde(default)]
    pub model: UtilityModel,
    /// Per-kind block priorities.
    #[serde(default)]
    pub priorities: BlockPriorities,
    /// Blocks closer than this to the robot are skipped.
    #[serde(default)]
    pub block_min_dist: f64,
    /// Caches closer than this to the robot are skipped.
    #[serde(default)]
    pub cache_min_dist: f64,
}

fn keep_best(best: &mut Option<Target>, candidate: Target) {
    if best.is_none_or(|b| candidate.utility > b.utility) {
        *best = Some(candidate);
    }
}

/// The highest-utility known block, skipping excluded and too-close ones.
pub fn best_block(
    knowledge: &Knowledge,
    robot: Vec2,
    nest: Vec2,
    params: &SelectionParams,
    exclude: &[EntityRef],
) -> Option<Target> {
    let mut best = None;
    for b in &knowledge.blocks {
        let entity = EntityRef::Block(b.id);
        if exclude.contains(&entity) || b.loc.distance(robot) < params.block_min_dist {
            continue;
        }
        let utility = block_utility(
            params.model,
            b.loc,
            robot,
            nest,
            b.density,
            params.priorities.of(b.kind),
        );
        keep_best(
            &mut best,
            Target {
                entity,
                loc: b.loc,
                utility,
            },
        );
    }
    best
}

/// The highest-utility known cache, skipping excluded and too-close ones.
pub fn best_cache(
    knowledge: &Knowledge,
    robot: Vec2,
    nest: Vec2,
    params: &SelectionParams,
    exclude: &[EntityRef],
) -> Option<Target> {
    let mut best = None;
    for c in &knowledge.caches {
        let entity = EntityRef::Cache(c.id);
        if exclude.contains(&entity) || c.loc.distance(robot) < params.cache_min_dist {
            continue;
        }
        let utility = cache_utility(c.loc, robot, nest, c.density, c.n_blocks);
        keep_best(
            &mut best,
            Target {
                entity,
                loc: c.loc,
                utility,
            },
        );
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEST: Vec2 = Vec2::new(0.0, 0.0);
    const ROBOT: Vec2 = Vec2::new(5.0, 0.0);

    fn block(id: u32, x: f64, y: f64, density: f64) -> BlockCandidate {
        BlockCandidate {
            id: BlockId::new(id),
            loc: Vec2::new(x, y),
            kind: BlockKind::Cube,
            density,
        }
    }

    #[test]
    fn picks_fresher_block_under_priority_weighting() {
        let k = Knowledge {
            blocks: vec![block(0, 10.0, 0.0, 0.2), block(1, 10.0, 0.0, 0.8)],
            caches: Vec::new(),
        };
        let t = best_block(&k, ROBOT, NEST, &SelectionParams::default(), &[]);
        assert_eq!(t.map(|t| t.entity), Some(EntityRef::Block(BlockId::new(1))));
    }

    #[test]
    fn legacy_model_picks_staler_block() {
        let k = Knowledge {
            blocks: vec![block(0, 10.0, 0.0, 0.2), block(1, 10.0, 0.0, 0.8)],
            caches: Vec::new(),
        };
        let params = SelectionParams {
            model: UtilityModel::Legacy,
            ..SelectionParams::default()
        };
        let t = best_block(&k, ROBOT, NEST, &params, &[]);
        assert_eq!(t.map(|t| t.entity), Some(EntityRef::Block(BlockId::new(0))));
    }

    #[test]
    fn ties_keep_first_seen() {
        let k = Knowledge {
            blocks: vec![block(3, 8.0, 1.0, 0.5), block(4, 8.0, 1.0, 0.5)],
            caches: Vec::new(),
        };
        let t = best_block(&k, ROBOT, NEST, &SelectionParams::default(), &[]);
        assert_eq!(t.map(|t| t.entity), Some(EntityRef::Block(BlockId::new(3))));
    }

    #[test]
    fn excluded_and_close_blocks_are_skipped() {
        let k = Knowledge {
            blocks: vec![block(0, 5.1, 0.0, 1.0), block(1, 9.0, 0.0, 0.1)],
            caches: Vec::new(),
        };
        let params = SelectionParams {
            block_min_dist: 0.5,
            ..SelectionParams::default()
        };
        let t = best_block(&k, ROBOT, NEST, &params, &[]);
        assert_eq!(t.map(|t| t.entity), Some(EntityRef::Block(BlockId::new(1))));
        let none = best_block(&k, ROBOT, NEST, &params, &[EntityRef::Block(BlockId::new(1))]);
        assert!(none.is_none());
    }

    #[test]
    fn empty_knowledge_yields_none() {
        let k = Knowledge::default();
        assert!(best_block(&k, ROBOT, NEST, &SelectionParams::default(), &[]).is_none());
        assert!(best_cache(&k, ROBOT, NEST, &SelectionParams::default(), &[]).is_none());
    }

    #[test]
    fn best_cache_prefers_larger() {
        let k = Knowledge {
            blocks: Vec::new(),
            caches: vec![
                CacheCandidate {
                    id: CacheId::new(0),
                    loc: Vec2::new(3.0, 3.0),
                    n_blocks: 2,
                    density: 1.0,
                },
                CacheCandidate {
                    id: CacheId::new(1),
                    loc: Vec2::new(3.0, 3.0),
                    n_blocks: 5,
                    density: 1.0,
                },
            ],
        };
        let t = best_cache(&k, ROBOT, NEST, &SelectionParams::default(), &[]);
        assert_eq!(t.map(|t| t.entity), Some(EntityRef::Cache(CacheId::new(1))));
        assert_eq!(k.locate(EntityRef::Cache(CacheId::new(0))), Some(Vec2::new(3.0, 3.0)));
    }
}
