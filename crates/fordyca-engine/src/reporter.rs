//! Tick callback that periodically logs swarm metrics.
//!
//! Every `interval` ticks the callback rolls up a [`SwarmMetrics`] record
//! and emits it as a structured `info` event. The latest record is kept so
//! the engine can put it in the run summary.

use fordyca_core::runner::TickCallback;
use fordyca_core::tick::{SimulationState, TickSummary};
use fordyca_core::SwarmMetrics;
use tracing::{debug, info};

/// Callback that reports [`SwarmMetrics`] on a fixed tick interval.
pub struct MetricsReporter {
    interval: u64,
    latest: Option<SwarmMetrics>,
    nest_drops: u64,
}

impl MetricsReporter {
    /// A reporter that logs every `interval` ticks (0 = never).
    pub const fn new(interval: u64) -> Self {
        Self {
            interval,
            latest: None,
            nest_drops: 0,
        }
    }

    /// The most recent record, if one was taken.
    pub const fn latest(&self) -> Option<&SwarmMetrics> {
        self.latest.as_ref()
    }

    /// Nest deliveries seen across all ticks.
    pub const fn nest_drops(&self) -> u64 {
        self.nest_drops
    }

    fn is_due(&self, tick: u64) -> bool {
        self.interval > 0 && tick.checked_rem(self.interval) == Some(0)
    }
}

impl TickCallback for MetricsReporter {
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        self.nest_drops = self
            .nest_drops
            .saturating_add(u64::from(summary.nest_drops));

        if summary.nest_drops > 0 || summary.caches_created > 0 {
            debug!(
                tick = summary.tick,
                nest_drops = summary.nest_drops,
                cache_drops = summary.cache_drops,
                caches_created = summary.caches_created,
                "Deliveries"
            );
        }

        if !self.is_due(summary.tick) {
            return;
        }
        let metrics =
            SwarmMetrics::collect(summary.tick, &state.robots, &state.arena, &state.task_stats);
        info!(
            tick = metrics.tick,
            nest_deliveries = metrics.nest_deliveries,
            cache_deliveries = metrics.cache_deliveries,
            pickups = metrics.pickups,
            failed_pickups = metrics.failed_pickups,
            robots_carrying = metrics.robots_carrying,
            free_blocks = metrics.free_blocks,
            caches = metrics.caches,
            block_discoveries = metrics.fusion.block_discoveries,
            known_cells = metrics.accuracy.known_cells,
            "Swarm metrics"
        );
        self.latest = Some(metrics);
    }
}
