//! Swarm-wide metrics.
//!
//! [`TaskStatsObserver`] hooks into every robot's task executive and counts
//! task lifecycles into a shared [`TaskStats`] table. [`SwarmMetrics`] rolls
//! per-robot controller counters, fusion counters and world-model accuracy
//! into one serializable record.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use fordyca_perception::{AccuracyStats, FusionStats};
use fordyca_tasks::{TaskKind, TaskObserver, TaskTiming};
use fordyca_types::RobotId;
use fordyca_world::ArenaMap;

use crate::tick::Robot;

/// Lifecycle counts for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounter {
    /// Allocations.
    pub started: u64,
    /// Completions.
    pub finished: u64,
    /// Abandonments.
    pub aborted: u64,
    /// Ticks spent in finished or aborted runs.
    pub exec_ticks: u64,
    /// Ticks of that spent at the task interface.
    pub interface_ticks: u64,
}

impl TaskCounter {
    /// Mean execution time of ended runs, `None` before the first one ends.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_exec_ticks(&self) -> Option<f64> {
        let ended = self.finished.saturating_add(self.aborted);
        (ended > 0).then(|| self.exec_ticks as f64 / ended as f64)
    }

    fn record(&mut self, timing: &TaskTiming) {
        self.exec_ticks = self.exec_ticks.saturating_add(timing.exec_ticks);
        self.interface_ticks = self.interface_ticks.saturating_add(timing.interface_ticks);
    }
}

/// Task lifecycle counts for the whole swarm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Counts per task.
    pub tasks: BTreeMap<TaskKind, TaskCounter>,
}

impl TaskStats {
    /// Counts for `task`, zero if it never ran.
    pub fn get(&self, task: TaskKind) -> TaskCounter {
        self.tasks.get(&task).copied().unwrap_or_default()
    }

    fn entry(&mut self, task: TaskKind) -> &mut TaskCounter {
        self.tasks.entry(task).or_default()
    }
}

/// Handle to the shared task table.
pub type SharedTaskStats = Arc<Mutex<TaskStats>>;

/// Counts task starts, finishes and aborts into a [`SharedTaskStats`].
#[derive(Debug, Clone)]
pub struct TaskStatsObserver {
    stats: SharedTaskStats,
}

impl TaskStatsObserver {
    /// Observer writing into `stats`.
    pub const fn new(stats: SharedTaskStats) -> Self {
        Self { stats }
    }

    fn with_stats(&self, f: impl FnOnce(&mut TaskStats)) {
        match self.stats.lock() {
            Ok(mut stats) => f(&mut stats),
            Err(_poisoned) => warn!("Task stats lock poisoned, event dropped"),
        }
    }
}

impl TaskObserver for TaskStatsObserver {
    fn task_started(&mut self, _robot: RobotId, task: TaskKind) {
        self.with_stats(|s| {
            let c = s.entry(task);
            c.started = c.started.saturating_add(1);
        });
    }

    fn task_finished(&mut self, _robot: RobotId, task: TaskKind, timing: &TaskTiming) {
        self.with_stats(|s| {
            let c = s.entry(task);
            c.finished = c.finished.saturating_add(1);
            c.record(timing);
        });
    }

    fn task_aborted(&mut self, _robot: RobotId, task: TaskKind, timing: &TaskTiming) {
        self.with_stats(|s| {
            let c = s.entry(task);
            c.aborted = c.aborted.saturating_add(1);
            c.record(timing);
        });
    }
}

/// One swarm-wide metrics record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmMetrics {
    /// Tick the record was taken on.
    pub tick: u64,
    /// Blocks delivered to the nest.
    pub nest_deliveries: u64,
    /// Blocks dropped into caches.
    pub cache_deliveries: u64,
    /// Successful pickups.
    pub pickups: u64,
    /// Pickups that found nothing.
    pub failed_pickups: u64,
    /// Targets found missing on arrival.
    pub vanished_targets: u64,
    /// Robots currently carrying a block.
    pub robots_carrying: u64,
    /// Free blocks in the arena.
    pub free_blocks: u64,
    /// Caches in the arena.
    pub caches: u64,
    /// Summed fusion counters.
    pub fusion: FusionStats,
    /// Summed world-model accuracy, over robots with a perceived map.
    pub accuracy: AccuracyStats,
    /// Task lifecycle counts.
    pub tasks: TaskStats,
}

impl SwarmMetrics {
    /// Collect a record from the robots and the arena.
    pub fn collect(
        tick: u64,
        robots: &[Robot],
        arena: &ArenaMap,
        tasks: &SharedTaskStats,
    ) -> Self {
        let mut m = Self {
            tick,
            free_blocks: arena.free_blocks().count() as u64,
            caches: arena.n_caches() as u64,
            tasks: tasks.lock().map(|t| t.clone()).unwrap_or_default(),
            ..Self::default()
        };
        for robot in robots {
            let c = robot.controller.stats();
            m.nest_deliveries = m.nest_deliveries.saturating_add(c.nest_deliveries);
            m.cache_deliveries = m.cache_deliveries.saturating_add(c.cache_deliveries);
            m.pickups = m.pickups.saturating_add(c.pickups);
            m.failed_pickups = m.failed_pickups.saturating_add(c.failed_pickups);
            m.vanished_targets = m.vanished_targets.saturating_add(c.vanished_targets);
            m.fusion += c.fusion;
            if robot.controller.carried_block().is_some() {
                m.robots_carrying = m.robots_carrying.saturating_add(1);
            }
            if let Some(map) = robot.controller.perception() {
                m.accuracy += AccuracyStats::measure(map, arena);
            }
        }
        m
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn timing(exec: u64, interface: u64) -> TaskTiming {
        TaskTiming {
            exec_ticks: exec,
            interface_ticks: interface,
        }
    }

    #[test]
    fn observer_counts_lifecycle() {
        let stats = SharedTaskStats::default();
        let mut obs = TaskStatsObserver::new(Arc::clone(&stats));
        let robot = RobotId::new(0);

        obs.task_started(robot, TaskKind::Generalist);
        obs.task_finished(robot, TaskKind::Generalist, &timing(40, 5));
        obs.task_started(robot, TaskKind::Harvester);
        obs.task_aborted(robot, TaskKind::Harvester, &timing(10, 0));

        let table = stats.lock().unwrap();
        let g = table.get(TaskKind::Generalist);
        assert_eq!((g.started, g.finished, g.aborted), (1, 1, 0));
        assert_eq!(g.interface_ticks, 5);
        let h = table.get(TaskKind::Harvester);
        assert_eq!((h.started, h.finished, h.aborted), (1, 0, 1));
        assert_eq!(table.get(TaskKind::Collector), TaskCounter::default());
    }

    #[test]
    fn observers_share_one_table() {
        let stats = SharedTaskStats::default();
        let mut a = TaskStatsObserver::new(Arc::clone(&stats));
        let mut b = TaskStatsObserver::new(Arc::clone(&stats));
        a.task_started(RobotId::new(0), TaskKind::Collector);
        b.task_started(RobotId::new(1), TaskKind::Collector);
        assert_eq!(stats.lock().unwrap().get(TaskKind::Collector).started, 2);
    }

    #[test]
    fn mean_exec_ticks_over_ended_runs() {
        let mut c = TaskCounter::default();
        assert!(c.mean_exec_ticks().is_none());
        c.finished = 1;
        c.aborted = 1;
        c.record(&timing(30, 0));
        c.record(&timing(10, 0));
        assert!((c.mean_exec_ticks().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn metrics_serialize_to_json() {
        let m = SwarmMetrics {
            tick: 12,
            nest_deliveries: 3,
            ..SwarmMetrics::default()
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["tick"], 12);
        assert_eq!(json["nest_deliveries"], 3);
        assert!(json["fusion"].is_object());
    }
}
