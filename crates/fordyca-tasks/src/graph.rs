//! The task decomposition graph.
//!
//! A two-level tree: the generalist root, optionally partitioned into
//! harvester and collector. Each node owns its execution-time and
//! interface-time estimates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::estimate::{EstimationMethod, TimeEstimate};
use crate::task::TaskKind;

/// One task in the graph with its rolling estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    /// Which task this is.
    pub kind: TaskKind,
    /// Parent task, `None` for the root.
    pub parent: Option<TaskKind>,
    /// Ticks from start to finish.
    pub exec_estimate: TimeEstimate,
    /// Ticks spent at the task's interface (cache or nest handoff).
    pub interface_estimate: TimeEstimate,
}

impl TaskNode {
    fn new(kind: TaskKind, parent: Option<TaskKind>, method: EstimationMethod) -> Self {
        Self {
            kind,
            parent,
            exec_estimate: TimeEstimate::new(method),
            interface_estimate: TimeEstimate::new(method),
        }
    }

    /// Total estimated cost: execution plus interface time. `None` until
    /// the task has finished or aborted at least once.
    pub fn cost(&self) -> Option<f64> {
        self.exec_estimate
            .has_samples()
            .then(|| self.exec_estimate.value() + self.interface_estimate.value())
    }
}

/// The task decomposition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskKind, TaskNode>,
}

impl TaskGraph {
    /// Build the graph. Without `partitioning` only the generalist exists.
    pub fn new(method: EstimationMethod, partitioning: bool) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            TaskKind::Generalist,
            TaskNode::new(TaskKind::Generalist, None, method),
        );
        if partitioning {
            for sub in [TaskKind::Harvester, TaskKind::Collector] {
                nodes.insert(sub, TaskNode::new(sub, Some(TaskKind::Generalist), method));
            }
        }
        Self { nodes }
    }

    /// The root task.
    pub const fn root(&self) -> TaskKind {
        TaskKind::Generalist
    }

    /// Whether the root has been partitioned.
    pub fn is_partitioned(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Whether `task` is in the graph.
    pub fn contains(&self, task: TaskKind) -> bool {
        self.nodes.contains_key(&task)
    }

    /// Look up a node.
    pub fn node(&self, task: TaskKind) -> Option<&TaskNode> {
        self.nodes.get(&task)
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, task: TaskKind) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&task)
    }

    /// All tasks, root first.
    pub fn tasks(&self) -> impl Iterator<Item = TaskKind> + '_ {
        self.nodes.keys().copied()
    }

    /// Children of `task`.
    pub fn children(&self, task: TaskKind) -> impl Iterator<Item = TaskKind> + '_ {
        self.nodes
            .values()
            .filter(move |n| n.parent == Some(task))
            .map(|n| n.kind)
    }

    /// Estimated cost of `task`, if it has any samples.
    pub fn cost(&self, task: TaskKind) -> Option<f64> {
        self.node(task).and_then(TaskNode::cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpartitioned_graph_has_only_root() {
        let g = TaskGraph::new(EstimationMethod::default(), false);
        assert!(!g.is_partitioned());
        assert_eq!(g.tasks().collect::<Vec<_>>(), vec![TaskKind::Generalist]);
        assert!(!g.contains(TaskKind::Collector));
    }

    #[test]
    fn partitioned_graph_links_children() {
        let g = TaskGraph::new(EstimationMethod::default(), true);
        assert_eq!(
            g.children(TaskKind::Generalist).collect::<Vec<_>>(),
            vec![TaskKind::Harvester, TaskKind::Collector]
        );
        assert_eq!(
            g.node(TaskKind::Collector).and_then(|n| n.parent),
            Some(TaskKind::Generalist)
        );
        assert_eq!(g.cost(TaskKind::Harvester), None);
    }

    #[test]
    fn cost_includes_interface_time() {
        let mut g = TaskGraph::new(EstimationMethod::Windowed { window: 4 }, true);
        if let Some(node) = g.node_mut(TaskKind::Harvester) {
            node.exec_estimate.update(40.0);
            node.interface_estimate.update(5.0);
        }
        let cost = g.cost(TaskKind::Harvester).unwrap_or_default();
        assert!((cost - 45.0).abs() < 1e-9);
    }
}
