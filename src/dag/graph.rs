// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

use crate::dag::{Cascade, GraphView};
use crate::errors::{Result, TaskGraphError};
use crate::model::{Task, TaskDependency, TaskStatus};
use crate::types::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    status: TaskStatus,
    duration_ms: u64,
    /// Insertion index; children are listed in this order.
    order: usize,
    /// Direct prerequisites: tasks that must complete before this one.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that wait for this one.
    dependents: Vec<TaskId>,
}

/// In-memory snapshot of a task graph keyed by task id.
///
/// Built from rows loaded out of storage (or by hand in tests). Edges whose
/// endpoints are not part of the snapshot are ignored, so a snapshot of a
/// subgraph is always self-contained.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskId, DagNode>,
}

/// A path through the graph together with its summed duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedPath {
    pub tasks: Vec<TaskId>,
    pub total_ms: u64,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from tasks (in creation order) and edges.
    pub fn from_parts(tasks: &[Task], edges: &[TaskDependency]) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            graph.insert_task(task.id, task.status, task.estimated_duration_ms.unwrap_or(0));
        }
        for edge in edges {
            graph.add_edge(edge.dependent_task_id, edge.prerequisite_task_id);
        }
        graph
    }

    /// Insert a node; re-inserting an existing id only updates its status and
    /// duration.
    pub fn insert_task(&mut self, id: TaskId, status: TaskStatus, duration_ms: u64) {
        let order = self.nodes.len();
        let node = self.nodes.entry(id).or_insert_with(|| DagNode {
            status,
            duration_ms,
            order,
            deps: Vec::new(),
            dependents: Vec::new(),
        });
        node.status = status;
        node.duration_ms = duration_ms;
    }

    /// Add `dependent -> prerequisite`. Returns `false` when either endpoint
    /// is unknown or the edge already exists. No cycle check happens here;
    /// that is the resolver's job.
    pub fn add_edge(&mut self, dependent: TaskId, prerequisite: TaskId) -> bool {
        if !self.nodes.contains_key(&dependent) || !self.nodes.contains_key(&prerequisite) {
            return false;
        }
        if self.dependencies_of(dependent).contains(&prerequisite) {
            return false;
        }
        if let Some(node) = self.nodes.get_mut(&dependent) {
            node.deps.push(prerequisite);
        }
        if let Some(node) = self.nodes.get_mut(&prerequisite) {
            node.dependents.push(dependent);
        }
        true
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All task ids, in id order.
    pub fn tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.nodes.get(&id).map(|n| n.status)
    }

    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.status = status;
        }
    }

    /// Apply a planned cascade to this snapshot.
    pub fn apply(&mut self, cascade: &Cascade) {
        for change in &cascade.changes {
            self.set_status(change.task_id, change.to);
        }
    }

    /// Immediate prerequisites of a task.
    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(&id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Dependents ordered by insertion, for stable rendering.
    pub fn children_ordered(&self, id: TaskId) -> Vec<TaskId> {
        let mut children = self.dependents_of(id).to_vec();
        children.sort_by_key(|c| self.nodes.get(c).map(|n| n.order).unwrap_or(usize::MAX));
        children
    }

    /// Every task reachable by following prerequisites backwards, with the
    /// shortest hop count at which it was reached.
    pub fn ancestors(&self, id: TaskId, max_depth: Option<u32>) -> Vec<(TaskId, u32)> {
        self.closure(id, max_depth, |g, n| g.dependencies_of(n))
    }

    /// Every task reachable by following dependents forwards.
    pub fn descendants(&self, id: TaskId, max_depth: Option<u32>) -> Vec<(TaskId, u32)> {
        self.closure(id, max_depth, |g, n| g.dependents_of(n))
    }

    fn closure<'a, F>(&'a self, start: TaskId, max_depth: Option<u32>, next: F) -> Vec<(TaskId, u32)>
    where
        F: Fn(&'a DagGraph, TaskId) -> &'a [TaskId],
    {
        let mut seen: HashSet<TaskId> = HashSet::from([start]);
        let mut queue: VecDeque<(TaskId, u32)> = VecDeque::from([(start, 0)]);
        let mut reached = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for &neighbour in next(self, node) {
                if seen.insert(neighbour) {
                    reached.push((neighbour, depth + 1));
                    queue.push_back((neighbour, depth + 1));
                }
            }
        }

        reached
    }

    /// Prerequisites-first ordering of every task in the snapshot.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(*id);
        }
        for (id, node) in &self.nodes {
            for dep in &node.deps {
                graph.add_edge(*dep, *id, ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            TaskGraphError::Internal(format!(
                "dependency graph contains a cycle through task {}",
                cycle.node_id()
            ))
        })
    }

    /// The path from `root` to a leaf that maximizes the summed duration.
    ///
    /// Ties between dependents with equal best remaining duration go to the
    /// lowest task id.
    pub fn critical_path(&self, root: TaskId) -> Result<WeightedPath> {
        if !self.contains(root) {
            return Err(TaskGraphError::TaskNotFound(root));
        }

        let order = self.topological_order()?;
        let mut best: HashMap<TaskId, u64> = HashMap::with_capacity(order.len());
        let mut next: HashMap<TaskId, TaskId> = HashMap::new();

        for &id in order.iter().rev() {
            let own = self.nodes.get(&id).map(|n| n.duration_ms).unwrap_or(0);

            let mut children = self.dependents_of(id).to_vec();
            children.sort();

            let mut chosen: Option<(TaskId, u64)> = None;
            for child in children {
                let score = best.get(&child).copied().unwrap_or(0);
                match chosen {
                    Some((_, top)) if score <= top => {}
                    _ => chosen = Some((child, score)),
                }
            }

            match chosen {
                Some((child, score)) => {
                    best.insert(id, own.saturating_add(score));
                    next.insert(id, child);
                }
                None => {
                    best.insert(id, own);
                }
            }
        }

        let mut tasks = vec![root];
        let mut cursor = root;
        while let Some(&child) = next.get(&cursor) {
            tasks.push(child);
            cursor = child;
        }

        Ok(WeightedPath {
            tasks,
            total_ms: best.get(&root).copied().unwrap_or(0),
        })
    }
}

impl GraphView for DagGraph {
    fn status_of(&self, id: TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.status(id))
    }

    fn prerequisites_of(&self, id: TaskId) -> Result<Vec<TaskId>> {
        Ok(self.dependencies_of(id).to_vec())
    }

    fn dependents_of(&self, id: TaskId) -> Result<Vec<TaskId>> {
        Ok(DagGraph::dependents_of(self, id).to_vec())
    }
}
