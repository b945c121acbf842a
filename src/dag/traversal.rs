// src/dag/traversal.rs

//! Read-only structural queries over the stored task graph.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::dag::tree::{render_tree, TreeLimits};
use crate::dag::DagGraph;
use crate::errors::{Result, TaskGraphError};
use crate::model::Task;
use crate::storage::SqliteStore;
use crate::types::{short_id, TaskId};

/// A task reached by a closure query, with the smallest hop count at which
/// it is reachable from the queried task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reached {
    pub task: Task,
    pub depth: u32,
}

/// Duration-maximizing path from a root to a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    pub tasks: Vec<Task>,
    pub total_duration_ms: u64,
}

/// Turn a caller-supplied depth bound into the internal form.
///
/// `None` means unbounded; zero and negative bounds are rejected.
pub fn validate_depth(max_depth: Option<i64>) -> Result<Option<u32>> {
    match max_depth {
        None => Ok(None),
        Some(d) if d <= 0 => Err(TaskGraphError::validation(format!(
            "max_depth must be >= 1 (got {d})"
        ))),
        Some(d) => Ok(Some(u32::try_from(d).unwrap_or(u32::MAX))),
    }
}

/// Traversal engine. Never writes; every query runs in its own read
/// transaction, so it only ever sees committed cascades.
#[derive(Debug, Clone)]
pub struct Traversal {
    store: SqliteStore,
    tree_max_nodes: usize,
}

impl Traversal {
    pub fn new(store: SqliteStore, tree_max_nodes: usize) -> Self {
        Self {
            store,
            tree_max_nodes,
        }
    }

    /// All prerequisites reachable backwards from `id`, deduplicated.
    pub async fn ancestors(&self, id: TaskId, max_depth: Option<i64>) -> Result<Vec<Reached>> {
        let depth = validate_depth(max_depth)?;
        let reached = self
            .store
            .read(move |s| {
                s.require_task(id)?;
                s.ancestors(id, depth)
            })
            .await?;
        debug!(task = %id, count = reached.len(), ?depth, "ancestor query");
        Ok(reached)
    }

    /// All dependents reachable forwards from `id`, deduplicated.
    pub async fn descendants(&self, id: TaskId, max_depth: Option<i64>) -> Result<Vec<Reached>> {
        let depth = validate_depth(max_depth)?;
        let reached = self
            .store
            .read(move |s| {
                s.require_task(id)?;
                s.descendants(id, depth)
            })
            .await?;
        debug!(task = %id, count = reached.len(), ?depth, "descendant query");
        Ok(reached)
    }

    /// Longest duration-weighted path from `root` down to a leaf.
    ///
    /// Ties go to the dependent with the lowest task id; a missing estimate
    /// counts as zero.
    pub async fn critical_path(&self, root: TaskId) -> Result<CriticalPath> {
        let (tasks, edges) = self
            .store
            .read(move |s| {
                s.require_task(root)?;
                s.subgraph(root, None)
            })
            .await?;

        let graph = DagGraph::from_parts(&tasks, &edges);
        let path = graph.critical_path(root)?;

        let mut by_id: HashMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id, t)).collect();
        let tasks = path
            .tasks
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect::<Vec<_>>();

        Ok(CriticalPath {
            tasks,
            total_duration_ms: path.total_ms,
        })
    }

    /// Tasks with no dependency edges in either direction.
    pub async fn orphaned(&self) -> Result<Vec<Task>> {
        self.store.read(|s| s.orphans()).await
    }

    /// Tasks nothing depends on.
    pub async fn leaves(&self) -> Result<Vec<Task>> {
        self.store.read(|s| s.leaves()).await
    }

    /// Text tree of `root` and its dependents down to `max_depth` levels,
    /// cut short after the configured number of nodes.
    pub async fn render_tree(&self, root: TaskId, max_depth: Option<i64>) -> Result<String> {
        let depth = validate_depth(max_depth)?;
        // One level past the bound so truncated nodes know what they hide.
        let load_depth = depth.map(|d| d.saturating_add(1));

        let (tasks, edges) = self
            .store
            .read(move |s| {
                s.require_task(root)?;
                s.subgraph(root, load_depth)
            })
            .await?;

        let graph = DagGraph::from_parts(&tasks, &edges);
        let labels: HashMap<TaskId, String> =
            tasks.iter().map(|t| (t.id, tree_label(t))).collect();

        let limits = TreeLimits {
            max_depth: depth,
            max_nodes: self.tree_max_nodes,
        };
        Ok(render_tree(&graph, root, limits, |id| {
            labels.get(&id).cloned().unwrap_or_else(|| short_id(&id))
        }))
    }
}

/// One-line label used in rendered trees.
pub fn tree_label(task: &Task) -> String {
    format!("{} [{}] {}", short_id(&task.id), task.status, task.description)
}
