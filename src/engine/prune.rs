// src/engine/prune.rs

//! Archive-then-delete of finished tasks.
//!
//! Only terminal tasks are ever deleted, and never while a live task still
//! depends on them. Deletion happens only after the archive is durably
//! written; an archival failure leaves the graph untouched.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::dag::traversal::tree_label;
use crate::dag::tree::{render_tree, TreeLimits};
use crate::dag::{DagGraph, GraphView};
use crate::engine::TaskQueue;
use crate::errors::{Result, TaskGraphError};
use crate::model::{FilterState, Task, TaskDependency};
use crate::storage::TxStore;
use crate::types::{short_id, TaskId};

/// A matched task that was left in place, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: TaskId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PruneResult {
    pub dry_run: bool,
    /// Tasks deleted (or, for a dry run, that would be), in creation order.
    pub tasks: Vec<Task>,
    pub skipped: Vec<SkippedTask>,
    /// Where the archive was written; `None` for dry runs and empty prunes.
    pub archive_path: Option<PathBuf>,
    /// Text tree of the deletion set.
    pub preview: String,
}

impl PruneResult {
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }
}

struct PrunePlan {
    tasks: Vec<Task>,
    edges: Vec<TaskDependency>,
    skipped: Vec<SkippedTask>,
}

impl TaskQueue {
    /// Remove tasks matching `filter`.
    ///
    /// With `recursive`, each matched task is taken together with all of its
    /// descendants, provided every one of them is terminal. A dry run only
    /// computes the deletion set and its preview.
    pub async fn prune(
        &self,
        filter: &FilterState,
        recursive: bool,
        dry_run: bool,
    ) -> Result<PruneResult> {
        if filter.is_empty() {
            return Err(TaskGraphError::validation(
                "refusing to prune with an empty filter",
            ));
        }

        let _guard = self.write_lock.lock().await;

        let planned_filter = filter.clone();
        let plan = self
            .store
            .read(move |s| plan_prune(s, &planned_filter, recursive))
            .await?;

        let preview = render_preview(
            &plan.tasks,
            &plan.edges,
            TreeLimits {
                max_depth: Some(self.preview_depth),
                max_nodes: self.limits.tree_max_nodes,
            },
        );
        for skip in &plan.skipped {
            warn!(task = %skip.task_id, reason = %skip.reason, "prune skipped task");
        }

        if dry_run || plan.tasks.is_empty() {
            info!(
                dry_run,
                selected = plan.tasks.len(),
                skipped = plan.skipped.len(),
                "prune planned"
            );
            return Ok(PruneResult {
                dry_run,
                tasks: plan.tasks,
                skipped: plan.skipped,
                archive_path: None,
                preview,
            });
        }

        let reason = if recursive { "prune-recursive" } else { "prune" };
        let archive_path = self.archiver.archive(&plan.tasks, reason).await?;

        let ids: Vec<TaskId> = plan.tasks.iter().map(|t| t.id).collect();
        let deleted = self
            .store
            .write(move |s| {
                revalidate(s, &ids)?;
                let deleted = s.delete_tasks(&ids)?;
                if deleted != ids.len() {
                    return Err(TaskGraphError::Internal(format!(
                        "prune deleted {deleted} of {} tasks",
                        ids.len()
                    )));
                }
                Ok(deleted)
            })
            .await?;

        info!(
            deleted,
            skipped = plan.skipped.len(),
            archive = %archive_path.display(),
            "pruned tasks"
        );

        Ok(PruneResult {
            dry_run,
            tasks: plan.tasks,
            skipped: plan.skipped,
            archive_path: Some(archive_path),
            preview,
        })
    }
}

fn plan_prune(s: &TxStore<'_>, filter: &FilterState, recursive: bool) -> Result<PrunePlan> {
    let all = s.list_tasks()?;
    let status: HashMap<TaskId, _> = all.iter().map(|t| (t.id, t.status)).collect();

    let mut selected: HashSet<TaskId> = HashSet::new();
    let mut skipped = Vec::new();

    for task in all.iter().filter(|t| filter.matches(t)) {
        if selected.contains(&task.id) {
            continue;
        }
        if !task.is_terminal() {
            skipped.push(SkippedTask {
                task_id: task.id,
                reason: format!("status {} is not terminal", task.status),
            });
            continue;
        }

        if recursive {
            let closure = s.descendants(task.id, None)?;
            match closure.iter().find(|r| !r.task.is_terminal()) {
                Some(live) => skipped.push(SkippedTask {
                    task_id: task.id,
                    reason: format!(
                        "descendant {} is still {}",
                        short_id(&live.task.id),
                        live.task.status
                    ),
                }),
                None => {
                    selected.insert(task.id);
                    selected.extend(closure.iter().map(|r| r.task.id));
                }
            }
        } else {
            let live = GraphView::dependents_of(s, task.id)?
                .into_iter()
                .find_map(|d| {
                    status
                        .get(&d)
                        .filter(|st| !st.is_terminal())
                        .map(|st| (d, *st))
                });
            match live {
                Some((dependent, st)) => skipped.push(SkippedTask {
                    task_id: task.id,
                    reason: format!("dependent {} is still {st}", short_id(&dependent)),
                }),
                None => {
                    selected.insert(task.id);
                }
            }
        }
    }

    let tasks: Vec<Task> = all.into_iter().filter(|t| selected.contains(&t.id)).collect();
    let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
    let edges = s
        .edges_for_dependents(&ids)?
        .into_iter()
        .filter(|e| selected.contains(&e.prerequisite_task_id))
        .collect();

    Ok(PrunePlan {
        tasks,
        edges,
        skipped,
    })
}

/// Inside the deleting transaction: every task is still there, still
/// terminal, and nothing outside the set that is still live depends on it.
fn revalidate(s: &TxStore<'_>, ids: &[TaskId]) -> Result<()> {
    let members: HashSet<TaskId> = ids.iter().copied().collect();
    for &id in ids {
        let task = s.require_task(id)?;
        if !task.is_terminal() {
            return Err(TaskGraphError::Internal(format!(
                "task {id} changed while being pruned"
            )));
        }
        for dependent in GraphView::dependents_of(s, id)? {
            if members.contains(&dependent) {
                continue;
            }
            if s.status_of(dependent)?.is_some_and(|st| !st.is_terminal()) {
                return Err(TaskGraphError::Internal(format!(
                    "task {id} gained live dependent {dependent} while being pruned"
                )));
            }
        }
    }
    Ok(())
}

/// One tree per task in the set that has no prerequisite inside the set.
fn render_preview(tasks: &[Task], edges: &[TaskDependency], limits: TreeLimits) -> String {
    let graph = DagGraph::from_parts(tasks, edges);
    let labels: HashMap<TaskId, String> = tasks.iter().map(|t| (t.id, tree_label(t))).collect();

    tasks
        .iter()
        .filter(|t| graph.dependencies_of(t.id).is_empty())
        .map(|t| {
            render_tree(&graph, t.id, limits, |id| {
                labels.get(&id).cloned().unwrap_or_else(|| short_id(&id))
            })
        })
        .collect::<Vec<_>>()
        .join("")
}
