// src/dag/resolver.rs

//! Readiness and cycle rules for the dependency graph.
//!
//! The resolver never writes. Every entry point reads through a
//! [`GraphView`] and returns either a verdict or a [`Cascade`] of planned
//! status changes, which the caller applies in the same transaction.
//!
//! Policy for `Blocked` tasks: nothing upstream ever promotes them
//! automatically. They leave `Blocked` only through an explicit dependency
//! edit on the task itself or an explicit unblock, both of which go through
//! [`Resolver::reclassify`] with `allow_unblock = true`.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::dag::{Cascade, CascadeCause, GraphView};
use crate::errors::{Result, TaskGraphError};
use crate::model::TaskStatus;
use crate::types::TaskId;

pub struct Resolver;

impl Resolver {
    /// Check that `dependent -> prerequisite` may be inserted.
    ///
    /// Walks backwards from `prerequisite` through its own prerequisites; if
    /// `dependent` is reachable, the new edge would close a cycle. The walk
    /// only touches the ancestor subgraph of `prerequisite`.
    pub fn check_new_edge<V: GraphView + ?Sized>(
        view: &V,
        dependent: TaskId,
        prerequisite: TaskId,
    ) -> Result<()> {
        if dependent == prerequisite {
            return Err(TaskGraphError::SelfDependency(dependent));
        }

        let mut stack = vec![prerequisite];
        let mut visited: HashSet<TaskId> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == dependent {
                debug!(%dependent, %prerequisite, "rejecting edge that would close a cycle");
                return Err(TaskGraphError::DependencyCycle {
                    dependent,
                    prerequisite,
                });
            }
            if !visited.insert(current) {
                continue;
            }
            for next in view.prerequisites_of(current)? {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        Ok(())
    }

    /// Status a non-running, non-terminal task should have given its
    /// prerequisites: `Blocked` if any of them failed, was cancelled or is
    /// itself blocked; `Ready` if all completed; `Pending` otherwise.
    pub fn classify<V: GraphView + ?Sized>(view: &V, id: TaskId) -> Result<TaskStatus> {
        let mut all_completed = true;

        for prerequisite in view.prerequisites_of(id)? {
            match view.status_of(prerequisite)? {
                Some(status) if status.blocks_dependents() => return Ok(TaskStatus::Blocked),
                Some(TaskStatus::Completed) => {}
                Some(_) => all_completed = false,
                None => {
                    return Err(TaskGraphError::Internal(format!(
                        "dependency edge of {id} points at missing task {prerequisite}"
                    )));
                }
            }
        }

        Ok(if all_completed {
            TaskStatus::Ready
        } else {
            TaskStatus::Pending
        })
    }

    /// Promote direct dependents of a completed task whose prerequisites are
    /// now all complete. Only `Pending` dependents move; calling this again
    /// yields an empty cascade.
    pub fn on_task_completed<V: GraphView + ?Sized>(view: &V, id: TaskId) -> Result<Cascade> {
        let mut cascade = Cascade::new(id, CascadeCause::PrerequisiteCompleted);
        let mut seen: HashSet<TaskId> = HashSet::new();

        for dependent in view.dependents_of(id)? {
            if !seen.insert(dependent) {
                continue;
            }
            if view.status_of(dependent)? != Some(TaskStatus::Pending) {
                continue;
            }
            if Self::classify(view, dependent)? == TaskStatus::Ready {
                cascade.push(dependent, TaskStatus::Pending, TaskStatus::Ready);
            }
        }

        debug!(task = %id, promoted = cascade.len(), "planned completion cascade");
        Ok(cascade)
    }

    /// Block every direct and transitive dependent still waiting to run.
    pub fn on_task_failed<V: GraphView + ?Sized>(view: &V, id: TaskId) -> Result<Cascade> {
        Self::block_downstream(view, id, CascadeCause::PrerequisiteFailed)
    }

    pub fn on_task_cancelled<V: GraphView + ?Sized>(view: &V, id: TaskId) -> Result<Cascade> {
        Self::block_downstream(view, id, CascadeCause::PrerequisiteCancelled)
    }

    /// Breadth-first walk over dependents of `id`, moving `Pending`/`Ready`
    /// tasks to `Blocked`. Bounded by the size of the downstream subgraph.
    fn block_downstream<V: GraphView + ?Sized>(
        view: &V,
        id: TaskId,
        cause: CascadeCause,
    ) -> Result<Cascade> {
        let mut cascade = Cascade::new(id, cause);
        let mut visited: HashSet<TaskId> = HashSet::from([id]);
        let mut queue: VecDeque<TaskId> = view.dependents_of(id)?.into();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            if let Some(status @ (TaskStatus::Pending | TaskStatus::Ready)) =
                view.status_of(current)?
            {
                cascade.push(current, status, TaskStatus::Blocked);
            }

            for next in view.dependents_of(current)? {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }

        debug!(task = %id, blocked = cascade.len(), ?cause, "planned blocking cascade");
        Ok(cascade)
    }

    /// Re-derive the status of `id` after its prerequisites were edited.
    ///
    /// `Running` and terminal tasks are left alone. A `Blocked` task only
    /// moves when `allow_unblock` is set. When the task itself becomes
    /// `Blocked`, its downstream subgraph is blocked in the same cascade.
    pub fn reclassify<V: GraphView + ?Sized>(
        view: &V,
        id: TaskId,
        allow_unblock: bool,
    ) -> Result<Cascade> {
        let current = view
            .status_of(id)?
            .ok_or(TaskGraphError::TaskNotFound(id))?;
        let mut cascade = Cascade::new(id, CascadeCause::DependenciesChanged);

        if !current.accepts_dependency_changes() {
            return Ok(cascade);
        }
        if current == TaskStatus::Blocked && !allow_unblock {
            return Ok(cascade);
        }

        let target = Self::classify(view, id)?;
        if target == current {
            return Ok(cascade);
        }

        cascade.push(id, current, target);
        if target == TaskStatus::Blocked {
            let downstream = Self::block_downstream(view, id, CascadeCause::PrerequisiteBlocked)?;
            cascade.extend(downstream);
        }

        Ok(cascade)
    }
}
