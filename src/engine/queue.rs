// src/engine/queue.rs

//! The task queue service: the only writer of the task graph.
//!
//! Every operation runs as a single storage transaction. A status write and
//! the cascade it triggers commit together, so readers never see a completed
//! prerequisite next to a dependent that has not been promoted yet. Writes
//! additionally serialize on an application lock so that multi-step
//! operations (prune) see a stable graph between their steps.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::archive::Archiver;
use crate::config::{EngineConfig, LimitsSection};
use crate::dag::{Cascade, Resolver};
use crate::errors::{Result, TaskGraphError};
use crate::model::task::duration_ms;
use crate::model::{AuditEntry, FilterState, NewTask, Task, TaskStatus};
use crate::storage::{GraphCounts, SqliteStore, TxStore};
use crate::types::{now_utc, TaskId};

#[derive(Debug, Clone)]
pub struct TaskQueue {
    pub(super) store: SqliteStore,
    pub(super) archiver: Archiver,
    pub(super) limits: LimitsSection,
    pub(super) preview_depth: u32,
    pub(super) write_lock: Arc<Mutex<()>>,
}

impl TaskQueue {
    pub fn new(store: SqliteStore, archiver: Archiver, cfg: &EngineConfig) -> Self {
        Self {
            store,
            archiver,
            limits: cfg.limits.clone(),
            preview_depth: cfg.prune.preview_depth,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a task. It starts `Ready` without prerequisites; otherwise
    /// it is classified once all of its edges exist.
    pub async fn enqueue(&self, req: NewTask) -> Result<Task> {
        let req = self.validate_request(req)?;
        let priority = req.priority.unwrap_or(self.limits.default_priority);

        let _guard = self.write_lock.lock().await;
        let task = self
            .store
            .write(move |s| {
                for prerequisite in &req.prerequisites {
                    s.require_task(*prerequisite)?;
                }

                let now = now_utc();
                let mut task = Task::from_request(&req, priority, now);
                s.insert_task(&task)?;
                s.record_audit(&AuditEntry {
                    task_id: task.id,
                    from_status: None,
                    to_status: task.status,
                    note: Some("created".to_string()),
                    recorded_at: now,
                })?;

                for prerequisite in &req.prerequisites {
                    Resolver::check_new_edge(s, task.id, *prerequisite)?;
                    s.insert_edge(task.id, *prerequisite, now)?;
                }

                if !req.prerequisites.is_empty() {
                    let target = Resolver::classify(s, task.id)?;
                    if target != task.status {
                        s.transition(&mut task, target, Some("prerequisites resolved at creation"), now)?;
                    }
                }

                Ok(task)
            })
            .await?;

        info!(
            task = %task.id,
            status = %task.status,
            agent_type = %task.agent_type,
            "enqueued task"
        );
        Ok(task)
    }

    /// `Ready -> Running`.
    pub async fn start(&self, id: TaskId) -> Result<Task> {
        self.transition(id, &[TaskStatus::Ready], "start", TaskStatus::Running, None, |_, _| {
            Ok(None)
        })
        .await
    }

    /// `Running -> Completed`; promotes dependents whose prerequisites are
    /// now all complete.
    pub async fn complete(&self, id: TaskId) -> Result<Task> {
        self.transition(
            id,
            &[TaskStatus::Running],
            "complete",
            TaskStatus::Completed,
            None,
            |s, id| Resolver::on_task_completed(s, id).map(Some),
        )
        .await
    }

    /// `Running -> Failed`; blocks everything downstream still waiting.
    pub async fn fail(&self, id: TaskId, reason: &str) -> Result<Task> {
        let reason = reason.trim();
        let note = (!reason.is_empty()).then(|| reason.to_string());
        self.transition(
            id,
            &[TaskStatus::Running],
            "fail",
            TaskStatus::Failed,
            note,
            |s, id| Resolver::on_task_failed(s, id).map(Some),
        )
        .await
    }

    /// Cancel a pending, ready or running task and block its downstream
    /// subgraph.
    pub async fn cancel(&self, id: TaskId) -> Result<Task> {
        self.transition(
            id,
            &[TaskStatus::Pending, TaskStatus::Ready, TaskStatus::Running],
            "cancel",
            TaskStatus::Cancelled,
            None,
            |s, id| Resolver::on_task_cancelled(s, id).map(Some),
        )
        .await
    }

    /// Return a `Blocked` task to `Pending`/`Ready` once none of its
    /// prerequisites is failed, cancelled or blocked any more.
    pub async fn unblock(&self, id: TaskId) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let task = self
            .store
            .write(move |s| {
                let task = s.require_task(id)?;
                if task.status != TaskStatus::Blocked {
                    return Err(TaskGraphError::invalid_state(id, task.status, "unblock"));
                }

                let cascade = Resolver::reclassify(s, id, true)?;
                if cascade.is_empty() {
                    return Err(TaskGraphError::validation(format!(
                        "task {id} still has a failed, cancelled or blocked prerequisite"
                    )));
                }
                s.apply_cascade(&cascade, now_utc())?;
                s.require_task(id)
            })
            .await?;

        info!(task = %id, status = %task.status, "unblocked task");
        Ok(task)
    }

    /// Make `dependent` wait for `prerequisite`.
    ///
    /// A `Ready` dependent gaining an unfinished prerequisite drops back to
    /// `Pending`; gaining a failed, cancelled or blocked one blocks it and
    /// its downstream subgraph. A `Blocked` dependent stays blocked.
    pub async fn add_dependency(&self, dependent: TaskId, prerequisite: TaskId) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let task = self
            .store
            .write(move |s| {
                let task = s.require_task(dependent)?;
                s.require_task(prerequisite)?;
                ensure_editable(&task, "add a dependency to")?;
                if s.edge_exists(dependent, prerequisite)? {
                    return Err(TaskGraphError::validation(format!(
                        "{dependent} already depends on {prerequisite}"
                    )));
                }

                let now = now_utc();
                Resolver::check_new_edge(s, dependent, prerequisite)?;
                s.insert_edge(dependent, prerequisite, now)?;

                let cascade = Resolver::reclassify(s, dependent, false)?;
                s.apply_cascade(&cascade, now)?;
                s.require_task(dependent)
            })
            .await?;

        info!(%dependent, %prerequisite, status = %task.status, "added dependency");
        Ok(task)
    }

    /// Drop the edge `dependent -> prerequisite` and re-classify the
    /// dependent from its remaining prerequisites. This is one of the two
    /// ways a `Blocked` task recovers.
    pub async fn remove_dependency(&self, dependent: TaskId, prerequisite: TaskId) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let task = self
            .store
            .write(move |s| {
                let task = s.require_task(dependent)?;
                ensure_editable(&task, "remove a dependency from")?;
                if !s.remove_edge(dependent, prerequisite)? {
                    return Err(TaskGraphError::validation(format!(
                        "{dependent} does not depend on {prerequisite}"
                    )));
                }

                let cascade = Resolver::reclassify(s, dependent, true)?;
                s.apply_cascade(&cascade, now_utc())?;
                s.require_task(dependent)
            })
            .await?;

        info!(%dependent, %prerequisite, status = %task.status, "removed dependency");
        Ok(task)
    }

    /// Swap prerequisite `old` for `new` in one transaction. If the new edge
    /// is rejected the old one stays in place.
    pub async fn replace_dependency(
        &self,
        dependent: TaskId,
        old: TaskId,
        new: TaskId,
    ) -> Result<Task> {
        let _guard = self.write_lock.lock().await;
        let task = self
            .store
            .write(move |s| {
                let task = s.require_task(dependent)?;
                s.require_task(new)?;
                ensure_editable(&task, "replace a dependency of")?;
                if !s.remove_edge(dependent, old)? {
                    return Err(TaskGraphError::validation(format!(
                        "{dependent} does not depend on {old}"
                    )));
                }

                let now = now_utc();
                Resolver::check_new_edge(s, dependent, new)?;
                if !s.edge_exists(dependent, new)? {
                    s.insert_edge(dependent, new, now)?;
                }

                let cascade = Resolver::reclassify(s, dependent, true)?;
                s.apply_cascade(&cascade, now)?;
                s.require_task(dependent)
            })
            .await?;

        info!(%dependent, %old, %new, status = %task.status, "replaced dependency");
        Ok(task)
    }

    /// Every task the filter matches, in creation order.
    pub async fn list_filtered(&self, filter: &FilterState) -> Result<Vec<Task>> {
        let filter = filter.clone();
        let tasks = self
            .store
            .read(move |s| {
                Ok(s.list_tasks()?
                    .into_iter()
                    .filter(|t| filter.matches(t))
                    .collect::<Vec<_>>())
            })
            .await?;
        debug!(count = tasks.len(), "filtered listing");
        Ok(tasks)
    }

    pub async fn get(&self, id: TaskId) -> Result<Task> {
        self.store.read(move |s| s.require_task(id)).await
    }

    /// Recorded status changes of a task, oldest first.
    pub async fn history(&self, id: TaskId) -> Result<Vec<AuditEntry>> {
        self.store
            .read(move |s| {
                s.require_task(id)?;
                s.history(id)
            })
            .await
    }

    pub async fn counts(&self) -> Result<GraphCounts> {
        self.store.read(|s| s.counts()).await
    }

    async fn transition<F>(
        &self,
        id: TaskId,
        allowed: &'static [TaskStatus],
        action: &'static str,
        target: TaskStatus,
        note: Option<String>,
        plan: F,
    ) -> Result<Task>
    where
        F: FnOnce(&TxStore<'_>, TaskId) -> Result<Option<Cascade>> + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let (task, cascade) = self
            .store
            .write(move |s| {
                let mut task = s.require_task(id)?;
                if !allowed.contains(&task.status) {
                    return Err(TaskGraphError::invalid_state(id, task.status, action));
                }

                let now = now_utc();
                s.transition(&mut task, target, note.as_deref(), now)?;
                let cascade = plan(s, id)?;
                if let Some(cascade) = &cascade {
                    s.apply_cascade(cascade, now)?;
                }
                Ok((task, cascade))
            })
            .await
            .inspect_err(|e| {
                if matches!(e, TaskGraphError::InvalidState { .. }) {
                    warn!(task = %id, action, error = %e, "refused transition");
                }
            })?;

        match cascade {
            Some(cascade) if !cascade.is_empty() => info!(
                task = %id,
                status = %task.status,
                promoted = cascade.moved_to(TaskStatus::Ready).len(),
                blocked = cascade.moved_to(TaskStatus::Blocked).len(),
                "task {action} with cascade"
            ),
            _ => info!(task = %id, status = %task.status, "task {action}"),
        }
        Ok(task)
    }

    fn validate_request(&self, mut req: NewTask) -> Result<NewTask> {
        let limits = &self.limits;

        req.description = req.description.trim().to_string();
        if req.description.is_empty() {
            return Err(TaskGraphError::validation("description must not be empty"));
        }
        if req.description.chars().count() > limits.description_max_len {
            return Err(TaskGraphError::validation(format!(
                "description exceeds {} characters",
                limits.description_max_len
            )));
        }

        req.agent_type = req.agent_type.trim().to_string();
        if req.agent_type.is_empty() {
            return Err(TaskGraphError::validation("agent_type must not be empty"));
        }
        req.source = req.source.trim().to_string();
        if req.source.is_empty() {
            return Err(TaskGraphError::validation("source must not be empty"));
        }

        req.summary = req
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(summary) = &req.summary {
            if summary.chars().count() > limits.summary_max_len {
                return Err(TaskGraphError::validation(format!(
                    "summary exceeds {} characters",
                    limits.summary_max_len
                )));
            }
        }

        req.feature_branch = req
            .feature_branch
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());

        if let Some(priority) = req.priority {
            if priority < limits.priority_min || priority > limits.priority_max {
                return Err(TaskGraphError::validation(format!(
                    "priority {priority} outside {}..={}",
                    limits.priority_min, limits.priority_max
                )));
            }
        }

        if let Some(duration) = req.estimated_duration {
            if duration_ms(duration).is_none() {
                return Err(TaskGraphError::validation("estimated duration is too large"));
            }
        }

        let mut seen = HashSet::new();
        req.prerequisites.retain(|id| seen.insert(*id));

        Ok(req)
    }
}

fn ensure_editable(task: &Task, action: &str) -> Result<()> {
    if task.status.accepts_dependency_changes() {
        Ok(())
    } else {
        Err(TaskGraphError::invalid_state(task.id, task.status, action))
    }
}
