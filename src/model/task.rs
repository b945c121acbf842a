// src/model/task.rs

//! The task entity and the request used to enqueue one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, TaskGraphError};
use crate::model::TaskStatus;
use crate::types::TaskId;

/// A unit of work tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub status: TaskStatus,
    pub agent_type: String,
    pub source: String,
    #[serde(default)]
    pub feature_branch: Option<String>,
    /// Estimated duration in milliseconds.
    #[serde(default)]
    pub estimated_duration_ms: Option<u64>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a fresh task from an enqueue request.
    ///
    /// The request must already have been validated; the initial status is
    /// `Ready` when there are no prerequisites, otherwise `Pending`.
    pub(crate) fn from_request(req: &NewTask, priority: i32, now: DateTime<Utc>) -> Self {
        let status = if req.prerequisites.is_empty() {
            TaskStatus::Ready
        } else {
            TaskStatus::Pending
        };

        Self {
            id: Uuid::new_v4(),
            description: req.description.trim().to_string(),
            summary: req.summary.clone(),
            status,
            agent_type: req.agent_type.clone(),
            source: req.source.clone(),
            feature_branch: req.feature_branch.clone(),
            estimated_duration_ms: req.estimated_duration.and_then(duration_ms),
            priority,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the task to `target`, maintaining the timestamp invariants:
    /// `started_at` is set on entering `Running`, `completed_at` on entering
    /// any terminal state. Timestamps never go backwards.
    pub fn transition(&mut self, target: TaskStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(TaskGraphError::invalid_state(
                self.id,
                self.status,
                format!("move to {target}"),
            ));
        }

        let floor = self
            .started_at
            .unwrap_or(self.created_at)
            .max(self.created_at);
        let at = now.max(floor);

        if target == TaskStatus::Running {
            self.started_at = Some(at);
        }
        if target.is_terminal() {
            self.completed_at = Some(at);
        }

        self.status = target;
        Ok(())
    }
}

/// Millisecond count of `duration`, or `None` when it does not fit the
/// signed 64-bit storage column.
pub fn duration_ms(duration: Duration) -> Option<u64> {
    u64::try_from(duration.as_millis())
        .ok()
        .filter(|ms| i64::try_from(*ms).is_ok())
}

/// Request to enqueue a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub description: String,
    pub agent_type: String,
    pub source: String,
    pub prerequisites: Vec<TaskId>,
    pub summary: Option<String>,
    pub feature_branch: Option<String>,
    pub estimated_duration: Option<Duration>,
    /// `None` uses the configured default priority.
    pub priority: Option<i32>,
}

impl NewTask {
    pub fn new(
        description: impl Into<String>,
        agent_type: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            agent_type: agent_type.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn after(mut self, prerequisite: TaskId) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    pub fn prerequisites(mut self, prerequisites: impl IntoIterator<Item = TaskId>) -> Self {
        self.prerequisites.extend(prerequisites);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn feature_branch(mut self, branch: impl Into<String>) -> Self {
        self.feature_branch = Some(branch.into());
        self
    }

    pub fn estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = Some(duration);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}
