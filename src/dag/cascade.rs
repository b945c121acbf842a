// src/dag/cascade.rs

//! Planned status updates produced by the resolver.
//!
//! A cascade is computed first and applied afterwards, inside the same
//! storage transaction as the status write that triggered it.

use std::fmt;

use serde::Serialize;

use crate::model::TaskStatus;
use crate::types::{short_id, TaskId};

/// What caused a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeCause {
    PrerequisiteCompleted,
    PrerequisiteFailed,
    PrerequisiteCancelled,
    PrerequisiteBlocked,
    DependenciesChanged,
}

/// A single planned change `from -> to` on one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Ordered list of status changes triggered by one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cascade {
    pub trigger: TaskId,
    pub cause: CascadeCause,
    pub changes: Vec<StatusChange>,
}

impl Cascade {
    pub fn new(trigger: TaskId, cause: CascadeCause) -> Self {
        Self {
            trigger,
            cause,
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, task_id: TaskId, from: TaskStatus, to: TaskStatus) {
        self.changes.push(StatusChange { task_id, from, to });
    }

    pub fn extend(&mut self, other: Cascade) {
        self.changes.extend(other.changes);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Ids of tasks this cascade moves into `status`.
    pub fn moved_to(&self, status: TaskStatus) -> Vec<TaskId> {
        self.changes
            .iter()
            .filter(|c| c.to == status)
            .map(|c| c.task_id)
            .collect()
    }

    /// Audit note recorded against every task the cascade touches.
    pub fn note(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trigger = short_id(&self.trigger);
        match self.cause {
            CascadeCause::PrerequisiteCompleted => write!(f, "prerequisite {trigger} completed"),
            CascadeCause::PrerequisiteFailed => write!(f, "prerequisite {trigger} failed"),
            CascadeCause::PrerequisiteCancelled => write!(f, "prerequisite {trigger} cancelled"),
            CascadeCause::PrerequisiteBlocked => write!(f, "upstream task {trigger} blocked"),
            CascadeCause::DependenciesChanged => {
                write!(f, "dependencies of {trigger} changed")
            }
        }
    }
}
