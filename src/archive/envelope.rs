// src/archive/envelope.rs

//! On-disk archive format.
//!
//! Readers ignore unknown keys so older builds can still open archives that
//! newer builds extend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AuditEntry, Task, TaskDependency};

/// Top-level keys every archive must carry.
pub const REQUIRED_KEYS: [&str; 6] = [
    "version",
    "archived_at",
    "archived_by",
    "reason",
    "tasks",
    "statistics",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArchive {
    pub version: String,
    pub archived_at: DateTime<Utc>,
    pub archived_by: String,
    pub reason: String,
    pub tasks: Vec<ArchivedTask>,
    pub statistics: ArchiveStatistics,
}

/// One task with its outgoing edges (this task as the dependent) and its
/// audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTask {
    pub task: Task,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    pub task_count: usize,
    pub dependency_count: usize,
}

impl ArchiveStatistics {
    pub fn of(tasks: &[ArchivedTask]) -> Self {
        Self {
            task_count: tasks.len(),
            dependency_count: tasks.iter().map(|t| t.dependencies.len()).sum(),
        }
    }
}
