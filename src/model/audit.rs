// src/model/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TaskStatus;
use crate::types::TaskId;

/// One recorded status change of a task.
///
/// `from_status` is `None` for the entry written when the task is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub task_id: TaskId,
    #[serde(default)]
    pub from_status: Option<TaskStatus>,
    pub to_status: TaskStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
