// src/model/dependency.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::TaskId;

/// Directed edge: `dependent_task_id` waits for `prerequisite_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub dependent_task_id: TaskId,
    pub prerequisite_task_id: TaskId,
    pub created_at: DateTime<Utc>,
}
