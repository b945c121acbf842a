// src/types.rs

//! Small shared types used across the engine.

use uuid::Uuid;

/// Canonical task identifier used throughout the engine.
pub type TaskId = Uuid;

/// Format version written into every archive envelope.
pub const ARCHIVE_FORMAT_VERSION: &str = "1.0";

/// Parse a task identifier supplied by a caller.
pub fn parse_task_id(raw: &str) -> crate::errors::Result<TaskId> {
    Uuid::parse_str(raw.trim()).map_err(|e| {
        crate::errors::TaskGraphError::validation(format!("invalid task id '{raw}': {e}"))
    })
}

/// Short, human-friendly prefix of a task id for tree and list output.
pub fn short_id(id: &TaskId) -> String {
    let mut s = id.to_string();
    s.truncate(8);
    s
}

/// Current time at the precision timestamps are stored with, so values read
/// back from storage compare equal to the ones handed out.
pub fn now_utc() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(6)
}
