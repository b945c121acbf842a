// src/storage/rows.rs

//! Row <-> domain conversions. Ids are stored as hyphenated UUID text,
//! timestamps as RFC 3339 UTC text and statuses as their upper-case names.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use crate::model::{AuditEntry, Task, TaskDependency, TaskStatus};

/// Column list matching [`task_from_row`]; the table must be aliased `t`.
pub const TASK_COLUMNS: &str = "t.id, t.description, t.summary, t.status, t.agent_type, \
     t.source, t.feature_branch, t.estimated_duration_ms, t.priority, \
     t.created_at, t.started_at, t.completed_at";

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, e))
    })
    .transpose()
}

fn status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<TaskStatus> {
    let raw: String = row.get(idx)?;
    raw.parse::<TaskStatus>().map_err(|e| {
        conversion_err(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

fn opt_status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<TaskStatus>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(_) => status_at(row, idx).map(Some),
    }
}

pub fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let duration: Option<i64> = row.get(7)?;
    let estimated_duration_ms = duration
        .map(|d| u64::try_from(d).map_err(|e| conversion_err(7, e)))
        .transpose()?;

    Ok(Task {
        id: id_at(row, 0)?,
        description: row.get(1)?,
        summary: row.get(2)?,
        status: status_at(row, 3)?,
        agent_type: row.get(4)?,
        source: row.get(5)?,
        feature_branch: row.get(6)?,
        estimated_duration_ms,
        priority: row.get(8)?,
        created_at: ts_at(row, 9)?,
        started_at: opt_ts_at(row, 10)?,
        completed_at: opt_ts_at(row, 11)?,
    })
}

/// Expects `dependent_id, prerequisite_id, created_at`.
pub fn dependency_from_row(row: &Row<'_>) -> rusqlite::Result<TaskDependency> {
    Ok(TaskDependency {
        dependent_task_id: id_at(row, 0)?,
        prerequisite_task_id: id_at(row, 1)?,
        created_at: ts_at(row, 2)?,
    })
}

/// Expects `task_id, from_status, to_status, note, recorded_at`.
pub fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        task_id: id_at(row, 0)?,
        from_status: opt_status_at(row, 1)?,
        to_status: status_at(row, 2)?,
        note: row.get(3)?,
        recorded_at: ts_at(row, 4)?,
    })
}
