// src/storage/tx.rs

//! Synchronous row-level API, valid for the lifetime of one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::dag::{Cascade, GraphView, Reached};
use crate::errors::{Result, TaskGraphError};
use crate::model::{AuditEntry, Task, TaskDependency, TaskStatus};
use crate::storage::rows::{
    audit_from_row, dependency_from_row, fmt_ts, id_at, task_from_row, TASK_COLUMNS,
};
use crate::types::TaskId;

/// Ids per `IN (...)` batch; well below SQLite's bound-parameter limit.
const ID_CHUNK: usize = 500;

/// Total number of stored tasks and dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub tasks: usize,
    pub dependencies: usize,
}

/// Row-level access inside an open transaction.
///
/// Handed out by [`SqliteStore::read`](super::SqliteStore::read) and
/// [`SqliteStore::write`](super::SqliteStore::write); nothing here commits.
pub struct TxStore<'a> {
    conn: &'a Connection,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl<'a> TxStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ---------------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------------

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1");
        let task = self
            .conn
            .query_row(&sql, params![id.to_string()], task_from_row)
            .optional()?;
        Ok(task)
    }

    pub fn require_task(&self, id: TaskId) -> Result<Task> {
        self.get_task(id)?.ok_or(TaskGraphError::TaskNotFound(id))
    }

    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let duration = task
            .estimated_duration_ms
            .map(i64::try_from)
            .transpose()
            .map_err(|_| TaskGraphError::validation("estimated duration is too large"))?;

        self.conn.execute(
            "INSERT INTO tasks (id, description, summary, status, agent_type, source,
                                feature_branch, estimated_duration_ms, priority,
                                created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                task.id.to_string(),
                task.description,
                task.summary,
                task.status.as_str(),
                task.agent_type,
                task.source,
                task.feature_branch,
                duration,
                task.priority,
                fmt_ts(&task.created_at),
                task.started_at.as_ref().map(fmt_ts),
                task.completed_at.as_ref().map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    fn update_status(&self, task: &Task) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1, started_at = ?2, completed_at = ?3 WHERE id = ?4",
            params![
                task.status.as_str(),
                task.started_at.as_ref().map(fmt_ts),
                task.completed_at.as_ref().map(fmt_ts),
                task.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(TaskGraphError::TaskNotFound(task.id));
        }
        Ok(())
    }

    /// Move `task` to `target`, persist it and append an audit entry.
    pub fn transition(
        &self,
        task: &mut Task,
        target: TaskStatus,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let from = task.status;
        task.transition(target, now)?;
        self.update_status(task)?;
        self.record_audit(&AuditEntry {
            task_id: task.id,
            from_status: Some(from),
            to_status: target,
            note: note.map(str::to_string),
            recorded_at: now,
        })
    }

    /// Apply a planned cascade. Each change is checked against the stored
    /// status first; a mismatch means the plan is stale and the whole
    /// transaction is abandoned.
    pub fn apply_cascade(&self, cascade: &Cascade, now: DateTime<Utc>) -> Result<()> {
        let note = cascade.note();
        for change in &cascade.changes {
            let mut task = self.require_task(change.task_id)?;
            if task.status != change.from {
                return Err(TaskGraphError::Internal(format!(
                    "cascade conflict on task {}: expected {}, found {}",
                    change.task_id, change.from, task.status
                )));
            }
            self.transition(&mut task, change.to, Some(&note), now)?;
        }
        if !cascade.is_empty() {
            debug!(trigger = %cascade.trigger, changes = cascade.len(), "applied cascade");
        }
        Ok(())
    }

    /// Every task, in creation order.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!("SELECT {TASK_COLUMNS} FROM tasks t ORDER BY t.created_at, t.rowid"),
            [],
        )
    }

    /// Tasks with the given ids, in creation order. Unknown ids are skipped.
    pub fn tasks_by_ids(&self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT {TASK_COLUMNS}, t.rowid FROM tasks t WHERE t.id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.to_string())), |row| {
                Ok((task_from_row(row)?, row.get::<_, i64>(12)?))
            })?;
            for row in rows {
                tasks.push(row?);
            }
        }
        tasks.sort_by(|(a, ra), (b, rb)| a.created_at.cmp(&b.created_at).then(ra.cmp(rb)));
        Ok(tasks.into_iter().map(|(t, _)| t).collect())
    }

    /// Delete tasks; their edges and audit entries go with them.
    pub fn delete_tasks(&self, ids: &[TaskId]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!("DELETE FROM tasks WHERE id IN ({})", placeholders(chunk.len()));
            deleted += self
                .conn
                .execute(&sql, params_from_iter(chunk.iter().map(|id| id.to_string())))?;
        }
        Ok(deleted)
    }

    pub fn counts(&self) -> Result<GraphCounts> {
        let tasks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        let dependencies: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM task_dependencies", [], |row| row.get(0))?;
        Ok(GraphCounts {
            tasks: usize::try_from(tasks).unwrap_or(0),
            dependencies: usize::try_from(dependencies).unwrap_or(0),
        })
    }

    fn query_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, task_from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    // ---------------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------------

    pub fn insert_edge(&self, dependent: TaskId, prerequisite: TaskId, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO task_dependencies (dependent_id, prerequisite_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![dependent.to_string(), prerequisite.to_string(), fmt_ts(&now)],
        )?;
        Ok(())
    }

    /// Returns whether an edge was removed.
    pub fn remove_edge(&self, dependent: TaskId, prerequisite: TaskId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM task_dependencies WHERE dependent_id = ?1 AND prerequisite_id = ?2",
            params![dependent.to_string(), prerequisite.to_string()],
        )?;
        Ok(removed > 0)
    }

    pub fn edge_exists(&self, dependent: TaskId, prerequisite: TaskId) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM task_dependencies WHERE dependent_id = ?1 AND prerequisite_id = ?2",
                params![dependent.to_string(), prerequisite.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn ids_for(&self, sql: &str, id: TaskId) -> Result<Vec<TaskId>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![id.to_string()], |row| id_at(row, 0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Outgoing edges (task -> its prerequisites) of every id in `ids`.
    pub fn edges_for_dependents(&self, ids: &[TaskId]) -> Result<Vec<TaskDependency>> {
        let mut edges = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT dependent_id, prerequisite_id, created_at FROM task_dependencies
                 WHERE dependent_id IN ({}) ORDER BY rowid",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(|id| id.to_string())),
                dependency_from_row,
            )?;
            for row in rows {
                edges.push(row?);
            }
        }
        Ok(edges)
    }

    // ---------------------------------------------------------------------
    // Audit trail
    // ---------------------------------------------------------------------

    pub fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO task_audit_log (task_id, from_status, to_status, note, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.task_id.to_string(),
                entry.from_status.map(|s| s.as_str()),
                entry.to_status.as_str(),
                entry.note,
                fmt_ts(&entry.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn history(&self, id: TaskId) -> Result<Vec<AuditEntry>> {
        self.audit_for(&[id])
    }

    /// Audit entries for every id in `ids`, oldest first.
    pub fn audit_for(&self, ids: &[TaskId]) -> Result<Vec<AuditEntry>> {
        let mut entries = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = format!(
                "SELECT task_id, from_status, to_status, note, recorded_at FROM task_audit_log
                 WHERE task_id IN ({}) ORDER BY id",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(|id| id.to_string())),
                audit_from_row,
            )?;
            for row in rows {
                entries.push(row?);
            }
        }
        Ok(entries)
    }

    // ---------------------------------------------------------------------
    // Closure queries
    // ---------------------------------------------------------------------

    /// Prerequisite closure of `id` via a recursive CTE, one row per task at
    /// its minimum depth.
    pub fn ancestors(&self, id: TaskId, max_depth: Option<u32>) -> Result<Vec<Reached>> {
        self.closure(
            "SELECT prerequisite_id, 1 FROM task_dependencies WHERE dependent_id = ?1
             UNION
             SELECT d.prerequisite_id, w.depth + 1
             FROM task_dependencies d JOIN walk w ON d.dependent_id = w.id
             WHERE ?2 IS NULL OR w.depth < ?2",
            id,
            max_depth,
        )
    }

    /// Dependent closure of `id`.
    pub fn descendants(&self, id: TaskId, max_depth: Option<u32>) -> Result<Vec<Reached>> {
        self.closure(
            "SELECT dependent_id, 1 FROM task_dependencies WHERE prerequisite_id = ?1
             UNION
             SELECT d.dependent_id, w.depth + 1
             FROM task_dependencies d JOIN walk w ON d.prerequisite_id = w.id
             WHERE ?2 IS NULL OR w.depth < ?2",
            id,
            max_depth,
        )
    }

    fn closure(&self, walk: &str, id: TaskId, max_depth: Option<u32>) -> Result<Vec<Reached>> {
        let sql = format!(
            "WITH RECURSIVE walk(id, depth) AS ({walk})
             SELECT {TASK_COLUMNS}, MIN(w.depth) AS depth
             FROM walk w JOIN tasks t ON t.id = w.id
             WHERE t.id <> ?1
             GROUP BY t.id
             ORDER BY depth, t.created_at, t.rowid"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![id.to_string(), max_depth], |row| {
            let depth: i64 = row.get(12)?;
            Ok(Reached {
                task: task_from_row(row)?,
                depth: u32::try_from(depth).unwrap_or(u32::MAX),
            })
        })?;
        let mut reached = Vec::new();
        for row in rows {
            reached.push(row?);
        }
        Ok(reached)
    }

    /// `root` plus its descendants (optionally depth-bounded), in creation
    /// order, and every edge between two members of that set.
    pub fn subgraph(
        &self,
        root: TaskId,
        max_depth: Option<u32>,
    ) -> Result<(Vec<Task>, Vec<TaskDependency>)> {
        let mut ids = vec![root];
        ids.extend(self.descendants(root, max_depth)?.into_iter().map(|r| r.task.id));

        let tasks = self.tasks_by_ids(&ids)?;
        let members: std::collections::HashSet<TaskId> = ids.iter().copied().collect();
        let edges = self
            .edges_for_dependents(&ids)?
            .into_iter()
            .filter(|e| members.contains(&e.prerequisite_task_id))
            .collect();

        Ok((tasks, edges))
    }

    /// Tasks with no edges in either direction, in creation order.
    pub fn orphans(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks t
                 WHERE NOT EXISTS (SELECT 1 FROM task_dependencies d WHERE d.dependent_id = t.id)
                   AND NOT EXISTS (SELECT 1 FROM task_dependencies d WHERE d.prerequisite_id = t.id)
                 ORDER BY t.created_at, t.rowid"
            ),
            [],
        )
    }

    /// Tasks nothing depends on, in creation order.
    pub fn leaves(&self) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks t
                 WHERE NOT EXISTS (SELECT 1 FROM task_dependencies d WHERE d.prerequisite_id = t.id)
                 ORDER BY t.created_at, t.rowid"
            ),
            [],
        )
    }
}

impl GraphView for TxStore<'_> {
    fn status_of(&self, id: TaskId) -> Result<Option<TaskStatus>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| s.parse::<TaskStatus>().map_err(TaskGraphError::Internal))
            .transpose()
    }

    fn prerequisites_of(&self, id: TaskId) -> Result<Vec<TaskId>> {
        self.ids_for(
            "SELECT prerequisite_id FROM task_dependencies WHERE dependent_id = ?1 ORDER BY rowid",
            id,
        )
    }

    fn dependents_of(&self, id: TaskId) -> Result<Vec<TaskId>> {
        self.ids_for(
            "SELECT dependent_id FROM task_dependencies WHERE prerequisite_id = ?1 ORDER BY rowid",
            id,
        )
    }
}
