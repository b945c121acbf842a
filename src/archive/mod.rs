// src/archive/mod.rs

//! Export of task subtrees to self-describing JSON archives.
//!
//! - [`envelope`] defines the document layout.
//! - [`verify`] re-reads a written archive and validates its structure.

pub mod envelope;
pub mod verify;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::{Result, TaskGraphError};
use crate::fs::FileSystem;
use crate::model::{AuditEntry, Task, TaskDependency};
use crate::storage::SqliteStore;
use crate::types::{TaskId, ARCHIVE_FORMAT_VERSION};

pub use envelope::{ArchiveStatistics, ArchivedTask, TaskArchive};
pub use verify::VerificationReport;

/// Writes and verifies archives under one directory.
#[derive(Debug, Clone)]
pub struct Archiver {
    store: SqliteStore,
    dir: PathBuf,
    archived_by: String,
    fs: Arc<dyn FileSystem>,
}

impl Archiver {
    pub fn new(store: SqliteStore, cfg: &EngineConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            store,
            dir: cfg.archive.dir.clone(),
            archived_by: cfg.archive.archived_by.clone(),
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Build the envelope for `tasks`: their outgoing edges and audit trail
    /// are fetched in one batched read.
    pub async fn build(&self, tasks: &[Task], reason: &str) -> Result<TaskArchive> {
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        let (edges, audit) = self
            .store
            .read(move |s| Ok((s.edges_for_dependents(&ids)?, s.audit_for(&ids)?)))
            .await?;

        let mut edges_by_task: HashMap<TaskId, Vec<TaskDependency>> = HashMap::new();
        for edge in edges {
            edges_by_task.entry(edge.dependent_task_id).or_default().push(edge);
        }
        let mut audit_by_task: HashMap<TaskId, Vec<AuditEntry>> = HashMap::new();
        for entry in audit {
            audit_by_task.entry(entry.task_id).or_default().push(entry);
        }

        let archived: Vec<ArchivedTask> = tasks
            .iter()
            .map(|task| ArchivedTask {
                task: task.clone(),
                dependencies: edges_by_task.remove(&task.id).unwrap_or_default(),
                audit_trail: audit_by_task.remove(&task.id).unwrap_or_default(),
            })
            .collect();

        Ok(TaskArchive {
            version: ARCHIVE_FORMAT_VERSION.to_string(),
            archived_at: Utc::now(),
            archived_by: self.archived_by.clone(),
            reason: reason.to_string(),
            statistics: ArchiveStatistics::of(&archived),
            tasks: archived,
        })
    }

    /// Archive `tasks` and return the path of the written file.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// the returned path either holds a complete archive or does not exist.
    pub async fn archive(&self, tasks: &[Task], reason: &str) -> Result<PathBuf> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TaskGraphError::validation("archive reason must not be empty"));
        }

        let envelope = self.build(tasks, reason).await?;
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| TaskGraphError::Archival(format!("serializing archive: {e}")))?;

        let path = self.dir.join(archive_file_name(reason));
        let fs = Arc::clone(&self.fs);
        let target = path.clone();
        tokio::task::spawn_blocking(move || fs.write_atomic(&target, &bytes))
            .await
            .map_err(|e| TaskGraphError::Archival(format!("archive writer panicked: {e}")))?
            .map_err(|e| {
                warn!(path = %path.display(), error = %e, "archive write failed");
                TaskGraphError::Archival(format!("{e:#}"))
            })?;

        info!(
            path = %path.display(),
            tasks = envelope.statistics.task_count,
            dependencies = envelope.statistics.dependency_count,
            "wrote archive"
        );
        Ok(path)
    }

    /// Re-read and validate an archive. Structural problems are reported in
    /// the result; only an unreadable file is an error.
    pub async fn verify(&self, path: impl AsRef<Path>) -> Result<VerificationReport> {
        let path = path.as_ref().to_path_buf();
        let fs = Arc::clone(&self.fs);
        let source = path.clone();
        let bytes = tokio::task::spawn_blocking(move || fs.read(&source))
            .await
            .map_err(|e| TaskGraphError::Archival(format!("archive reader panicked: {e}")))?
            .map_err(|e| TaskGraphError::Archival(format!("{e:#}")))?;

        let report = verify::inspect(path, &bytes);
        if !report.valid {
            warn!(path = %report.path.display(), errors = report.errors.len(), "archive failed verification");
        }
        Ok(report)
    }
}

/// `archive-<utc timestamp>-<reason>-<random>.json`, with the reason reduced
/// to filename-safe characters.
fn archive_file_name(reason: &str) -> String {
    let slug: String = reason
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(40)
        .collect();
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let mut nonce = Uuid::new_v4().simple().to_string();
    nonce.truncate(8);
    format!("archive-{stamp}-{slug}-{nonce}.json")
}
