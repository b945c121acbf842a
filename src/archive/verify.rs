// src/archive/verify.rs

//! Structural validation of a written archive.
//!
//! Recoverable inconsistencies are collected into the report instead of
//! being raised, so a caller always learns everything wrong with a file in
//! one pass.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

use crate::archive::envelope::{ArchivedTask, REQUIRED_KEYS};
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub path: PathBuf,
    pub valid: bool,
    pub version: Option<String>,
    pub task_count: usize,
    pub dependency_count: usize,
    pub file_size: u64,
    /// blake3 digest of the file contents, hex encoded.
    pub checksum: String,
    pub errors: Vec<String>,
}

/// Inspect archive `bytes` read from `path`.
pub fn inspect(path: PathBuf, bytes: &[u8]) -> VerificationReport {
    let mut report = VerificationReport {
        path,
        valid: false,
        version: None,
        task_count: 0,
        dependency_count: 0,
        file_size: bytes.len() as u64,
        checksum: blake3::hash(bytes).to_hex().to_string(),
        errors: Vec::new(),
    };

    let doc: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            report.errors.push(format!("not a valid archive document: {e}"));
            return report;
        }
    };

    let Some(envelope) = doc.as_object() else {
        report.errors.push("archive root is not an object".to_string());
        return report;
    };

    for key in REQUIRED_KEYS {
        if !envelope.contains_key(key) {
            report.errors.push(format!("missing required field '{key}'"));
        }
    }

    report.version = envelope
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);
    if envelope.contains_key("version") && report.version.is_none() {
        report.errors.push("field 'version' is not a string".to_string());
    }

    if let Some(raw) = envelope.get("archived_at") {
        match raw.as_str().map(DateTime::parse_from_rfc3339) {
            Some(Ok(_)) => {}
            _ => report
                .errors
                .push("field 'archived_at' is not an RFC 3339 timestamp".to_string()),
        }
    }

    if let Some(raw) = envelope.get("tasks") {
        match raw.as_array() {
            Some(entries) => check_tasks(entries, &mut report),
            None => report.errors.push("field 'tasks' is not a list".to_string()),
        }
    }

    if let Some(stats) = envelope.get("statistics") {
        let (tasks, edges) = (report.task_count, report.dependency_count);
        check_statistics(stats, tasks, edges, &mut report.errors);
    }

    report.valid = report.errors.is_empty();
    report
}

fn check_tasks(entries: &[Value], report: &mut VerificationReport) {
    let mut seen: HashSet<TaskId> = HashSet::new();

    for (idx, entry) in entries.iter().enumerate() {
        let archived: ArchivedTask = match serde_json::from_value(entry.clone()) {
            Ok(a) => a,
            Err(e) => {
                report.errors.push(format!("tasks[{idx}]: malformed entry: {e}"));
                continue;
            }
        };

        let id = archived.task.id;
        report.task_count += 1;
        report.dependency_count += archived.dependencies.len();

        if !seen.insert(id) {
            report.errors.push(format!("tasks[{idx}]: duplicate task id {id}"));
        }

        for dep in &archived.dependencies {
            if dep.dependent_task_id != id {
                report.errors.push(format!(
                    "tasks[{idx}]: edge dependent {} does not match task {id}",
                    dep.dependent_task_id
                ));
            }
            if dep.prerequisite_task_id == dep.dependent_task_id {
                report
                    .errors
                    .push(format!("tasks[{idx}]: self-referencing edge on {id}"));
            }
        }

        for entry in &archived.audit_trail {
            if entry.task_id != id {
                report.errors.push(format!(
                    "tasks[{idx}]: audit entry for {} filed under task {id}",
                    entry.task_id
                ));
            }
        }
    }
}

fn check_statistics(stats: &Value, tasks: usize, edges: usize, errors: &mut Vec<String>) {
    let declared = |key: &str| stats.get(key).and_then(Value::as_u64);

    match declared("task_count") {
        Some(n) if n == tasks as u64 => {}
        Some(n) => errors.push(format!(
            "statistics.task_count is {n} but the archive holds {tasks} tasks"
        )),
        None => errors.push("statistics.task_count is missing".to_string()),
    }

    match declared("dependency_count") {
        Some(n) if n == edges as u64 => {}
        Some(n) => errors.push(format!(
            "statistics.dependency_count is {n} but the archive holds {edges} edges"
        )),
        None => errors.push("statistics.dependency_count is missing".to_string()),
    }
}

