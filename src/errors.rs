// src/errors.rs

//! Crate-wide error type and the closed set of error kinds exposed to callers.

use std::fmt;

use thiserror::Error;
use tracing::error;

use crate::model::TaskStatus;
use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    #[error(
        "Cycle detected: making {prerequisite} a prerequisite of {dependent} would close a cycle"
    )]
    DependencyCycle {
        dependent: TaskId,
        prerequisite: TaskId,
    },

    #[error("Invalid state: cannot {action} task {task} while it is {status}")]
    InvalidState {
        task: TaskId,
        status: TaskStatus,
        action: String,
    },

    #[error("Archival error: {0}")]
    Archival(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Storage failures are logged where they are converted and surface
    /// without any backend detail in the message.
    #[error("internal storage failure")]
    Storage(#[source] tokio_rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error kinds as seen across the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Cycle,
    InvalidState,
    Archival,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Cycle => "cycle",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Archival => "archival",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl TaskGraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskGraphError::Validation(_)
            | TaskGraphError::SelfDependency(_)
            | TaskGraphError::ConfigError(_) => ErrorKind::Validation,
            TaskGraphError::TaskNotFound(_) => ErrorKind::NotFound,
            TaskGraphError::DependencyCycle { .. } => ErrorKind::Cycle,
            TaskGraphError::InvalidState { .. } => ErrorKind::InvalidState,
            TaskGraphError::Archival(_) => ErrorKind::Archival,
            TaskGraphError::IoError(_)
            | TaskGraphError::TomlError(_)
            | TaskGraphError::Storage(_)
            | TaskGraphError::Internal(_)
            | TaskGraphError::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TaskGraphError::Validation(msg.into())
    }

    pub fn invalid_state(task: TaskId, status: TaskStatus, action: impl Into<String>) -> Self {
        TaskGraphError::InvalidState {
            task,
            status,
            action: action.into(),
        }
    }
}

impl From<rusqlite::Error> for TaskGraphError {
    fn from(err: rusqlite::Error) -> Self {
        error!(error = %err, "storage operation failed");
        TaskGraphError::Storage(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<tokio_rusqlite::Error> for TaskGraphError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        error!(error = %err, "storage connection failed");
        TaskGraphError::Storage(err)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskGraphError>;
