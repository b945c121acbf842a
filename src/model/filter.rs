// src/model/filter.rs

//! Immutable predicate over task attributes.
//!
//! A [`FilterState`] is built once per query and passed explicitly into
//! listing and pruning calls. All populated criteria are combined with AND;
//! the status set is matched with OR.

use std::collections::BTreeSet;

use crate::errors::{Result, TaskGraphError};
use crate::model::{Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    statuses: Option<BTreeSet<TaskStatus>>,
    agent_type: Option<String>,
    feature_branch: Option<String>,
    search: Option<String>,
}

impl FilterState {
    /// A filter that matches every task.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn builder() -> FilterStateBuilder {
        FilterStateBuilder::default()
    }

    /// Whether no criteria are populated.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_none()
            && self.agent_type.is_none()
            && self.feature_branch.is_none()
            && self.search.is_none()
    }

    pub fn statuses(&self) -> Option<&BTreeSet<TaskStatus>> {
        self.statuses.as_ref()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }

        if let Some(needle) = &self.agent_type {
            if !contains_ci(&task.agent_type, needle) {
                return false;
            }
        }

        if let Some(needle) = &self.feature_branch {
            match &task.feature_branch {
                Some(branch) if contains_ci(branch, needle) => {}
                _ => return false,
            }
        }

        if let Some(needle) = &self.search {
            let in_description = contains_ci(&task.description, needle);
            let in_summary = task
                .summary
                .as_deref()
                .is_some_and(|s| contains_ci(s, needle));
            if !in_description && !in_summary {
                return false;
            }
        }

        true
    }
}

/// `needle` is stored lower-cased by the builder.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Builder for [`FilterState`]. Blank strings leave a criterion unset, so it
/// can be fed raw user input directly.
#[derive(Debug, Clone, Default)]
pub struct FilterStateBuilder {
    inner: FilterState,
}

impl FilterStateBuilder {
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.inner
            .statuses
            .get_or_insert_with(BTreeSet::new)
            .insert(status);
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        for status in statuses {
            self = self.status(status);
        }
        self
    }

    /// Parse a comma-separated status list such as `"running,completed"`.
    pub fn statuses_from_str(self, raw: &str) -> Result<Self> {
        let mut parsed = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let status = part
                .parse::<TaskStatus>()
                .map_err(TaskGraphError::Validation)?;
            parsed.push(status);
        }
        Ok(self.statuses(parsed))
    }

    pub fn agent_type(mut self, needle: impl AsRef<str>) -> Self {
        self.inner.agent_type = normalise(needle.as_ref());
        self
    }

    pub fn feature_branch(mut self, needle: impl AsRef<str>) -> Self {
        self.inner.feature_branch = normalise(needle.as_ref());
        self
    }

    pub fn search(mut self, needle: impl AsRef<str>) -> Self {
        self.inner.search = normalise(needle.as_ref());
        self
    }

    pub fn build(self) -> FilterState {
        self.inner
    }
}

fn normalise(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
