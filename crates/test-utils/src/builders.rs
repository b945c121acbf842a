#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use taskgraph::config::{EngineConfig, RawEngineConfig};
use taskgraph::model::NewTask;
use taskgraph::types::TaskId;

/// Builder for `EngineConfig` to simplify test setup.
pub struct EngineConfigBuilder {
    config: RawEngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawEngineConfig::default();
        config.storage.path = ":memory:".into();
        config.archive.archived_by = "test-suite".to_string();
        Self { config }
    }

    pub fn storage_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.storage.path = path.as_ref().to_path_buf();
        self
    }

    pub fn archive_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.archive.dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn archived_by(mut self, who: &str) -> Self {
        self.config.archive.archived_by = who.to_string();
        self
    }

    pub fn summary_max_len(mut self, len: usize) -> Self {
        self.config.limits.summary_max_len = len;
        self
    }

    pub fn priority_range(mut self, min: i32, max: i32) -> Self {
        self.config.limits.priority_min = min;
        self.config.limits.priority_max = max;
        self.config.limits.default_priority = min;
        self
    }

    pub fn tree_max_nodes(mut self, nodes: usize) -> Self {
        self.config.limits.tree_max_nodes = nodes;
        self
    }

    pub fn preview_depth(mut self, depth: u32) -> Self {
        self.config.prune.preview_depth = depth;
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Enqueue request with test defaults for agent type and source.
pub fn new_task(description: &str) -> NewTask {
    NewTask::new(description, "test-agent", "test")
}

/// Like [`new_task`], depending on `after`.
pub fn new_task_after(description: &str, after: &[TaskId]) -> NewTask {
    new_task(description).prerequisites(after.iter().copied())
}

/// Like [`new_task_after`], with an estimated duration in milliseconds.
pub fn timed_task(description: &str, ms: u64, after: &[TaskId]) -> NewTask {
    new_task_after(description, after).estimated_duration(Duration::from_millis(ms))
}
