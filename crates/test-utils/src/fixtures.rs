#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use taskgraph::config::EngineConfig;
use taskgraph::dag::Traversal;
use taskgraph::engine::{Engine, TaskQueue};
use taskgraph::fs::mock::MockFileSystem;
use taskgraph::fs::{FileSystem, RealFileSystem};
use taskgraph::model::{Task, TaskStatus};
use taskgraph::storage::SqliteStore;
use taskgraph::types::TaskId;
use tempfile::TempDir;

use crate::builders::{new_task, new_task_after, EngineConfigBuilder};

/// An engine over an in-memory store, archiving into a private temp dir.
pub struct TestEngine {
    pub engine: Engine,
    pub config: EngineConfig,
    /// Present when built with [`TestEngine::with_mock_fs`].
    pub mock_fs: Option<MockFileSystem>,
    dir: TempDir,
}

impl TestEngine {
    /// Archives go to the real filesystem under a temp dir.
    pub async fn new() -> Self {
        Self::build(None, |b| b).await
    }

    /// Archives go to an in-memory filesystem whose writes can be failed.
    pub async fn with_mock_fs() -> Self {
        Self::build(Some(MockFileSystem::new()), |b| b).await
    }

    pub async fn with_config(tweak: impl FnOnce(EngineConfigBuilder) -> EngineConfigBuilder) -> Self {
        Self::build(None, tweak).await
    }

    async fn build(
        mock_fs: Option<MockFileSystem>,
        tweak: impl FnOnce(EngineConfigBuilder) -> EngineConfigBuilder,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = tweak(EngineConfigBuilder::new().archive_dir(dir.path().join("archive"))).build();

        let fs: Arc<dyn FileSystem> = match &mock_fs {
            Some(mock) => Arc::new(mock.clone()),
            None => Arc::new(RealFileSystem),
        };
        let store = SqliteStore::open_in_memory().await.expect("open in-memory store");
        let engine = Engine::with_store(store, &config, fs);

        Self {
            engine,
            config,
            mock_fs,
            dir,
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        self.engine.queue()
    }

    pub fn traversal(&self) -> &Traversal {
        self.engine.traversal()
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.config.archive.dir.clone()
    }

    pub fn temp_path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub async fn add(&self, description: &str) -> Task {
        self.queue()
            .enqueue(new_task(description))
            .await
            .expect("enqueue task")
    }

    pub async fn add_after(&self, description: &str, after: &[TaskId]) -> Task {
        self.queue()
            .enqueue(new_task_after(description, after))
            .await
            .expect("enqueue dependent task")
    }

    /// `n` tasks where each depends on the previous one.
    pub async fn chain(&self, n: usize) -> Vec<Task> {
        let mut tasks: Vec<Task> = Vec::with_capacity(n);
        for i in 0..n {
            let after: Vec<TaskId> = tasks.last().map(|t| vec![t.id]).unwrap_or_default();
            tasks.push(self.add_after(&format!("step {i}"), &after).await);
        }
        tasks
    }

    /// `a <- b`, `a <- c`, `b <- d`, `c <- d`.
    pub async fn diamond(&self) -> Diamond {
        let a = self.add("a").await;
        let b = self.add_after("b", &[a.id]).await;
        let c = self.add_after("c", &[a.id]).await;
        let d = self.add_after("d", &[b.id, c.id]).await;
        Diamond { a, b, c, d }
    }

    /// Drive a ready task through `start` and `complete`.
    pub async fn finish(&self, id: TaskId) -> Task {
        self.queue().start(id).await.expect("start task");
        self.queue().complete(id).await.expect("complete task")
    }

    /// Drive a ready task through `start` and `fail`.
    pub async fn break_task(&self, id: TaskId, reason: &str) -> Task {
        self.queue().start(id).await.expect("start task");
        self.queue().fail(id, reason).await.expect("fail task")
    }

    pub async fn status(&self, id: TaskId) -> TaskStatus {
        self.queue().get(id).await.expect("get task").status
    }
}

pub struct Diamond {
    pub a: Task,
    pub b: Task,
    pub c: Task,
    pub d: Task,
}
