// src/engine/mod.rs

//! Engine wiring for taskgraph.
//!
//! This module ties together:
//! - the SQLite store
//! - the task queue service (the only writer of the graph)
//! - the read-only traversal engine
//! - the archiver used by prune
//!
//! All semantics live in [`queue`], [`prune`] and the `dag` module; the
//! [`Engine`] itself only builds and hands out the services.

pub mod prune;
pub mod queue;

use std::sync::Arc;

use tracing::debug;

use crate::archive::Archiver;
use crate::config::EngineConfig;
use crate::dag::Traversal;
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::storage::SqliteStore;

pub use prune::{PruneResult, SkippedTask};
pub use queue::TaskQueue;

/// A fully wired engine over one store.
#[derive(Debug, Clone)]
pub struct Engine {
    store: SqliteStore,
    queue: TaskQueue,
    traversal: Traversal,
    archiver: Archiver,
}

impl Engine {
    /// Open the store named in `cfg` and write archives to the real
    /// filesystem.
    pub async fn open(cfg: &EngineConfig) -> Result<Self> {
        Self::open_with_fs(cfg, Arc::new(RealFileSystem)).await
    }

    pub async fn open_with_fs(cfg: &EngineConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let store = SqliteStore::open(&cfg.storage.path).await?;
        Ok(Self::with_store(store, cfg, fs))
    }

    /// Wire the services around an already opened store.
    pub fn with_store(store: SqliteStore, cfg: &EngineConfig, fs: Arc<dyn FileSystem>) -> Self {
        let archiver = Archiver::new(store.clone(), cfg, fs);
        let queue = TaskQueue::new(store.clone(), archiver.clone(), cfg);
        let traversal = Traversal::new(store.clone(), cfg.limits.tree_max_nodes);
        debug!(archive_dir = %archiver.dir().display(), "engine wired");

        Self {
            store,
            queue,
            traversal,
            archiver,
        }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    pub fn archiver(&self) -> &Archiver {
        &self.archiver
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}
