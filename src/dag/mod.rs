// src/dag/mod.rs

//! Dependency graph logic.
//!
//! - [`graph`] holds an in-memory snapshot of (part of) the task graph, used
//!   for topological ordering, critical-path computation and tree rendering.
//! - [`resolver`] decides which statuses change when a task finishes or its
//!   dependencies are edited, and rejects edges that would close a cycle.
//! - [`cascade`] defines the planned status changes the resolver produces.
//! - [`traversal`] answers read-only structural queries against storage.
//! - [`tree`] renders a descendant subgraph as indented text.

pub mod cascade;
pub mod graph;
pub mod resolver;
pub mod traversal;
pub mod tree;

pub use cascade::{Cascade, CascadeCause, StatusChange};
pub use graph::{DagGraph, WeightedPath};
pub use resolver::Resolver;
pub use traversal::{CriticalPath, Reached, Traversal};

use crate::errors::Result;
use crate::model::TaskStatus;
use crate::types::TaskId;

/// Read access to task statuses and dependency edges.
///
/// The resolver only ever talks to the graph through this trait, so the same
/// planning code runs inside a storage transaction and against an in-memory
/// [`DagGraph`].
pub trait GraphView {
    /// Status of a task, or `None` if it does not exist.
    fn status_of(&self, id: TaskId) -> Result<Option<TaskStatus>>;

    /// Tasks that `id` depends on.
    fn prerequisites_of(&self, id: TaskId) -> Result<Vec<TaskId>>;

    /// Tasks that depend on `id`.
    fn dependents_of(&self, id: TaskId) -> Result<Vec<TaskId>>;
}
