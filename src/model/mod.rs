// src/model/mod.rs

//! Domain model: tasks, dependency edges, lifecycle states, filters and the
//! audit trail.

pub mod audit;
pub mod dependency;
pub mod filter;
pub mod status;
pub mod task;

pub use audit::AuditEntry;
pub use dependency::TaskDependency;
pub use filter::{FilterState, FilterStateBuilder};
pub use status::TaskStatus;
pub use task::{NewTask, Task};
