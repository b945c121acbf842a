// src/storage/mod.rs

//! SQLite persistence for tasks, dependency edges and the audit trail.
//!
//! - [`schema`] creates tables and applies additive column migrations.
//! - [`rows`] maps rows to domain types and back.
//! - [`store`] owns the async connection and hands out transactions.
//! - [`tx`] is the synchronous row-level API used inside a transaction.

pub mod rows;
pub mod schema;
pub mod store;
pub mod tx;

pub use store::SqliteStore;
pub use tx::{GraphCounts, TxStore};
