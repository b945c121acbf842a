// src/storage/store.rs

use std::fmt;
use std::path::Path;

use rusqlite::TransactionBehavior;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::errors::Result;
use crate::storage::schema;
use crate::storage::tx::TxStore;

/// Handle to the task database.
///
/// Cheap to clone: every clone talks to the same background connection
/// thread, so calls are serialized and each `read`/`write` closure runs as
/// one uninterrupted unit.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to
    /// date. `":memory:"` opens an ephemeral store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory().await;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        info!(path = %path.display(), "opened task store");
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                schema::migrate(conn)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Run `f` inside an immediate write transaction. The transaction is
    /// committed only when `f` returns `Ok`; otherwise it rolls back and
    /// `f`'s error is returned unchanged.
    pub async fn write<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TxStore<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let outcome = f(&TxStore::new(&tx));
                if outcome.is_ok() {
                    tx.commit()?;
                }
                Ok(outcome)
            })
            .await?
    }

    /// Run `f` inside a read transaction that is never committed.
    pub async fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TxStore<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
                Ok(f(&TxStore::new(&tx)))
            })
            .await?
    }

    /// Escape hatch for schema-level work in tests and migrations.
    pub async fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let out = self.conn.call(move |conn| Ok(f(conn)?)).await?;
        Ok(out)
    }
}
