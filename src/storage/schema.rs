// src/storage/schema.rs

use rusqlite::Connection;
use tracing::{debug, info};

/// Value written to `PRAGMA user_version` once migrations ran.
pub const SCHEMA_VERSION: i32 = 3;

const PRAGMAS: &str = "
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA foreign_keys=ON;
    PRAGMA busy_timeout=5000;
";

/// Version-1 tables. Columns added later live in [`ADDITIVE_COLUMNS`] so
/// that databases created by older builds are upgraded in place.
const BASE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id            TEXT PRIMARY KEY,
        description   TEXT NOT NULL,
        status        TEXT NOT NULL,
        agent_type    TEXT NOT NULL,
        source        TEXT NOT NULL,
        priority      INTEGER NOT NULL DEFAULT 0,
        created_at    TEXT NOT NULL,
        started_at    TEXT,
        completed_at  TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_status  ON tasks(status);
    CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);

    CREATE TABLE IF NOT EXISTS task_dependencies (
        dependent_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        prerequisite_id  TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        created_at       TEXT NOT NULL,
        PRIMARY KEY (dependent_id, prerequisite_id),
        CHECK (dependent_id <> prerequisite_id)
    );

    CREATE INDEX IF NOT EXISTS idx_deps_prerequisite ON task_dependencies(prerequisite_id);

    CREATE TABLE IF NOT EXISTS task_audit_log (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id      TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        from_status  TEXT,
        to_status    TEXT NOT NULL,
        note         TEXT,
        recorded_at  TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_task ON task_audit_log(task_id);
";

/// `(table, column, declaration)` for nullable columns added after v1.
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("tasks", "summary", "TEXT"),
    ("tasks", "feature_branch", "TEXT"),
    ("tasks", "estimated_duration_secs", "INTEGER"),
    ("tasks", "estimated_duration_ms", "INTEGER"),
];

/// v2 stored whole seconds; carry them over once the millisecond column exists.
const BACKFILL_DURATION_MS: &str = "
    UPDATE tasks
       SET estimated_duration_ms = estimated_duration_secs * 1000
     WHERE estimated_duration_ms IS NULL
       AND estimated_duration_secs IS NOT NULL
";

/// Bring the schema up to date. Safe to run on every open.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.execute_batch(BASE_SCHEMA)?;

    for (table, column, decl) in ADDITIVE_COLUMNS {
        if column_exists(conn, table, column)? {
            continue;
        }
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))?;
        info!(table, column, "added missing column");

        if *column == "estimated_duration_ms" {
            let carried = conn.execute(BACKFILL_DURATION_MS, [])?;
            info!(rows = carried, "converted estimated durations to milliseconds");
        }
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "schema up to date");
    Ok(())
}

/// Whether `table` already has `column`, via `PRAGMA table_info`.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
