//! Storage layer for Logbook data.
//!
//! Everything lives in one SQLite database (`logbook.db`) under the data
//! directory (`$LB_DATA_DIR`, else `~/.local/share/logbook/`). Access goes
//! through typed [`Table`]s; store-specific queries are grouped by entity:
//!
//! - `projects` - projects and their scan configuration
//! - `snapshots` - append-only annotation snapshots
//! - `envelopes` - diff envelopes and supersession
//! - `registry` - codebase annotation registry
//! - `tasks` - tasks, tags and task-tag links

pub mod envelopes;
pub mod projects;
pub mod registry;
pub mod snapshots;
pub mod table;
pub mod tasks;

pub use table::{Entity, Table};

use crate::models::{CodebaseAnnotation, DiffEnvelope, Project, Snapshot, Tag, Task, TaskTag};
use crate::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LB_DATA_DIR";

/// Database file name inside the data directory.
pub const DB_FILE: &str = "logbook.db";

/// Current schema version, stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Storage manager holding one SQLite connection.
pub struct Storage {
    /// Directory holding the database
    pub root: PathBuf,
    conn: Connection,
}

impl Storage {
    /// Open (creating if needed) the database in the default data directory.
    pub fn open() -> Result<Self> {
        Self::open_in(&data_dir()?)
    }

    /// Open (creating if needed) the database in `root`.
    pub fn open_in(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let conn = Connection::open(root.join(DB_FILE))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: root.to_path_buf(),
            conn,
        })
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                repo TEXT,
                scan_config TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);

            -- Append-only; only `accepted` is ever updated
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL,
                accepted INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_baseline
                ON snapshots(project_id, accepted, created_at);

            CREATE TABLE IF NOT EXISTS diff_envelopes (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                old_snapshot_id TEXT,
                new_snapshot_id TEXT NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                branch TEXT,
                commit_sha TEXT,
                commit_msg TEXT,
                commit_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (new_snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_envelopes_project
                ON diff_envelopes(project_id, created_at);

            -- At most one PENDING envelope per project
            CREATE UNIQUE INDEX IF NOT EXISTS idx_envelopes_one_pending
                ON diff_envelopes(project_id) WHERE status = 'PENDING';

            -- Extractor ids are only unique within one project
            CREATE TABLE IF NOT EXISTS codebase_annotations (
                project_id TEXT NOT NULL,
                id TEXT NOT NULL,
                tag TEXT NOT NULL,
                text TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                context TEXT,
                recent_scan_id TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, id),
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_annotations_scan
                ON codebase_annotations(project_id, recent_scan_id);

            -- codebase_task_id may dangle after an unlink; no foreign key
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                project_id TEXT,
                codebase_task_id TEXT,
                title TEXT NOT NULL,
                description TEXT,
                progress TEXT NOT NULL DEFAULT 'UNSTARTED',
                priority TEXT NOT NULL DEFAULT 'LOW',
                visibility TEXT NOT NULL DEFAULT 'PRIVATE',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_codebase_link
                ON tasks(project_id, codebase_task_id) WHERE codebase_task_id IS NOT NULL;

            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (owner_id, title)
            );

            CREATE TABLE IF NOT EXISTS task_tags (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                tag_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (task_id, tag_id),
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_task_tags_tag ON task_tags(tag_id);
            "#,
        )?;

        Self::run_migrations(conn)?;

        Ok(())
    }

    /// Run database migrations for schema changes.
    fn run_migrations(conn: &Connection) -> Result<()> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(Error::Other(format!(
                "Database schema version {} is newer than this build supports ({})",
                version, SCHEMA_VERSION
            )));
        }
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// The underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction, taking the database write lock up front.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn projects(&self) -> Table<'_, Project> {
        Table::new(&self.conn)
    }

    pub fn snapshots(&self) -> Table<'_, Snapshot> {
        Table::new(&self.conn)
    }

    pub fn envelopes(&self) -> Table<'_, DiffEnvelope> {
        Table::new(&self.conn)
    }

    pub fn registry(&self) -> Table<'_, CodebaseAnnotation> {
        Table::new(&self.conn)
    }

    pub fn tasks(&self) -> Table<'_, Task> {
        Table::new(&self.conn)
    }

    pub fn tags(&self) -> Table<'_, Tag> {
        Table::new(&self.conn)
    }

    pub fn task_tags(&self) -> Table<'_, TaskTag> {
        Table::new(&self.conn)
    }
}

/// Resolve the data directory.
///
/// Uses `$LB_DATA_DIR` when set, otherwise `~/.local/share/logbook/`.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(base.join("logbook"))
}

/// Generate a unique ID.
///
/// Format: `<prefix>-<8 hex chars>`, e.g. `lb-1a2b3c4d` for tasks.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..8])
}
