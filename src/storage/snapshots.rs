//! Snapshot rows.
//!
//! Snapshots are append-only: after insertion only the `accepted` flag changes.

use super::table::{Entity, Table, json_column, to_json_column};
use crate::Result;
use crate::models::Snapshot;
use rusqlite::{Row, ToSql, params};

impl Entity for Snapshot {
    const TABLE: &'static str = "snapshots";
    const COLUMNS: &'static [&'static str] = &["id", "project_id", "created_at", "data", "accepted"];
    const KIND: &'static str = "Snapshot";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            created_at: row.get(2)?,
            data: json_column(row, 3)?,
            accepted: row.get(4)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.project_id.clone()),
            Box::new(self.created_at),
            to_json_column(&self.data)?,
            Box::new(self.accepted),
        ])
    }
}

impl Table<'_, Snapshot> {
    /// The baseline for the next scan: the most recently created accepted snapshot.
    ///
    /// Ties on `created_at` go to the later insert.
    pub fn latest_accepted(&self, project_id: &str) -> Result<Option<Snapshot>> {
        self.find_one(
            "project_id = ?1 AND accepted = 1 ORDER BY created_at DESC, rowid DESC",
            [project_id],
        )
    }

    /// All snapshots of a project, newest first.
    pub fn list_for_project(&self, project_id: &str) -> Result<Vec<Snapshot>> {
        self.find(
            "project_id = ?1 ORDER BY created_at DESC, rowid DESC",
            [project_id],
        )
    }

    /// Set the `accepted` flag, the only mutable column.
    pub fn set_accepted(&self, id: &str, accepted: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE snapshots SET accepted = ?2 WHERE id = ?1",
            params![id, accepted],
        )?;
        if changed == 0 {
            return Err(crate::Error::NotFound(format!("Snapshot not found: {}", id)));
        }
        Ok(())
    }
}
