//! Codebase annotation registry rows.

use super::table::{Entity, Table};
use crate::{Error, Result};
use crate::models::{AnnotationFields, CodebaseAnnotation};
use rusqlite::{Row, ToSql};

impl Entity for CodebaseAnnotation {
    const TABLE: &'static str = "codebase_annotations";
    const COLUMNS: &'static [&'static str] = &[
        "project_id",
        "id",
        "tag",
        "text",
        "file",
        "line",
        "context",
        "recent_scan_id",
        "deleted",
        "created_at",
        "updated_at",
    ];
    const KEY_COLUMNS: usize = 2;
    const KIND: &'static str = "Codebase annotation";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            project_id: row.get(0)?,
            id: row.get(1)?,
            fields: AnnotationFields {
                tag: row.get(2)?,
                text: row.get(3)?,
                file: row.get(4)?,
                line: row.get(5)?,
                context: row.get(6)?,
            },
            recent_scan_id: row.get(7)?,
            deleted: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        Ok(vec![
            Box::new(self.project_id.clone()),
            Box::new(self.id.clone()),
            Box::new(self.fields.tag.clone()),
            Box::new(self.fields.text.clone()),
            Box::new(self.fields.file.clone()),
            Box::new(self.fields.line),
            Box::new(self.fields.context.clone()),
            Box::new(self.recent_scan_id.clone()),
            Box::new(self.deleted),
            Box::new(self.created_at),
            Box::new(self.updated_at),
        ])
    }
}

impl Table<'_, CodebaseAnnotation> {
    /// A project's registry entry for an annotation id.
    pub fn get_in(&self, project_id: &str, id: &str) -> Result<Option<CodebaseAnnotation>> {
        self.find_one("project_id = ?1 AND id = ?2", [project_id, id])
    }

    /// Like [`get_in`](Self::get_in), failing with `NotFound` if absent.
    pub fn require_in(&self, project_id: &str, id: &str) -> Result<CodebaseAnnotation> {
        self.get_in(project_id, id)?.ok_or_else(|| {
            Error::NotFound(format!("annotation {} is not tracked in {}", id, project_id))
        })
    }

    /// Remove a project's registry entry. Returns whether a row was removed.
    pub fn delete_in(&self, project_id: &str, id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM codebase_annotations WHERE project_id = ?1 AND id = ?2",
            [project_id, id],
        )?;
        Ok(removed > 0)
    }

    /// Live registry entries anchored to a scan: the "old" side of the next diff.
    pub fn anchored_to(&self, project_id: &str, scan_id: &str) -> Result<Vec<CodebaseAnnotation>> {
        self.find(
            "project_id = ?1 AND recent_scan_id = ?2 AND deleted = 0 ORDER BY file, line, id",
            [project_id, scan_id],
        )
    }

    /// All live registry entries of a project.
    pub fn live_for_project(&self, project_id: &str) -> Result<Vec<CodebaseAnnotation>> {
        self.find(
            "project_id = ?1 AND deleted = 0 ORDER BY file, line, id",
            [project_id],
        )
    }
}
