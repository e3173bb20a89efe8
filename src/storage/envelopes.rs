//! Diff envelope rows.

use super::table::{Entity, Table, json_column, to_json_column};
use crate::models::{CommitInfo, DiffEnvelope, EnvelopeStatus};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{Row, ToSql, params};

impl Entity for DiffEnvelope {
    const TABLE: &'static str = "diff_envelopes";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "project_id",
        "old_snapshot_id",
        "new_snapshot_id",
        "data",
        "status",
        "branch",
        "commit_sha",
        "commit_msg",
        "commit_url",
        "created_at",
        "updated_at",
    ];
    const KIND: &'static str = "Diff";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let branch: Option<String> = row.get(6)?;
        let sha: Option<String> = row.get(7)?;
        let commit = match (branch, sha) {
            (Some(branch), Some(sha)) => Some(CommitInfo {
                branch,
                sha,
                message: row.get(8)?,
                url: row.get(9)?,
            }),
            _ => None,
        };
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            old_snapshot_id: row.get(2)?,
            new_snapshot_id: row.get(3)?,
            data: json_column(row, 4)?,
            status: row.get(5)?,
            commit,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        let commit = self.commit.as_ref();
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.project_id.clone()),
            Box::new(self.old_snapshot_id.clone()),
            Box::new(self.new_snapshot_id.clone()),
            to_json_column(&self.data)?,
            Box::new(self.status),
            Box::new(commit.map(|c| c.branch.clone())),
            Box::new(commit.map(|c| c.sha.clone())),
            Box::new(commit.and_then(|c| c.message.clone())),
            Box::new(commit.and_then(|c| c.url.clone())),
            Box::new(self.created_at),
            Box::new(self.updated_at),
        ])
    }
}

impl Table<'_, DiffEnvelope> {
    /// Envelopes of a project, newest first.
    pub fn list_for_project(&self, project_id: &str) -> Result<Vec<DiffEnvelope>> {
        self.find(
            "project_id = ?1 ORDER BY created_at DESC, rowid DESC",
            [project_id],
        )
    }

    /// The project's PENDING envelope, if any.
    pub fn pending(&self, project_id: &str) -> Result<Option<DiffEnvelope>> {
        self.find_one("project_id = ?1 AND status = 'PENDING'", [project_id])
    }

    /// Number of PENDING envelopes for a project (never more than one).
    pub fn pending_count(&self, project_id: &str) -> Result<usize> {
        self.count("project_id = ?1 AND status = 'PENDING'", [project_id])
    }

    /// Get an envelope that belongs to `project_id`.
    pub fn require_for_project(&self, id: &str, project_id: &str) -> Result<DiffEnvelope> {
        match self.get(id)? {
            Some(envelope) if envelope.project_id == project_id => Ok(envelope),
            _ => Err(Error::NotFound(format!(
                "Diff {} not found in project {}",
                id, project_id
            ))),
        }
    }

    /// Move every PENDING envelope of the project to IGNORED.
    ///
    /// Returns the ids that were superseded.
    pub fn supersede_pending(&self, project_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .find("project_id = ?1 AND status = 'PENDING'", [project_id])?
            .into_iter()
            .map(|envelope| envelope.id)
            .collect();
        self.conn.execute(
            "UPDATE diff_envelopes SET status = ?2, updated_at = ?3
             WHERE project_id = ?1 AND status = 'PENDING'",
            params![project_id, EnvelopeStatus::Ignored, Utc::now()],
        )?;
        Ok(ids)
    }

    pub fn set_status(&self, id: &str, status: EnvelopeStatus) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE diff_envelopes SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, Utc::now()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("Diff not found: {}", id)));
        }
        Ok(())
    }
}
