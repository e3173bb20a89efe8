//! Project rows.

use super::table::{Entity, Table, json_column, optional_json_column, to_json_column};
use crate::models::Project;
use crate::{Error, Result};
use rusqlite::{Row, ToSql};

impl Entity for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] =
        &["id", "owner_id", "name", "repo", "scan_config", "created_at"];
    const KIND: &'static str = "Project";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            repo: optional_json_column(row, 3)?,
            scan_config: json_column(row, 4)?,
            created_at: row.get(5)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        let repo: Option<String> = self.repo.as_ref().map(serde_json::to_string).transpose()?;
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.owner_id.clone()),
            Box::new(self.name.clone()),
            Box::new(repo),
            to_json_column(&self.scan_config)?,
            Box::new(self.created_at),
        ])
    }
}

impl Table<'_, Project> {
    /// Projects owned by `owner_id`, oldest first.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        self.find("owner_id = ?1 ORDER BY created_at ASC", [owner_id])
    }

    /// Get a project the caller owns.
    ///
    /// A project owned by someone else is reported as not found so callers
    /// cannot probe for other owners' ids.
    pub fn require_owned(&self, id: &str, owner_id: &str) -> Result<Project> {
        match self.get(id)? {
            Some(project) if project.owner_id == owner_id => Ok(project),
            _ => Err(Error::NotFound(format!("Project not found: {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Project, RepoLink, TagRule};
    use crate::test_utils::TestEnv;

    #[test]
    fn test_project_round_trips_config_and_repo() {
        let env = TestEnv::new();
        let storage = env.open_storage();

        let mut project = Project::new("proj-00000001".into(), "ana".into(), "widgets".into());
        project.repo = Some(RepoLink::parse("github:octo/widgets").unwrap());
        project.scan_config.tags.push(TagRule::named("FIXME"));
        project.scan_config.branch = Some("main".into());
        storage.projects().insert(&project).unwrap();

        let loaded = storage.projects().require("proj-00000001").unwrap();
        assert_eq!(loaded.repo, project.repo);
        assert_eq!(loaded.scan_config, project.scan_config);
        assert_eq!(loaded.created_at, project.created_at);
    }

    #[test]
    fn test_require_owned_hides_foreign_projects() {
        let env = TestEnv::new();
        let (storage, project) = env.storage_with_project("ana");

        assert!(storage.projects().require_owned(&project.id, "ana").is_ok());
        let err = storage
            .projects()
            .require_owned(&project.id, "bo")
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotFound(_)));
    }

    #[test]
    fn test_list_for_owner() {
        let env = TestEnv::new();
        let (storage, _) = env.storage_with_project("ana");
        assert_eq!(storage.projects().list_for_owner("ana").unwrap().len(), 1);
        assert!(storage.projects().list_for_owner("bo").unwrap().is_empty());
    }
}
