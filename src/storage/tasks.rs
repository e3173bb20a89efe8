//! Task, tag and task-tag link rows.

use super::generate_id;
use super::table::{Entity, Table};
use crate::models::{Tag, Task, TaskTag};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{Row, ToSql, params};

impl Entity for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "owner_id",
        "project_id",
        "codebase_task_id",
        "title",
        "description",
        "progress",
        "priority",
        "visibility",
        "created_at",
        "updated_at",
    ];
    const KIND: &'static str = "Task";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            project_id: row.get(2)?,
            codebase_task_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            progress: row.get(6)?,
            priority: row.get(7)?,
            visibility: row.get(8)?,
            tags: Vec::new(),
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.owner_id.clone()),
            Box::new(self.project_id.clone()),
            Box::new(self.codebase_task_id.clone()),
            Box::new(self.title.clone()),
            Box::new(self.description.clone()),
            Box::new(self.progress),
            Box::new(self.priority),
            Box::new(self.visibility),
            Box::new(self.created_at),
            Box::new(self.updated_at),
        ])
    }
}

impl Table<'_, Task> {
    /// Fill in tag titles and drop a codebase link whose registry entry is gone.
    pub fn hydrate(&self, mut task: Task) -> Result<Task> {
        let mut stmt = self.conn.prepare(
            "SELECT g.title FROM task_tags tt JOIN tags g ON g.id = tt.tag_id
             WHERE tt.task_id = ?1 ORDER BY g.title",
        )?;
        task.tags = stmt
            .query_map([&task.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        if let Some(annotation_id) = &task.codebase_task_id {
            let live: bool = self.conn.query_row(
                "SELECT COUNT(*) > 0 FROM codebase_annotations WHERE project_id = ?1 AND id = ?2",
                params![task.project_id, annotation_id],
                |row| row.get(0),
            )?;
            if !live {
                task.codebase_task_id = None;
            }
        }
        Ok(task)
    }

    /// Load a task with tags and a resolved codebase link.
    pub fn load(&self, id: &str) -> Result<Task> {
        let task = self.require(id)?;
        self.hydrate(task)
    }

    /// The project task whose stored link points at `annotation_id`.
    pub fn linked_to(&self, project_id: &str, annotation_id: &str) -> Result<Option<Task>> {
        self.find_one(
            "project_id = ?1 AND codebase_task_id = ?2",
            [project_id, annotation_id],
        )
    }

    /// Clear stale links to `annotation_id` so a new task can take it over.
    pub fn detach_annotation(&self, project_id: &str, annotation_id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE tasks SET codebase_task_id = NULL, updated_at = ?3
             WHERE project_id = ?1 AND codebase_task_id = ?2",
            params![project_id, annotation_id, Utc::now()],
        )?)
    }

    /// Tasks visible to an owner, optionally limited to one project.
    pub fn list_for_owner(&self, owner_id: &str, project_id: Option<&str>) -> Result<Vec<Task>> {
        let tasks = match project_id {
            Some(project_id) => self.find(
                "owner_id = ?1 AND project_id = ?2 ORDER BY created_at ASC, rowid ASC",
                [owner_id, project_id],
            )?,
            None => self.find(
                "owner_id = ?1 ORDER BY created_at ASC, rowid ASC",
                [owner_id],
            )?,
        };
        tasks.into_iter().map(|t| self.hydrate(t)).collect()
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static [&'static str] = &["id", "owner_id", "title", "created_at"];
    const KIND: &'static str = "Tag";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.owner_id.clone()),
            Box::new(self.title.clone()),
            Box::new(self.created_at),
        ])
    }
}

impl Table<'_, Tag> {
    /// Get the owner's tag with this title, creating it if absent.
    pub fn upsert(&self, owner_id: &str, title: &str) -> Result<Tag> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("tag title must not be empty".to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (id, owner_id, title, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                generate_id("tag", &format!("{}/{}", owner_id, title)),
                owner_id,
                title,
                Utc::now()
            ],
        )?;
        self.find_one("owner_id = ?1 AND title = ?2", [owner_id, title])?
            .ok_or_else(|| Error::NotFound(format!("Tag not found: {}", title)))
    }
}

impl Entity for TaskTag {
    const TABLE: &'static str = "task_tags";
    const COLUMNS: &'static [&'static str] =
        &["id", "task_id", "tag_id", "created_at", "updated_at"];
    const KIND: &'static str = "Task tag link";

    fn key(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            tag_id: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn values(&self) -> Result<Vec<Box<dyn ToSql>>> {
        Ok(vec![
            Box::new(self.id.clone()),
            Box::new(self.task_id.clone()),
            Box::new(self.tag_id.clone()),
            Box::new(self.created_at),
            Box::new(self.updated_at),
        ])
    }
}

impl Table<'_, TaskTag> {
    pub fn for_task(&self, task_id: &str) -> Result<Vec<TaskTag>> {
        self.find("task_id = ?1 ORDER BY created_at, rowid", [task_id])
    }

    /// Refresh a link's `updated_at`.
    pub fn touch(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE task_tags SET updated_at = ?2 WHERE id = ?1",
            params![id, Utc::now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{AnnotationFields, CodebaseAnnotation, Task};
    use crate::test_utils::TestEnv;

    #[test]
    fn test_tag_upsert_is_stable_per_owner() {
        let env = TestEnv::new();
        let storage = env.open_storage();
        let tags = storage.tags();

        let first = tags.upsert("ana", "backend").unwrap();
        let again = tags.upsert("ana", " backend ").unwrap();
        let other_owner = tags.upsert("bo", "backend").unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other_owner.id);
        assert!(tags.upsert("ana", "  ").is_err());
    }

    #[test]
    fn test_hydrate_drops_dangling_link() {
        let env = TestEnv::new();
        let (storage, project) = env.storage_with_project("ana");

        let mut task = Task::new("lb-00000001".into(), "ana".into(), "Fix parser".into());
        task.project_id = Some(project.id.clone());
        task.codebase_task_id = Some("ann-1".into());
        storage.tasks().insert(&task).unwrap();
        assert_eq!(storage.tasks().load(&task.id).unwrap().codebase_task_id, None);

        storage
            .registry()
            .insert(&CodebaseAnnotation::new(
                "ann-1".into(),
                project.id.clone(),
                AnnotationFields {
                    tag: "TODO".into(),
                    text: "Fix parser".into(),
                    file: "a.rs".into(),
                    line: 1,
                    context: None,
                },
                "s1".into(),
            ))
            .unwrap();
        assert_eq!(
            storage.tasks().load(&task.id).unwrap().codebase_task_id.as_deref(),
            Some("ann-1")
        );
    }

    #[test]
    fn test_codebase_link_is_one_to_one_per_project() {
        let env = TestEnv::new();
        let (storage, project) = env.storage_with_project("ana");
        let other = env.add_project(&storage, "ana");

        let linked = |id: &str, project_id: &str| {
            let mut task = Task::new(id.into(), "ana".into(), id.into());
            task.project_id = Some(project_id.to_string());
            task.codebase_task_id = Some("ann-1".into());
            task
        };
        let a = linked("lb-0000000a", &project.id);
        let b = linked("lb-0000000b", &project.id);
        let c = linked("lb-0000000c", &other.id);

        storage.tasks().insert(&a).unwrap();
        assert!(storage.tasks().insert(&b).is_err());
        storage.tasks().insert(&c).unwrap();

        assert_eq!(storage.tasks().detach_annotation(&project.id, "ann-1").unwrap(), 1);
        assert!(storage.tasks().insert(&b).is_ok());
        let kept = storage.tasks().linked_to(&other.id, "ann-1").unwrap().unwrap();
        assert_eq!(kept.id, c.id);
    }
}
