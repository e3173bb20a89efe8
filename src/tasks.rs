//! Task upsert with tag-link reconciliation.
//!
//! Creating and editing a task go through [`upsert`]: the caller hands over
//! the task fields plus the complete set of tag titles the task should carry,
//! and the current links are brought in line with [`diff_keyed`].

use crate::linkdiff::diff_keyed;
use crate::models::{Priority, Progress, Tag, Task, TaskTag, Visibility};
use crate::storage::{Table, generate_id};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::Connection;

/// Fields for creating or editing a task. `None` leaves a field as it is
/// (or at its default for a new task).
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    /// Existing task to edit; a new id is generated when absent
    pub id: Option<String>,
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub progress: Option<Progress>,
    pub priority: Option<Priority>,
    pub visibility: Option<Visibility>,
}

impl TaskInput {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Outcome of reconciling one task's tag links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

/// Create or update a task and set its tags to exactly `desired_tags`.
///
/// Editing a task owned by someone else fails with `Unauthorized`. Tag titles
/// are upserted per owner; duplicates and surrounding whitespace are ignored.
pub fn upsert(
    conn: &Connection,
    input: TaskInput,
    desired_tags: &[String],
    owner_id: &str,
) -> Result<Task> {
    let tasks: Table<'_, Task> = Table::new(conn);

    if let Some(project_id) = &input.project_id {
        Table::<crate::models::Project>::new(conn).require_owned(project_id, owner_id)?;
    }

    let existing = match &input.id {
        Some(id) => tasks.get(id)?,
        None => None,
    };

    let task = match existing {
        Some(mut task) => {
            if task.owner_id != owner_id {
                return Err(Error::Unauthorized(format!(
                    "task {} belongs to another owner",
                    task.id
                )));
            }
            apply(&mut task, input)?;
            task.updated_at = Utc::now();
            tasks.update(&task)?;
            task
        }
        None => {
            let title = input
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| Error::Validation("task title must not be empty".to_string()))?
                .to_string();
            let id = input
                .id
                .clone()
                .unwrap_or_else(|| generate_id("lb", &format!("{}/{}", owner_id, title)));
            let mut task = Task::new(id, owner_id.to_string(), title);
            apply(&mut task, input)?;
            tasks.insert(&task)?;
            task
        }
    };

    let changes = set_tags(conn, &task.id, desired_tags, owner_id)?;
    tracing::debug!(
        task = %task.id,
        added = changes.added,
        removed = changes.removed,
        kept = changes.kept,
        "task upserted"
    );

    tasks.load(&task.id)
}

fn apply(task: &mut Task, input: TaskInput) -> Result<()> {
    if let Some(title) = input.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("task title must not be empty".to_string()));
        }
        task.title = title.to_string();
    }
    if input.project_id.is_some() {
        task.project_id = input.project_id;
    }
    if input.description.is_some() {
        task.description = input.description;
    }
    if let Some(progress) = input.progress {
        task.progress = progress;
    }
    if let Some(priority) = input.priority {
        task.priority = priority;
    }
    if let Some(visibility) = input.visibility {
        task.visibility = visibility;
    }
    Ok(())
}

/// Bring a task's tag links in line with `desired_tags`.
///
/// Links only in the desired set are inserted, links only in the current set
/// are deleted, and links in both keep their id with `updated_at` refreshed.
pub fn set_tags(
    conn: &Connection,
    task_id: &str,
    desired_tags: &[String],
    owner_id: &str,
) -> Result<TagChanges> {
    let tags: Table<'_, Tag> = Table::new(conn);
    let links: Table<'_, TaskTag> = Table::new(conn);

    let desired = desired_tags
        .iter()
        .map(|title| tags.upsert(owner_id, title))
        .collect::<Result<Vec<Tag>>>()?;
    let current = links.for_task(task_id)?;

    let diff = diff_keyed(current, desired, |l| l.tag_id.clone(), |t| t.id.clone());

    for tag in &diff.added {
        links.insert(&TaskTag::new(task_id, &tag.id))?;
    }
    for link in &diff.removed {
        links.delete(&link.id)?;
    }
    for (link, _) in &diff.kept {
        links.touch(&link.id)?;
    }

    Ok(TagChanges {
        added: diff.added.len(),
        removed: diff.removed.len(),
        kept: diff.kept.len(),
    })
}
