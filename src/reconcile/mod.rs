//! Reconciliation engine.
//!
//! Applies a reviewed diff envelope: the envelope's new snapshot is accepted or
//! rejected, and when approved each user decision mutates the task store and
//! the annotation registry. The whole batch runs in one `IMMEDIATE`
//! transaction so a concurrent scan cannot supersede the envelope halfway;
//! every decision runs in its own savepoint so a failing decision is rolled
//! back alone and reported.

use crate::linkdiff::diff_keyed;
use crate::models::{
    AnnotationFields, CodebaseAnnotation, DiffEnvelope, DiffItem, EnvelopeStatus, Priority,
    Progress, Project, Snapshot, Task,
};
use crate::storage::{Storage, Table};
use crate::tasks::{self, TaskInput};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::Span;

/// Longest title derived from annotation text.
const MAX_DERIVED_TITLE: usize = 120;

/// A reconciliation decision kind, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Confirm,
    Complete,
    Delete,
    Unlink,
    Ignore,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Some(Action::Create),
            "CONFIRM" => Some(Action::Confirm),
            "COMPLETE" => Some(Action::Complete),
            "DELETE" => Some(Action::Delete),
            "UNLINK" => Some(Action::Unlink),
            "IGNORE" => Some(Action::Ignore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Confirm => "CONFIRM",
            Action::Complete => "COMPLETE",
            Action::Delete => "DELETE",
            Action::Unlink => "UNLINK",
            Action::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to [`Reconciler::reconcile`].
#[derive(Debug, Clone, Default)]
pub struct ReconcileRequest {
    pub project_id: String,
    pub owner_id: String,
    pub envelope_id: String,
    /// Action name to annotation ids
    pub decisions: BTreeMap<String, Vec<String>>,
    /// Annotation id to task title
    pub titles: HashMap<String, String>,
    pub approved: bool,
}

impl ReconcileRequest {
    /// Queue `action` for `annotation_id`.
    pub fn decide(&mut self, action: &str, annotation_id: &str) {
        self.decisions
            .entry(action.to_string())
            .or_default()
            .push(annotation_id.to_string());
    }
}

/// A decision that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied {
    pub action: Action,
    pub annotation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// A decision that failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub action: Action,
    pub annotation_id: String,
    pub error: String,
}

/// Outcome of a reconcile call.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub envelope_id: String,
    pub snapshot_id: String,
    pub status: EnvelopeStatus,
    pub applied: Vec<Applied>,
    pub failures: Vec<Failure>,
    /// Action names that were not recognised
    pub skipped: Vec<String>,
    /// Registry entries re-anchored to the new snapshot
    pub advanced: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Applies reviewed envelopes to one database.
pub struct Reconciler<'a> {
    storage: &'a mut Storage,
    span: Span,
}

impl<'a> Reconciler<'a> {
    pub fn new(storage: &'a mut Storage, span: Span) -> Self {
        Self { storage, span }
    }

    /// Accept or reject an envelope and apply the decisions.
    ///
    /// Ownership and envelope lookups abort the call; individual decisions
    /// fail on their own and are listed in the report.
    pub fn reconcile(&mut self, req: &ReconcileRequest) -> Result<ReconcileReport> {
        let tx = self.storage.transaction()?;

        let project = Table::<Project>::new(&tx).require_owned(&req.project_id, &req.owner_id)?;
        let envelopes: Table<'_, DiffEnvelope> = Table::new(&tx);
        let envelope = envelopes.require_for_project(&req.envelope_id, &project.id)?;
        match (envelope.status, req.approved) {
            (EnvelopeStatus::Ignored, _) => {
                return Err(Error::Validation(format!(
                    "diff {} was superseded by a newer scan",
                    envelope.id
                )));
            }
            // An accepted diff may take further decisions but cannot be undone.
            (EnvelopeStatus::Rejected, _) | (EnvelopeStatus::Accepted, false) => {
                return Err(Error::Validation(format!(
                    "diff {} was already {}",
                    envelope.id,
                    envelope.status.as_str().to_ascii_lowercase()
                )));
            }
            _ => {}
        }

        let snapshots: Table<'_, Snapshot> = Table::new(&tx);
        snapshots.set_accepted(&envelope.new_snapshot_id, req.approved)?;
        let status = if req.approved {
            EnvelopeStatus::Accepted
        } else {
            EnvelopeStatus::Rejected
        };
        envelopes.set_status(&envelope.id, status)?;

        let mut report = ReconcileReport {
            envelope_id: envelope.id.clone(),
            snapshot_id: envelope.new_snapshot_id.clone(),
            status,
            applied: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            advanced: 0,
        };

        if req.approved {
            let snapshot = snapshots.require(&envelope.new_snapshot_id)?;
            let batch = Batch {
                conn: &tx,
                req,
                project: &project,
                envelope: &envelope,
                snapshot: &snapshot,
                span: &self.span,
            };
            batch.apply_all(&mut report)?;
            report.advanced = advance_anchors(&tx, &project.id, &snapshot)?;
        }

        tx.commit()?;

        tracing::info!(
            parent: &self.span,
            project = %project.id,
            envelope = %report.envelope_id,
            status = %report.status,
            applied = report.applied.len(),
            failed = report.failures.len(),
            advanced = report.advanced,
            "reconciled"
        );
        Ok(report)
    }
}

/// Decisions of one approved envelope.
struct Batch<'r> {
    conn: &'r Connection,
    req: &'r ReconcileRequest,
    project: &'r Project,
    envelope: &'r DiffEnvelope,
    snapshot: &'r Snapshot,
    span: &'r Span,
}

impl Batch<'_> {
    fn apply_all(&self, report: &mut ReconcileReport) -> Result<()> {
        let mut queue: Vec<(Action, &String)> = Vec::new();
        for (name, ids) in &self.req.decisions {
            match Action::parse(name) {
                Some(action) => queue.extend(ids.iter().map(|id| (action, id))),
                None => {
                    tracing::warn!(
                        parent: self.span,
                        action = %name,
                        count = ids.len(),
                        "unknown reconciliation action, skipping"
                    );
                    report.skipped.push(name.clone());
                }
            }
        }
        queue.sort_by_key(|(action, _)| *action);

        for (action, id) in queue {
            match savepoint(self.conn, || self.apply(action, id))? {
                Ok(task_id) => report.applied.push(Applied {
                    action,
                    annotation_id: id.clone(),
                    task_id,
                }),
                Err(e) => {
                    tracing::warn!(
                        parent: self.span,
                        action = %action,
                        annotation = %id,
                        error = %e,
                        "decision failed"
                    );
                    report.failures.push(Failure {
                        action,
                        annotation_id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply one decision; returns the affected task, if any.
    ///
    /// Every decision except IGNORE must name an item of this envelope and
    /// only touches the envelope's project.
    fn apply(&self, action: Action, annotation_id: &str) -> Result<Option<String>> {
        if action == Action::Ignore {
            return Ok(None);
        }
        let item = self.envelope.item(annotation_id).ok_or_else(|| {
            Error::NotFound(format!(
                "annotation {} is not part of diff {}",
                annotation_id, self.envelope.id
            ))
        })?;
        let registry: Table<'_, CodebaseAnnotation> = Table::new(self.conn);

        match action {
            Action::Create => self.create(annotation_id, item).map(Some),
            Action::Confirm => {
                let mut task = self.linked_task(annotation_id)?;
                if let Some(title) = self.title_override(annotation_id) {
                    task.title = title;
                    task.updated_at = Utc::now();
                    Table::<Task>::new(self.conn).update(&task)?;
                }
                Ok(Some(task.id))
            }
            Action::Complete => self.complete(annotation_id).map(Some),
            Action::Delete => {
                let task_id = self.complete(annotation_id)?;
                let mut entry = registry.require_in(&self.project.id, annotation_id)?;
                entry.deleted = true;
                entry.updated_at = Utc::now();
                registry.update(&entry)?;
                Ok(Some(task_id))
            }
            Action::Unlink => {
                if !registry.delete_in(&self.project.id, annotation_id)? {
                    return Err(Error::NotFound(format!(
                        "annotation {} is not tracked",
                        annotation_id
                    )));
                }
                Ok(None)
            }
            Action::Ignore => Ok(None),
        }
    }

    fn create(&self, annotation_id: &str, item: &DiffItem) -> Result<String> {
        let registry: Table<'_, CodebaseAnnotation> = Table::new(self.conn);
        if let Some(existing) = registry.get_in(&self.project.id, annotation_id)? {
            tracing::warn!(
                parent: self.span,
                annotation = %annotation_id,
                anchored_to = %existing.recent_scan_id,
                "replayed CREATE for a tracked annotation"
            );
            return Err(Error::Validation(format!(
                "annotation {} is already linked",
                annotation_id
            )));
        }

        let fields: AnnotationFields = self
            .snapshot
            .data
            .iter()
            .find(|r| r.id == annotation_id)
            .map(|r| r.fields.clone())
            .or_else(|| item.latest().cloned())
            .ok_or_else(|| {
                Error::Validation(format!("diff item {} carries no annotation data", annotation_id))
            })?;

        let tasks_table: Table<'_, Task> = Table::new(self.conn);
        // A task may still point at an entry that was unlinked earlier.
        tasks_table.detach_annotation(&self.project.id, annotation_id)?;

        let title = self
            .title_override(annotation_id)
            .unwrap_or_else(|| derive_title(&fields));
        let input = TaskInput {
            project_id: Some(self.project.id.clone()),
            progress: Some(Progress::Unstarted),
            priority: Some(Priority::Low),
            ..TaskInput::titled(title)
        };
        let mut task = tasks::upsert(
            self.conn,
            input,
            std::slice::from_ref(&fields.tag),
            &self.req.owner_id,
        )?;

        registry.insert(&CodebaseAnnotation::new(
            annotation_id.to_string(),
            self.project.id.clone(),
            fields,
            self.snapshot.id.clone(),
        ))?;

        task.codebase_task_id = Some(annotation_id.to_string());
        task.updated_at = Utc::now();
        tasks_table.update(&task)?;
        Ok(task.id)
    }

    fn complete(&self, annotation_id: &str) -> Result<String> {
        let mut task = self.linked_task(annotation_id)?;
        task.progress = Progress::Completed;
        task.updated_at = Utc::now();
        Table::<Task>::new(self.conn).update(&task)?;
        Ok(task.id)
    }

    /// The caller's task linked to an annotation tracked in this project.
    fn linked_task(&self, annotation_id: &str) -> Result<Task> {
        Table::<CodebaseAnnotation>::new(self.conn).require_in(&self.project.id, annotation_id)?;
        match Table::<Task>::new(self.conn).linked_to(&self.project.id, annotation_id)? {
            Some(task) if task.owner_id == self.req.owner_id => Ok(task),
            Some(task) => Err(Error::Unauthorized(format!(
                "task {} belongs to another owner",
                task.id
            ))),
            None => Err(Error::NotFound(format!(
                "no task is linked to annotation {}",
                annotation_id
            ))),
        }
    }

    fn title_override(&self, annotation_id: &str) -> Option<String> {
        self.req
            .titles
            .get(annotation_id)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

/// Run `f` inside a savepoint, rolling back to it when `f` fails.
///
/// The outer `Result` carries savepoint bookkeeping errors; the inner one is
/// the outcome of `f`.
fn savepoint<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<Result<T>> {
    conn.execute_batch("SAVEPOINT decision")?;
    match f() {
        Ok(value) => {
            conn.execute_batch("RELEASE decision")?;
            Ok(Ok(value))
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK TO decision; RELEASE decision")?;
            Ok(Err(e))
        }
    }
}

/// Title for a task created from an annotation without an explicit one.
pub fn derive_title(fields: &AnnotationFields) -> String {
    let first_line = fields.text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return format!("{} in {}:{}", fields.tag, fields.file, fields.line);
    }
    if first_line.chars().count() <= MAX_DERIVED_TITLE {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(MAX_DERIVED_TITLE - 1).collect();
    title.push('…');
    title
}

/// Re-anchor live registry entries present in the accepted snapshot.
fn advance_anchors(conn: &Connection, project_id: &str, snapshot: &Snapshot) -> Result<usize> {
    let registry: Table<'_, CodebaseAnnotation> = Table::new(conn);
    let live = registry.live_for_project(project_id)?;
    let diff = diff_keyed(live, &snapshot.data, |e| e.id.clone(), |r| r.id.clone());

    let mut advanced = 0;
    for (mut entry, record) in diff.kept {
        if entry.recent_scan_id == snapshot.id && entry.fields == record.fields {
            continue;
        }
        entry.fields = record.fields.clone();
        entry.recent_scan_id = snapshot.id.clone();
        entry.updated_at = Utc::now();
        registry.update(&entry)?;
        advanced += 1;
    }
    Ok(advanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotationRecord, DiffData, DiffItem, DiffKind};
    use crate::storage::generate_id;
    use crate::test_utils::TestEnv;

    const OWNER: &str = "ana";

    fn fields(tag: &str, text: &str, line: u32) -> AnnotationFields {
        AnnotationFields {
            tag: tag.to_string(),
            text: text.to_string(),
            file: "src/lib.rs".to_string(),
            line,
            context: None,
        }
    }

    fn record(id: &str, fields: AnnotationFields) -> AnnotationRecord {
        AnnotationRecord {
            id: id.to_string(),
            fields,
        }
    }

    fn new_item(r: &AnnotationRecord) -> DiffItem {
        DiffItem {
            id: r.id.clone(),
            tag: r.fields.tag.clone(),
            kind: DiffKind::New,
            data: DiffData {
                old: None,
                new: Some(r.fields.clone()),
            },
        }
    }

    /// Store a snapshot and a PENDING envelope classifying every record as NEW.
    fn seed(storage: &Storage, project: &Project, records: Vec<AnnotationRecord>) -> DiffEnvelope {
        seed_with(storage, project, None, records, new_item)
    }

    fn seed_with(
        storage: &Storage,
        project: &Project,
        baseline: Option<String>,
        records: Vec<AnnotationRecord>,
        item: impl Fn(&AnnotationRecord) -> DiffItem,
    ) -> DiffEnvelope {
        let items = records.iter().map(item).collect();
        let snapshot = Snapshot::new(generate_id("snap", "t"), project.id.clone(), records);
        storage.snapshots().insert(&snapshot).unwrap();
        storage.envelopes().supersede_pending(&project.id).unwrap();
        let envelope = DiffEnvelope::pending(
            generate_id("diff", "t"),
            project.id.clone(),
            baseline,
            snapshot.id.clone(),
            items,
        );
        storage.envelopes().insert(&envelope).unwrap();
        envelope
    }

    fn request(project: &Project, envelope: &DiffEnvelope) -> ReconcileRequest {
        ReconcileRequest {
            project_id: project.id.clone(),
            owner_id: OWNER.to_string(),
            envelope_id: envelope.id.clone(),
            approved: true,
            ..Default::default()
        }
    }

    fn run(storage: &mut Storage, req: &ReconcileRequest) -> Result<ReconcileReport> {
        Reconciler::new(storage, Span::none()).reconcile(req)
    }

    #[test]
    fn test_create_links_task_and_registry() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "tidy up", 3))]);

        let mut req = request(&project, &envelope);
        req.decide("CREATE", "a1");
        req.titles.insert("a1".into(), "Tidy the parser".into());
        let report = run(&mut storage, &req).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.status, EnvelopeStatus::Accepted);
        let task_id = report.applied[0].task_id.clone().unwrap();

        let task = storage.tasks().load(&task_id).unwrap();
        assert_eq!(task.codebase_task_id.as_deref(), Some("a1"));
        assert_eq!(task.title, "Tidy the parser");
        assert_eq!(task.progress, Progress::Unstarted);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.project_id.as_deref(), Some(project.id.as_str()));
        assert_eq!(task.tags, vec!["TODO".to_string()]);

        let entry = storage.registry().require_in(&project.id, "a1").unwrap();
        assert_eq!(entry.recent_scan_id, envelope.new_snapshot_id);
        assert!(storage.snapshots().require(&envelope.new_snapshot_id).unwrap().accepted);
        assert_eq!(
            storage.envelopes().require(&envelope.id).unwrap().status,
            EnvelopeStatus::Accepted
        );
    }

    #[test]
    fn test_create_derives_title_from_text() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(
            &storage,
            &project,
            vec![
                record("a1", fields("BUG", "  off by one\nin the loop", 9)),
                record("a2", fields("NOTE", "   ", 12)),
            ],
        );

        let mut req = request(&project, &envelope);
        req.decide("create", "a1");
        req.decide("create", "a2");
        run(&mut storage, &req).unwrap();

        let a1 = storage.tasks().linked_to(&project.id, "a1").unwrap().unwrap();
        assert_eq!(a1.title, "off by one");
        let a2 = storage.tasks().linked_to(&project.id, "a2").unwrap().unwrap();
        assert_eq!(a2.title, "NOTE in src/lib.rs:12");
    }

    #[test]
    fn test_unlink_keeps_task() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);
        let mut req = request(&project, &envelope);
        req.decide("CREATE", "a1");
        run(&mut storage, &req).unwrap();
        let before = storage.tasks().linked_to(&project.id, "a1").unwrap().unwrap();

        let mut req = request(&project, &envelope);
        req.decide("UNLINK", "a1");
        let report = run(&mut storage, &req).unwrap();
        assert!(report.is_clean());

        assert!(storage.registry().get_in(&project.id, "a1").unwrap().is_none());
        let after = storage.tasks().load(&before.id).unwrap();
        assert_eq!(after.title, before.title);
        assert_eq!(after.progress, before.progress);
        assert_eq!(after.updated_at, before.updated_at);
        assert!(after.codebase_task_id.is_none());
    }

    #[test]
    fn test_replayed_create_is_reported_not_duplicated() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);
        let mut req = request(&project, &envelope);
        req.decide("CREATE", "a1");

        run(&mut storage, &req).unwrap();
        let replay = run(&mut storage, &req).unwrap();

        assert_eq!(replay.failures.len(), 1);
        assert!(replay.failures[0].error.contains("already linked"));
        assert_eq!(storage.tasks().list_for_owner(OWNER, None).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_decision_does_not_abort_batch() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);

        let mut req = request(&project, &envelope);
        req.decide("CREATE", "missing");
        req.decide("CREATE", "a1");
        req.decide("COMPLETE", "never-linked");
        let report = run(&mut storage, &req).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].annotation_id, "a1");
        assert_eq!(report.failures.len(), 2);
        assert!(storage.registry().get_in(&project.id, "a1").unwrap().is_some());
        assert!(storage.registry().get_in(&project.id, "missing").unwrap().is_none());
    }

    #[test]
    fn test_unknown_action_is_skipped() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);

        let mut req = request(&project, &envelope);
        req.decide("ARCHIVE", "a1");
        req.decide("IGNORE", "a1");
        let report = run(&mut storage, &req).unwrap();

        assert_eq!(report.skipped, vec!["ARCHIVE".to_string()]);
        assert_eq!(report.applied.len(), 1);
        assert!(!report.is_clean());
        assert!(storage.tasks().list_for_owner(OWNER, None).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_complete_delete() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(
            &storage,
            &project,
            vec![
                record("a1", fields("TODO", "one", 1)),
                record("a2", fields("TODO", "two", 2)),
                record("a3", fields("BUG", "three", 3)),
            ],
        );
        let mut req = request(&project, &envelope);
        for id in ["a1", "a2", "a3"] {
            req.decide("CREATE", id);
        }
        run(&mut storage, &req).unwrap();

        let mut req = request(&project, &envelope);
        req.decide("CONFIRM", "a1");
        req.titles.insert("a1".into(), "renamed".into());
        req.decide("COMPLETE", "a2");
        req.decide("DELETE", "a3");
        let report = run(&mut storage, &req).unwrap();
        assert!(report.is_clean(), "{:?}", report.failures);

        let t1 = storage.tasks().linked_to(&project.id, "a1").unwrap().unwrap();
        assert_eq!(t1.title, "renamed");
        assert_eq!(t1.progress, Progress::Unstarted);
        let t2 = storage.tasks().linked_to(&project.id, "a2").unwrap().unwrap();
        assert_eq!(t2.progress, Progress::Completed);
        let t3 = storage.tasks().linked_to(&project.id, "a3").unwrap().unwrap();
        assert_eq!(t3.progress, Progress::Completed);

        assert!(!storage.registry().require_in(&project.id, "a2").unwrap().deleted);
        assert!(storage.registry().require_in(&project.id, "a3").unwrap().deleted);
    }

    #[test]
    fn test_reject_applies_no_decisions() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);

        let mut req = request(&project, &envelope);
        req.approved = false;
        req.decide("CREATE", "a1");
        let report = run(&mut storage, &req).unwrap();

        assert_eq!(report.status, EnvelopeStatus::Rejected);
        assert!(report.applied.is_empty());
        assert!(!storage.snapshots().require(&envelope.new_snapshot_id).unwrap().accepted);
        assert!(storage.registry().get_in(&project.id, "a1").unwrap().is_none());
        assert!(storage.tasks().list_for_owner(OWNER, None).unwrap().is_empty());
    }

    #[test]
    fn test_superseded_envelope_is_rejected() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let first = seed(&storage, &project, vec![]);
        let _second = seed(&storage, &project, vec![]);

        let err = run(&mut storage, &request(&project, &first)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(
            storage.envelopes().require(&first.id).unwrap().status,
            EnvelopeStatus::Ignored
        );
    }

    #[test]
    fn test_other_owner_gets_not_found() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![]);

        let mut req = request(&project, &envelope);
        req.owner_id = "mallory".into();
        assert!(matches!(run(&mut storage, &req), Err(Error::NotFound(_))));

        let mut req = request(&project, &envelope);
        req.envelope_id = "diff-00000000".into();
        assert!(matches!(run(&mut storage, &req), Err(Error::NotFound(_))));
        assert_eq!(
            storage.envelopes().require(&envelope.id).unwrap().status,
            EnvelopeStatus::Pending
        );
    }

    #[test]
    fn test_decisions_stay_inside_own_project() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let envelope = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);
        let mut req = request(&project, &envelope);
        req.decide("CREATE", "a1");
        run(&mut storage, &req).unwrap();
        let task = storage.tasks().linked_to(&project.id, "a1").unwrap().unwrap();

        let theirs = env.add_project(&storage, "mallory");
        let empty = seed(&storage, &theirs, vec![]);
        let mut req = request(&theirs, &empty);
        req.owner_id = "mallory".into();
        req.decide("UNLINK", "a1");
        let report = run(&mut storage, &req).unwrap();
        assert!(report.applied.is_empty());
        assert!(report.failures[0].error.contains("not part of diff"));

        // the same id in their own diff still does not reach the other project
        let clash = seed(&storage, &theirs, vec![record("a1", fields("TODO", "y", 5))]);
        let mut req = request(&theirs, &clash);
        req.owner_id = "mallory".into();
        for action in ["UNLINK", "COMPLETE", "DELETE", "CONFIRM"] {
            req.decide(action, "a1");
        }
        let report = run(&mut storage, &req).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.failures.len(), 4);

        let entry = storage.registry().require_in(&project.id, "a1").unwrap();
        assert!(!entry.deleted);
        let after = storage.tasks().load(&task.id).unwrap();
        assert_eq!(after.progress, Progress::Unstarted);
        assert_eq!(after.codebase_task_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_same_annotation_id_in_two_projects() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let fork = env.add_project(&storage, OWNER);

        for p in [&project, &fork] {
            let envelope = seed(&storage, p, vec![record("a1", fields("TODO", "x", 1))]);
            let mut req = request(p, &envelope);
            req.decide("CREATE", "a1");
            let report = run(&mut storage, &req).unwrap();
            assert!(report.is_clean(), "{:?}", report.failures);
        }

        let ours = storage.tasks().linked_to(&project.id, "a1").unwrap().unwrap();
        let forked = storage.tasks().linked_to(&fork.id, "a1").unwrap().unwrap();
        assert_ne!(ours.id, forked.id);
        assert_eq!(storage.tasks().list_for_owner(OWNER, None).unwrap().len(), 2);
    }

    #[test]
    fn test_decided_envelope_cannot_flip() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let accepted = seed(&storage, &project, vec![record("a1", fields("TODO", "x", 1))]);
        run(&mut storage, &request(&project, &accepted)).unwrap();

        let mut req = request(&project, &accepted);
        req.approved = false;
        assert!(matches!(run(&mut storage, &req), Err(Error::Validation(_))));
        assert!(storage.snapshots().require(&accepted.new_snapshot_id).unwrap().accepted);
        assert_eq!(
            storage.envelopes().require(&accepted.id).unwrap().status,
            EnvelopeStatus::Accepted
        );

        let rejected = seed(&storage, &project, vec![]);
        let mut req = request(&project, &rejected);
        req.approved = false;
        run(&mut storage, &req).unwrap();
        let err = run(&mut storage, &request(&project, &rejected)).unwrap_err();
        assert!(err.to_string().contains("already rejected"));
        assert!(!storage.snapshots().require(&rejected.new_snapshot_id).unwrap().accepted);
    }

    #[test]
    fn test_accept_advances_anchors() {
        let env = TestEnv::new();
        let (mut storage, project) = env.storage_with_project(OWNER);
        let first = seed(
            &storage,
            &project,
            vec![
                record("a1", fields("TODO", "x", 1)),
                record("a2", fields("TODO", "y", 2)),
            ],
        );
        let mut req = request(&project, &first);
        req.decide("CREATE", "a1");
        req.decide("CREATE", "a2");
        run(&mut storage, &req).unwrap();

        // a1 moved, a2 is gone
        let moved = record("a1", fields("TODO", "x", 40));
        let second = seed_with(
            &storage,
            &project,
            Some(first.new_snapshot_id.clone()),
            vec![moved],
            |r| DiffItem {
                id: r.id.clone(),
                tag: r.fields.tag.clone(),
                kind: DiffKind::Move,
                data: DiffData {
                    old: Some(fields("TODO", "x", 1)),
                    new: Some(r.fields.clone()),
                },
            },
        );
        let report = run(&mut storage, &request(&project, &second)).unwrap();
        assert_eq!(report.advanced, 1);

        let a1 = storage.registry().require_in(&project.id, "a1").unwrap();
        assert_eq!(a1.recent_scan_id, second.new_snapshot_id);
        assert_eq!(a1.fields.line, 40);
        let a2 = storage.registry().require_in(&project.id, "a2").unwrap();
        assert_eq!(a2.recent_scan_id, first.new_snapshot_id);

        let baseline = storage.snapshots().latest_accepted(&project.id).unwrap().unwrap();
        assert_eq!(baseline.id, second.new_snapshot_id);
        let old_side = storage
            .registry()
            .anchored_to(&project.id, &baseline.id)
            .unwrap();
        assert_eq!(old_side.len(), 1);
    }

    #[test]
    fn test_derive_title_truncates() {
        let long = "x".repeat(300);
        let title = derive_title(&fields("TODO", &long, 1));
        assert_eq!(title.chars().count(), MAX_DERIVED_TITLE);
        assert!(title.ends_with('…'));
    }
}
