//! Command implementations for the Logbook CLI.
//!
//! Each command returns a result type implementing [`Output`] so `main` can
//! print it as JSON (default) or human-readable text (`-H`). Commands are
//! organized by entity:
//! - `project_*` - project registration and inspection
//! - `scan` - stream a scan to a writer
//! - `diff_*`, `snapshot_list` - review scan results
//! - `reconcile` - apply decisions to a diff
//! - `task_*` - task upsert and listing

use crate::config::ResolvedConfig;
use crate::models::{
    DiffEnvelope, DiffKind, EnvelopeStatus, Project, RepoLink, ScanConfig, Snapshot, TagRule,
    Task,
};
use crate::reconcile::{ReconcileReport, ReconcileRequest, Reconciler};
use crate::scan::{ScanEvent, ScanTools, Scanner};
use crate::source::{Credentials, GitHub, Sources};
use crate::storage::{Storage, generate_id};
use crate::tasks::{self, TaskInput};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

/// Open the database in `data_dir`, or the default data directory.
pub fn open_storage(data_dir: Option<&Path>) -> Result<Storage> {
    match data_dir {
        Some(dir) => Storage::open_in(dir),
        None => Storage::open(),
    }
}

/// The acting owner: the explicit one, else the login name.
pub fn resolve_owner(explicit: Option<String>) -> Result<String> {
    explicit
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .ok_or_else(|| Error::Validation("no owner given; pass --owner or set LB_OWNER".to_string()))
}

fn counts_text(counts: &[(DiffKind, usize)]) -> String {
    if counts.is_empty() {
        return "no changes".to_string();
    }
    counts
        .iter()
        .map(|(kind, n)| format!("{} {}", n, kind.as_str().to_lowercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

// === Projects ===

#[derive(Serialize)]
pub struct ProjectAdded {
    #[serde(flatten)]
    pub project: Project,
}

impl Output for ProjectAdded {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.project.repo {
            Some(repo) => format!(
                "Created project {} \"{}\" tracking {}",
                self.project.id, self.project.name, repo
            ),
            None => format!(
                "Created project {} \"{}\" (no repository linked)",
                self.project.id, self.project.name
            ),
        }
    }
}

/// Parse `NAME` or `NAME=PATTERN[,PATTERN...]`.
pub fn parse_tag_rule(rule: &str) -> Result<TagRule> {
    match rule.split_once('=') {
        None => Ok(TagRule::named(rule.trim())),
        Some((name, patterns)) => Ok(TagRule {
            name: name.trim().to_string(),
            patterns: patterns
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }),
    }
}

/// Register a project owned by `owner`.
pub fn project_add(
    storage: &Storage,
    owner: &str,
    name: &str,
    repo: Option<&str>,
    branch: Option<String>,
    tags: &[String],
    ignore: Vec<String>,
) -> Result<ProjectAdded> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("project name must not be empty".to_string()));
    }

    let mut project = Project::new(
        generate_id("proj", &format!("{}/{}", owner, name)),
        owner.to_string(),
        name.to_string(),
    );
    project.repo = repo.map(RepoLink::parse).transpose()?;
    if let Some(RepoLink::Local { path }) = &mut project.repo {
        let absolute = std::fs::canonicalize(&*path)
            .map_err(|e| Error::Validation(format!("repository path {}: {}", path, e)))?;
        *path = absolute.to_string_lossy().to_string();
    }

    let mut config = ScanConfig::default();
    if !tags.is_empty() {
        config.tags = tags
            .iter()
            .map(|t| parse_tag_rule(t))
            .collect::<Result<Vec<_>>>()?;
    }
    config.ignore = ignore;
    config.branch = branch;
    config.validate()?;
    project.scan_config = config;

    storage.projects().insert(&project)?;
    tracing::info!(project = %project.id, owner, "project registered");
    Ok(ProjectAdded { project })
}

#[derive(Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub count: usize,
}

impl Output for ProjectList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found.".to_string();
        }
        let mut lines = vec![format!("{} project(s):\n", self.count)];
        for p in &self.projects {
            let repo = p
                .repo
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!("  {} {} [{}]", p.id, p.name, repo));
        }
        lines.join("\n")
    }
}

pub fn project_list(storage: &Storage, owner: &str) -> Result<ProjectList> {
    let projects = storage.projects().list_for_owner(owner)?;
    let count = projects.len();
    Ok(ProjectList { projects, count })
}

#[derive(Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_diff_id: Option<String>,
    pub snapshots: usize,
    pub tracked_annotations: usize,
}

impl Output for ProjectDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.project;
        let mut lines = vec![format!("{} {}", p.id, p.name)];
        if let Some(repo) = &p.repo {
            lines.push(format!("  Repository: {}", repo));
        }
        if let Some(branch) = &p.scan_config.branch {
            lines.push(format!("  Branch: {}", branch));
        }
        let tags: Vec<&str> = p.scan_config.tags.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!("  Tags: {}", tags.join(", ")));
        if !p.scan_config.ignore.is_empty() {
            lines.push(format!("  Ignore: {}", p.scan_config.ignore.join(", ")));
        }
        lines.push(format!(
            "  Baseline: {}",
            self.baseline_id.as_deref().unwrap_or("none")
        ));
        if let Some(pending) = &self.pending_diff_id {
            lines.push(format!("  Pending diff: {}", pending));
        }
        lines.push(format!(
            "  Snapshots: {}, tracked annotations: {}",
            self.snapshots, self.tracked_annotations
        ));
        lines.join("\n")
    }
}

pub fn project_show(storage: &Storage, owner: &str, id: &str) -> Result<ProjectDetail> {
    let project = storage.projects().require_owned(id, owner)?;
    let baseline_id = storage
        .snapshots()
        .latest_accepted(&project.id)?
        .map(|s| s.id);
    let pending_diff_id = storage.envelopes().pending(&project.id)?.map(|e| e.id);
    let snapshots = storage.snapshots().list_for_project(&project.id)?.len();
    let tracked_annotations = storage.registry().live_for_project(&project.id)?.len();
    Ok(ProjectDetail {
        project,
        baseline_id,
        pending_diff_id,
        snapshots,
        tracked_annotations,
    })
}

// === Scan ===

/// Run a scan, writing one line per event to `out`.
///
/// In JSON mode the summary object is written just before the `done` line.
/// Returns whether the scan succeeded. A Ctrl-C during the scan cancels it.
pub fn scan(
    storage: &Storage,
    owner: &str,
    project_id: &str,
    config: &ResolvedConfig,
    human: bool,
    out: &mut dyn Write,
) -> Result<bool> {
    let project = storage.projects().require_owned(project_id, owner)?;

    let github = match &config.github_api {
        Some(base) => GitHub::with_base(base.value.clone()),
        None => GitHub::default(),
    };
    let source = Sources {
        github,
        ..Sources::default()
    };
    let tools = ScanTools {
        extract: config.extract.value.clone(),
        diff: config.diff.value.clone(),
        timeout: config.tool_timeout.value,
    };
    let span = tracing::info_span!("scan", project = %project.id);
    let scanner = Scanner::new(&storage.root, tools, Arc::new(source), span);

    let creds = Credentials {
        token: config.token().map(str::to_string),
    };
    let handle = scanner.scan(&project.id, creds);

    let token = handle.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let mut succeeded = false;
    for event in handle {
        if let ScanEvent::Done(summary) = &event {
            succeeded = true;
            if !human {
                writeln!(out, "{}", json(summary))?;
            }
        }
        writeln!(out, "{}", event.to_line())?;
        out.flush()?;
    }
    Ok(succeeded)
}

// === Diffs and snapshots ===

#[derive(Serialize)]
pub struct DiffSummary {
    pub id: String,
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_snapshot_id: Option<String>,
    pub new_snapshot_id: String,
    pub counts: Vec<(DiffKind, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&DiffEnvelope> for DiffSummary {
    fn from(e: &DiffEnvelope) -> Self {
        Self {
            id: e.id.clone(),
            status: e.status,
            old_snapshot_id: e.old_snapshot_id.clone(),
            new_snapshot_id: e.new_snapshot_id.clone(),
            counts: e.counts(),
            commit_sha: e.commit.as_ref().map(|c| c.sha.clone()),
            created_at: e.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct DiffList {
    pub diffs: Vec<DiffSummary>,
    pub count: usize,
}

impl Output for DiffList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.diffs.is_empty() {
            return "No diffs recorded.".to_string();
        }
        let mut lines = vec![format!("{} diff(s):\n", self.count)];
        for d in &self.diffs {
            lines.push(format!(
                "  {} [{}] {} ({})",
                d.id,
                d.status,
                d.created_at.format("%Y-%m-%d %H:%M"),
                counts_text(&d.counts)
            ));
        }
        lines.join("\n")
    }
}

pub fn diff_list(storage: &Storage, owner: &str, project_id: &str) -> Result<DiffList> {
    let project = storage.projects().require_owned(project_id, owner)?;
    let diffs: Vec<DiffSummary> = storage
        .envelopes()
        .list_for_project(&project.id)?
        .iter()
        .map(DiffSummary::from)
        .collect();
    let count = diffs.len();
    Ok(DiffList { diffs, count })
}

#[derive(Serialize)]
pub struct DiffDetail {
    #[serde(flatten)]
    pub envelope: DiffEnvelope,
}

impl Output for DiffDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let e = &self.envelope;
        let mut lines = vec![format!("{} [{}] {}", e.id, e.status, counts_text(&e.counts()))];
        if let Some(commit) = &e.commit {
            lines.push(format!("  Commit: {}@{}", commit.branch, commit.sha));
        }
        for item in &e.data {
            let location = item
                .latest()
                .map(|f| format!("{}:{} {}", f.file, f.line, f.text))
                .unwrap_or_default();
            lines.push(format!("  {:<6} {} {} {}", item.kind.as_str(), item.id, item.tag, location));
        }
        lines.join("\n")
    }
}

/// Show a diff of one of the owner's projects.
pub fn diff_show(storage: &Storage, owner: &str, id: &str) -> Result<DiffDetail> {
    let envelope = storage.envelopes().require(id)?;
    storage
        .projects()
        .require_owned(&envelope.project_id, owner)
        .map_err(|_| Error::NotFound(format!("Diff not found: {}", id)))?;
    Ok(DiffDetail { envelope })
}

#[derive(Serialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub accepted: bool,
    pub annotations: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(s: &Snapshot) -> Self {
        Self {
            id: s.id.clone(),
            accepted: s.accepted,
            annotations: s.data.len(),
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SnapshotList {
    pub snapshots: Vec<SnapshotSummary>,
    pub count: usize,
}

impl Output for SnapshotList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.snapshots.is_empty() {
            return "No snapshots recorded.".to_string();
        }
        let mut lines = vec![format!("{} snapshot(s):\n", self.count)];
        for s in &self.snapshots {
            lines.push(format!(
                "  {} {} {} annotation(s){}",
                s.id,
                s.created_at.format("%Y-%m-%d %H:%M"),
                s.annotations,
                if s.accepted { " [accepted]" } else { "" }
            ));
        }
        lines.join("\n")
    }
}

pub fn snapshot_list(storage: &Storage, owner: &str, project_id: &str) -> Result<SnapshotList> {
    let project = storage.projects().require_owned(project_id, owner)?;
    let snapshots: Vec<SnapshotSummary> = storage
        .snapshots()
        .list_for_project(&project.id)?
        .iter()
        .map(SnapshotSummary::from)
        .collect();
    let count = snapshots.len();
    Ok(SnapshotList { snapshots, count })
}

// === Reconcile ===

/// Split `KEY=VALUE`, rejecting empty keys.
pub fn split_pair<'a>(pair: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(Error::Validation(format!(
            "{} must look like KEY=VALUE, got: {}",
            what, pair
        ))),
    }
}

impl Output for ReconcileReport {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Diff {} {}; snapshot {} {}",
            self.envelope_id,
            self.status.as_str().to_lowercase(),
            self.snapshot_id,
            if self.status == EnvelopeStatus::Accepted {
                "is the new baseline"
            } else {
                "was not accepted"
            }
        )];
        for a in &self.applied {
            match &a.task_id {
                Some(task) => lines.push(format!("  {} {} -> {}", a.action, a.annotation_id, task)),
                None => lines.push(format!("  {} {}", a.action, a.annotation_id)),
            }
        }
        for f in &self.failures {
            lines.push(format!("  FAILED {} {}: {}", f.action, f.annotation_id, f.error));
        }
        for s in &self.skipped {
            lines.push(format!("  skipped unknown action {}", s));
        }
        if self.advanced > 0 {
            lines.push(format!("  {} tracked annotation(s) re-anchored", self.advanced));
        }
        lines.join("\n")
    }
}

pub fn reconcile(storage: &mut Storage, req: &ReconcileRequest) -> Result<ReconcileReport> {
    let span = tracing::info_span!("reconcile", envelope = %req.envelope_id);
    Reconciler::new(storage, span).reconcile(req)
}

// === Tasks ===

#[derive(Serialize)]
pub struct TaskResult {
    #[serde(flatten)]
    pub task: Task,
}

impl Output for TaskResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let t = &self.task;
        let mut lines = vec![format!("{} \"{}\"", t.id, t.title)];
        lines.push(format!(
            "  Progress: {}  Priority: {}  Visibility: {}",
            t.progress, t.priority, t.visibility
        ));
        if let Some(project) = &t.project_id {
            lines.push(format!("  Project: {}", project));
        }
        if let Some(annotation) = &t.codebase_task_id {
            lines.push(format!("  Tracks annotation: {}", annotation));
        }
        if !t.tags.is_empty() {
            lines.push(format!("  Tags: {}", t.tags.join(", ")));
        }
        if let Some(desc) = &t.description {
            lines.push(format!("  Description: {}", desc));
        }
        lines.join("\n")
    }
}

/// Fields accepted by `lb task upsert`, as typed on the command line.
#[derive(Debug, Default)]
pub struct TaskArgs {
    pub id: Option<String>,
    pub title: Option<String>,
    pub project: Option<String>,
    pub description: Option<String>,
    pub progress: Option<String>,
    pub priority: Option<String>,
    pub visibility: Option<String>,
    pub tags: Vec<String>,
}

pub fn task_upsert(storage: &mut Storage, owner: &str, args: TaskArgs) -> Result<TaskResult> {
    let input = TaskInput {
        id: args.id,
        project_id: args.project,
        title: args.title,
        description: args.description,
        progress: args.progress.as_deref().map(str::parse).transpose()?,
        priority: args.priority.as_deref().map(str::parse).transpose()?,
        visibility: args.visibility.as_deref().map(str::parse).transpose()?,
    };
    let tx = storage.transaction()?;
    let task = tasks::upsert(&tx, input, &args.tags, owner)?;
    tx.commit()?;
    Ok(TaskResult { task })
}

#[derive(Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub count: usize,
}

impl Output for TaskList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let mut lines = vec![format!("{} task(s):\n", self.count)];
        for t in &self.tasks {
            let marker = match t.progress {
                crate::models::Progress::Completed => "x",
                crate::models::Progress::InProgress => ">",
                crate::models::Progress::Unstarted => " ",
            };
            let tags = if t.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", t.tags.join(", "))
            };
            lines.push(format!("  [{}] {} {}{}", marker, t.id, t.title, tags));
        }
        lines.join("\n")
    }
}

pub fn task_list(storage: &Storage, owner: &str, project: Option<&str>) -> Result<TaskList> {
    let tasks = storage.tasks().list_for_owner(owner, project)?;
    let count = tasks.len();
    Ok(TaskList { tasks, count })
}

pub fn task_show(storage: &Storage, owner: &str, id: &str) -> Result<TaskResult> {
    let task = storage.tasks().load(id)?;
    if task.owner_id != owner {
        return Err(Error::NotFound(format!("Task not found: {}", id)));
    }
    Ok(TaskResult { task })
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

#[derive(Serialize)]
pub struct ConfigView {
    pub entries: Vec<ConfigEntry>,
}

impl Output for ConfigView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{:<14} {}  ({})", e.key, e.value, e.source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigView {
    let mut entries = vec![
        ConfigEntry {
            key: "extract",
            value: config.extract.value.to_string(),
            source: config.extract.source.to_string(),
        },
        ConfigEntry {
            key: "diff",
            value: config.diff.value.to_string(),
            source: config.diff.source.to_string(),
        },
        ConfigEntry {
            key: "timeout-secs",
            value: config.tool_timeout.value.as_secs().to_string(),
            source: config.tool_timeout.source.to_string(),
        },
        ConfigEntry {
            key: "log-level",
            value: config.log_level.value.clone(),
            source: config.log_level.source.to_string(),
        },
        ConfigEntry {
            key: "log-format",
            value: config.log_format.value.to_string(),
            source: config.log_format.source.to_string(),
        },
    ];
    if let (Some(masked), Some(token)) = (config.masked_token(), &config.github_token) {
        entries.push(ConfigEntry {
            key: "github-token",
            value: masked,
            source: token.source.to_string(),
        });
    }
    if let Some(api) = &config.github_api {
        entries.push(ConfigEntry {
            key: "github-api",
            value: api.value.clone(),
            source: api.source.to_string(),
        });
    }
    ConfigView { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_parse_tag_rule() {
        assert_eq!(parse_tag_rule("TODO").unwrap(), TagRule::named("TODO"));
        let rule = parse_tag_rule("FIXME=FIXME, XXX").unwrap();
        assert_eq!(rule.name, "FIXME");
        assert_eq!(rule.patterns, vec!["FIXME", "XXX"]);
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("a1=Fix it", "--title").unwrap(), ("a1", "Fix it"));
        assert_eq!(split_pair("a1=x=y", "--title").unwrap(), ("a1", "x=y"));
        assert!(split_pair("=x", "--title").is_err());
        assert!(split_pair("nope", "--title").is_err());
    }

    #[test]
    fn test_project_add_resolves_local_path() {
        let env = TestEnv::new();
        let storage = env.open_storage();
        let repo = env.path().to_string_lossy().to_string();

        let added = project_add(
            &storage,
            "ana",
            "widgets",
            Some(&repo),
            Some("main".into()),
            &["BUG".to_string()],
            vec!["target/**".into()],
        )
        .unwrap();
        let stored = storage.projects().require(&added.project.id).unwrap();
        assert!(matches!(stored.repo, Some(RepoLink::Local { .. })));
        assert_eq!(stored.scan_config.tags, vec![TagRule::named("BUG")]);
        assert_eq!(stored.scan_config.branch.as_deref(), Some("main"));
        assert!(added.to_human().contains("widgets"));
    }

    #[test]
    fn test_project_add_rejects_bad_rules() {
        let env = TestEnv::new();
        let storage = env.open_storage();
        let err = project_add(&storage, "ana", "x", None, None, &["TODO=".to_string()], vec![]);
        assert!(matches!(err, Err(Error::Validation(_))));
        assert!(storage.projects().list_for_owner("ana").unwrap().is_empty());
    }

    #[test]
    fn test_other_owners_cannot_see_project() {
        let env = TestEnv::new();
        let (storage, project) = env.storage_with_project("ana");
        assert!(project_show(&storage, "ana", &project.id).is_ok());
        assert!(matches!(
            project_show(&storage, "bob", &project.id),
            Err(Error::NotFound(_))
        ));
        assert!(diff_list(&storage, "bob", &project.id).is_err());
    }

    #[test]
    fn test_task_upsert_parses_enums() {
        let env = TestEnv::new();
        let mut storage = env.open_storage();
        let result = task_upsert(
            &mut storage,
            "ana",
            TaskArgs {
                title: Some("Write docs".into()),
                priority: Some("high".into()),
                progress: Some("in_progress".into()),
                tags: vec!["docs".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.task.priority, crate::models::Priority::High);
        assert_eq!(result.task.tags, vec!["docs".to_string()]);

        let bad = task_upsert(
            &mut storage,
            "ana",
            TaskArgs {
                title: Some("x".into()),
                priority: Some("urgent".into()),
                ..Default::default()
            },
        );
        assert!(matches!(bad, Err(Error::Validation(_))));
    }

    #[test]
    fn test_config_show_masks_token() {
        let mut config = ResolvedConfig::default();
        config.github_token = Some(crate::config::Resolved::new(
            "ghp_abcdefghijklmnop".to_string(),
            crate::config::ValueSource::CliFlag,
        ));
        let view = config_show(&config);
        let token = view.entries.iter().find(|e| e.key == "github-token").unwrap();
        assert_eq!(token.value, "ghp_...mnop");
        assert!(!view.to_json().contains("abcdefghijkl"));
    }
}
