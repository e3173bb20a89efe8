//! Data models for Logbook entities.
//!
//! This module defines the core data structures:
//! - `Project` - A tracked repository and its scan configuration
//! - `Snapshot` - One full set of annotations found by a scan
//! - `DiffEnvelope` - The diff between two snapshots plus its review status
//! - `CodebaseAnnotation` - Stable-identity registry entry for one annotation
//! - `Task`, `Tag`, `TaskTag` - User-facing work items and their labels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored as text.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical text form, as persisted.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s.to_ascii_uppercase().replace('-', "_").as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(Error::Validation(format!(
                        "invalid {}: {}",
                        stringify!($ty),
                        s
                    ))),
                }
            }
        }
    };
}

// === Projects ===

/// Where a project's source code lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepoLink {
    /// A GitHub repository, fetched as a tarball over the REST API.
    Github { owner: String, name: String },
    /// A directory on the local filesystem.
    Local { path: String },
}

impl RepoLink {
    /// Parse `github:owner/name`, `owner/name` or a local path (`./x`, `/x`, `file:x`).
    pub fn parse(s: &str) -> crate::Result<Self> {
        if let Some(path) = s.strip_prefix("file:") {
            return Ok(Self::Local {
                path: path.to_string(),
            });
        }
        if s.starts_with('/') || s.starts_with('.') || s.starts_with('~') {
            return Ok(Self::Local {
                path: s.to_string(),
            });
        }

        let slug = s.strip_prefix("github:").unwrap_or(s);
        match slug.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::Github {
                    owner: owner.to_string(),
                    name: name.trim_end_matches(".git").to_string(),
                })
            }
            _ => Err(Error::Validation(format!(
                "repository must be github:owner/name or a local path, got: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for RepoLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoLink::Github { owner, name } => write!(f, "github:{}/{}", owner, name),
            RepoLink::Local { path } => write!(f, "file:{}", path),
        }
    }
}

/// One tag rule handed to the extraction tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub name: String,
    #[serde(rename = "match")]
    pub patterns: Vec<String>,
}

impl TagRule {
    /// A rule matching only the tag's own name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            patterns: vec![name.to_string()],
        }
    }
}

/// Per-project scan configuration.
///
/// `tags` and `ignore` are written verbatim as the extraction tool's
/// `config.json`; `branch` stays on our side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub tags: Vec<TagRule>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tags: ["TODO", "BUG", "NOTE", "ERROR"]
                .iter()
                .map(|name| TagRule::named(name))
                .collect(),
            ignore: Vec::new(),
            branch: None,
        }
    }
}

impl ScanConfig {
    /// Reject configurations the extraction tool cannot use.
    pub fn validate(&self) -> crate::Result<()> {
        if self.tags.is_empty() {
            return Err(Error::Validation(
                "scan configuration needs at least one tag rule".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &self.tags {
            if rule.name.trim().is_empty() {
                return Err(Error::Validation("tag rule with empty name".to_string()));
            }
            if rule.patterns.is_empty() || rule.patterns.iter().any(|p| p.is_empty()) {
                return Err(Error::Validation(format!(
                    "tag rule '{}' needs at least one non-empty match pattern",
                    rule.name
                )));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate tag rule: {}",
                    rule.name
                )));
            }
        }
        if let Some(branch) = &self.branch {
            if branch.trim().is_empty() {
                return Err(Error::Validation("branch must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// The `config.json` payload for the extraction tool.
    pub fn extractor_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "tags": self.tags,
            "ignore": self.ignore,
        })
    }
}

/// A tracked project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoLink>,
    pub scan_config: ScanConfig,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: String, owner_id: String, name: String) -> Self {
        Self {
            id,
            owner_id,
            name,
            repo: None,
            scan_config: ScanConfig::default(),
            created_at: Utc::now(),
        }
    }
}

// === Annotations and snapshots ===

/// The position and content of an annotation, without its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationFields {
    pub tag: String,
    pub text: String,
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One annotation as reported by the extraction tool.
///
/// `id` is assigned by the extractor and stays stable for the same logical
/// annotation across scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: AnnotationFields,
}

/// One full scan result for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub data: Vec<AnnotationRecord>,
    pub accepted: bool,
}

impl Snapshot {
    pub fn new(id: String, project_id: String, data: Vec<AnnotationRecord>) -> Self {
        Self {
            id,
            project_id,
            created_at: Utc::now(),
            data,
            accepted: false,
        }
    }
}

/// Classification of one annotation between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    Same,
    Move,
    Update,
    New,
    Delete,
}

text_enum!(DiffKind {
    Same => "SAME",
    Move => "MOVE",
    Update => "UPDATE",
    New => "NEW",
    Delete => "DELETE",
});

/// Old and new sides of a diff item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<AnnotationFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<AnnotationFields>,
}

/// One entry of the diff tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    pub id: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: DiffKind,
    #[serde(default)]
    pub data: DiffData,
}

impl DiffItem {
    /// The most recent known fields: `new` when present, else `old`.
    pub fn latest(&self) -> Option<&AnnotationFields> {
        self.data.new.as_ref().or(self.data.old.as_ref())
    }
}

/// Review status of a diff envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Ignored,
}

text_enum!(EnvelopeStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Ignored => "IGNORED",
});

/// Commit the scanned contents came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub branch: String,
    pub sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One scan attempt: the diff between the baseline and a new snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEnvelope {
    pub id: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_snapshot_id: Option<String>,
    pub new_snapshot_id: String,
    pub data: Vec<DiffItem>,
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiffEnvelope {
    /// A fresh PENDING envelope.
    pub fn pending(
        id: String,
        project_id: String,
        old_snapshot_id: Option<String>,
        new_snapshot_id: String,
        data: Vec<DiffItem>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            old_snapshot_id,
            new_snapshot_id,
            data,
            status: EnvelopeStatus::Pending,
            commit: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self, annotation_id: &str) -> Option<&DiffItem> {
        self.data.iter().find(|item| item.id == annotation_id)
    }

    /// Count items per classification, in `DiffKind` order.
    pub fn counts(&self) -> Vec<(DiffKind, usize)> {
        [
            DiffKind::Same,
            DiffKind::Move,
            DiffKind::Update,
            DiffKind::New,
            DiffKind::Delete,
        ]
        .into_iter()
        .map(|kind| (kind, self.data.iter().filter(|i| i.kind == kind).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

/// Registry entry: the durable, stable-id record of one tracked annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseAnnotation {
    pub id: String,
    pub project_id: String,
    #[serde(flatten)]
    pub fields: AnnotationFields,
    pub recent_scan_id: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodebaseAnnotation {
    pub fn new(id: String, project_id: String, fields: AnnotationFields, scan_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            fields,
            recent_scan_id: scan_id,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_record(&self) -> AnnotationRecord {
        AnnotationRecord {
            id: self.id.clone(),
            fields: self.fields.clone(),
        }
    }
}

// === Tasks ===

/// How far along a task is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Progress {
    #[default]
    Unstarted,
    InProgress,
    Completed,
}

text_enum!(Progress {
    Unstarted => "UNSTARTED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

text_enum!(Priority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

/// Who can see a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

text_enum!(Visibility {
    Private => "PRIVATE",
    Public => "PUBLIC",
});

/// A work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "lb-1a2b3c4d")
    pub id: String,

    pub owner_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Registry entry this task tracks, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codebase_task_id: Option<String>,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub progress: Progress,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub visibility: Visibility,

    /// Tag titles, filled in on read
    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: String, owner_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            project_id: None,
            codebase_task_id: None,
            title,
            description: None,
            progress: Progress::default(),
            priority: Priority::default(),
            visibility: Visibility::default(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A label, unique per `(owner_id, title)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Join row between a task and a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTag {
    pub id: String,
    pub task_id: String,
    pub tag_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskTag {
    pub fn new(task_id: &str, tag_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            tag_id: tag_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_link_parse_github() {
        let link = RepoLink::parse("github:octo/widgets").unwrap();
        assert_eq!(
            link,
            RepoLink::Github {
                owner: "octo".to_string(),
                name: "widgets".to_string()
            }
        );
        assert_eq!(RepoLink::parse("octo/widgets.git").unwrap(), link);
        assert_eq!(link.to_string(), "github:octo/widgets");
    }

    #[test]
    fn test_repo_link_parse_local() {
        assert_eq!(
            RepoLink::parse("./src").unwrap(),
            RepoLink::Local {
                path: "./src".to_string()
            }
        );
        assert_eq!(
            RepoLink::parse("file:/tmp/x").unwrap(),
            RepoLink::Local {
                path: "/tmp/x".to_string()
            }
        );
    }

    #[test]
    fn test_repo_link_parse_invalid() {
        assert!(RepoLink::parse("nonsense").is_err());
        assert!(RepoLink::parse("a/b/c").is_err());
        assert!(RepoLink::parse("/").is_ok());
    }

    #[test]
    fn test_scan_config_default_is_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        let names: Vec<_> = config.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["TODO", "BUG", "NOTE", "ERROR"]);
    }

    #[test]
    fn test_scan_config_rejects_duplicates_and_empty_patterns() {
        let mut config = ScanConfig::default();
        config.tags.push(TagRule::named("TODO"));
        assert!(config.validate().is_err());

        let config = ScanConfig {
            tags: vec![TagRule {
                name: "FIXME".to_string(),
                patterns: vec![],
            }],
            ignore: vec![],
            branch: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extractor_payload_shape() {
        let config = ScanConfig {
            tags: vec![TagRule::named("TODO")],
            ignore: vec!["target/**".to_string()],
            branch: Some("main".to_string()),
        };
        let payload = config.extractor_payload();
        assert_eq!(payload["tags"][0]["name"], "TODO");
        assert_eq!(payload["tags"][0]["match"][0], "TODO");
        assert_eq!(payload["ignore"][0], "target/**");
        assert!(payload.get("branch").is_none());
    }

    #[test]
    fn test_annotation_record_wire_format() {
        let json = r#"{"id":"a1","tag":"TODO","text":"fix it","file":"src/lib.rs","line":12}"#;
        let record: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "a1");
        assert_eq!(record.fields.line, 12);
        assert!(record.fields.context.is_none());
    }

    #[test]
    fn test_diff_item_wire_format() {
        let json = r#"{"id":"a1","tag":"BUG","type":"MOVE","data":{
            "old":{"tag":"BUG","text":"x","file":"a.rs","line":1},
            "new":{"tag":"BUG","text":"x","file":"a.rs","line":5}}}"#;
        let item: DiffItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, DiffKind::Move);
        assert_eq!(item.latest().unwrap().line, 5);
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "pending".parse::<EnvelopeStatus>().unwrap(),
            EnvelopeStatus::Pending
        );
        assert_eq!(
            "in-progress".parse::<Progress>().unwrap(),
            Progress::InProgress
        );
        assert!("bogus".parse::<Priority>().is_err());
    }
}
