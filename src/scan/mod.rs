//! Scan orchestrator.
//!
//! A scan runs on its own thread and walks
//! `STARTING → CLONING → EXTRACTING → DIFFING → PERSISTING → DONE`:
//!
//! 1. resolve the project and its repository link
//! 2. fetch and unpack an archive of the tracked branch
//! 3. run the extraction tool and store the result as a new snapshot
//! 4. load the old side from the registry entries anchored to the latest
//!    accepted snapshot, and run the diff tool
//! 5. supersede the PENDING envelope and insert the new one in one transaction
//!
//! Progress travels over a bounded channel as [`ScanEvent`]s. A failure in any
//! stage ends the stream with [`ScanEvent::Failed`] and no `done` line. Rows
//! written before the failure are kept; the temporary workspace is removed.

pub mod events;

pub use events::{DONE_LINE, ScanEvent, ScanState, ScanSummary};

use crate::config::ToolCommand;
use crate::linkdiff::diff_keyed;
use crate::models::{AnnotationRecord, DiffEnvelope, DiffItem, DiffKind, Snapshot};
use crate::process::{CancelToken, Process};
use crate::source::{Credentials, RepoSource, unpack};
use crate::storage::{Storage, Table, generate_id};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::Span;

/// Capacity of the progress channel.
const CHANNEL_CAPACITY: usize = 32;

/// External tools used by the pipeline.
#[derive(Debug, Clone)]
pub struct ScanTools {
    pub extract: ToolCommand,
    pub diff: ToolCommand,
    /// Wall-clock limit per tool invocation
    pub timeout: Duration,
}

/// Runs scans against one database.
#[derive(Clone)]
pub struct Scanner {
    data_dir: PathBuf,
    tools: ScanTools,
    source: Arc<dyn RepoSource>,
    span: Span,
}

impl Scanner {
    /// `data_dir` holds the database; each scan opens its own connection there.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        tools: ScanTools,
        source: Arc<dyn RepoSource>,
        span: Span,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            tools,
            source,
            span,
        }
    }

    /// Start scanning a project. Events arrive on the returned handle.
    pub fn scan(&self, project_id: &str, creds: Credentials) -> ScanHandle {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let cancel = CancelToken::new();

        let scanner = self.clone();
        let project_id = project_id.to_string();
        let token = cancel.clone();
        let thread = thread::Builder::new()
            .name(format!("scan-{}", project_id))
            .spawn(move || scanner.run_to_channel(&project_id, &creds, &token, tx));

        match thread {
            Ok(thread) => ScanHandle {
                rx,
                cancel,
                thread: Some(thread),
            },
            Err(e) => {
                // Nothing is running; hand back a stream holding just the failure.
                let (tx, rx) = mpsc::sync_channel(1);
                let _ = tx.send(ScanEvent::Failed {
                    state: ScanState::Starting,
                    error: format!("failed to start scan thread: {}", e),
                });
                ScanHandle {
                    rx,
                    cancel,
                    thread: None,
                }
            }
        }
    }

    fn run_to_channel(
        &self,
        project_id: &str,
        creds: &Credentials,
        cancel: &CancelToken,
        tx: SyncSender<ScanEvent>,
    ) {
        let mut pipeline = Pipeline {
            scanner: self,
            cancel,
            tx: &tx,
            state: ScanState::Starting,
        };
        let event = match pipeline.execute(project_id, creds) {
            Ok(summary) => {
                tracing::info!(
                    parent: &self.span,
                    project = %project_id,
                    envelope = %summary.envelope_id,
                    "scan done"
                );
                ScanEvent::Done(summary)
            }
            Err(e) => {
                tracing::warn!(
                    parent: &self.span,
                    project = %project_id,
                    state = %pipeline.state,
                    error = %e,
                    "scan failed"
                );
                ScanEvent::Failed {
                    state: pipeline.state,
                    error: e.to_string(),
                }
            }
        };
        // The receiver may already be gone.
        let _ = tx.send(event);
    }
}

/// Receiving end of a running scan.
///
/// Iterating yields events until the terminal one. Dropping the handle
/// cancels the scan.
pub struct ScanHandle {
    rx: Receiver<ScanEvent>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Ask the pipeline to stop; a running tool is killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this scan, e.g. for a Ctrl-C handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drain the stream and wait for the scan thread.
    ///
    /// Returns every line and the summary when the scan succeeded.
    pub fn finish(mut self) -> (Vec<String>, Option<ScanSummary>) {
        let mut lines = Vec::new();
        let mut summary = None;
        for event in self.by_ref() {
            lines.push(event.to_line());
            if let ScanEvent::Done(s) = event {
                summary = Some(s);
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        (lines, summary)
    }
}

impl Iterator for ScanHandle {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<ScanEvent> {
        self.rx.recv().ok()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One pipeline execution.
struct Pipeline<'a> {
    scanner: &'a Scanner,
    cancel: &'a CancelToken,
    tx: &'a SyncSender<ScanEvent>,
    state: ScanState,
}

impl Pipeline<'_> {
    /// Move to `state` and report it.
    fn enter(&mut self, state: ScanState, message: impl Into<String>) -> Result<()> {
        self.state = state;
        self.report(message)
    }

    fn report(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        tracing::info!(parent: &self.scanner.span, state = %self.state, "{}", message);
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let event = ScanEvent::Progress {
            state: self.state,
            message,
        };
        if self.tx.send(event).is_err() {
            // Nobody is listening any more.
            self.cancel.cancel();
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn tool(&self, tool: &ToolCommand) -> Process {
        Process::new(tool.program.clone())
            .args(&tool.args)
            .timeout(self.scanner.tools.timeout)
            .cancel_token(self.cancel.clone())
    }

    fn execute(&mut self, project_id: &str, creds: &Credentials) -> Result<ScanSummary> {
        self.enter(ScanState::Starting, format!("scanning project {}", project_id))?;
        let mut storage = Storage::open_in(&self.scanner.data_dir)?;
        let project = storage.projects().require(project_id)?;
        let repo = project.repo.clone().ok_or_else(|| {
            Error::Validation(format!(
                "project {} has no linked repository",
                project.id
            ))
        })?;
        let config = &project.scan_config;
        config.validate()?;

        // CLONING
        let branch = config.branch.as_deref();
        self.enter(
            ScanState::Cloning,
            format!("fetching {}@{}", repo, branch.unwrap_or("default branch")),
        )?;
        let archive = self.scanner.source.fetch_archive(&repo, branch, creds)?;
        let workspace = tempfile::Builder::new().prefix("lb-scan-").tempdir()?;
        let checkout = workspace.path().join("src");
        fs::create_dir_all(&checkout)?;
        let files = unpack(&archive, &checkout)?;
        self.report(format!("unpacked {} files", files))?;

        // EXTRACTING
        self.enter(ScanState::Extracting, "running extraction tool")?;
        let records = self.extract(workspace.path(), &checkout, config.extractor_payload())?;
        let snapshot = Snapshot::new(
            generate_id("snap", &project.id),
            project.id.clone(),
            records,
        );
        storage.snapshots().insert(&snapshot)?;
        self.report(format!(
            "snapshot {} holds {} annotations",
            snapshot.id,
            snapshot.data.len()
        ))?;

        // DIFFING
        let baseline = storage.snapshots().latest_accepted(&project.id)?;
        let old: Vec<AnnotationRecord> = match &baseline {
            Some(baseline) => storage
                .registry()
                .anchored_to(&project.id, &baseline.id)?
                .iter()
                .map(|entry| entry.to_record())
                .collect(),
            None => Vec::new(),
        };
        self.enter(
            ScanState::Diffing,
            match &baseline {
                Some(b) => format!("diffing against {} ({} tracked)", b.id, old.len()),
                None => "no accepted baseline; every annotation is new".to_string(),
            },
        )?;
        let items = self.diff(workspace.path(), &old, &snapshot.data)?;
        check_coverage(&snapshot.data, &items)?;

        // PERSISTING
        self.enter(ScanState::Persisting, "recording diff")?;
        let commit = match &config.branch {
            Some(branch) => match self.scanner.source.commit_info(&repo, branch, creds) {
                Ok(commit) => commit,
                Err(e) => {
                    tracing::warn!(
                        parent: &self.scanner.span,
                        branch = %branch,
                        error = %e,
                        "could not resolve commit metadata"
                    );
                    None
                }
            },
            None => None,
        };

        let mut envelope = DiffEnvelope::pending(
            generate_id("diff", &project.id),
            project.id.clone(),
            baseline.as_ref().map(|b| b.id.clone()),
            snapshot.id.clone(),
            items,
        );
        envelope.commit = commit;

        let tx = storage.transaction()?;
        let superseded = {
            let envelopes: Table<'_, DiffEnvelope> = Table::new(&tx);
            let superseded = envelopes.supersede_pending(&project.id)?;
            envelopes.insert(&envelope)?;
            superseded
        };
        tx.commit()?;

        if !superseded.is_empty() {
            self.report(format!("superseded {}", superseded.join(", ")))?;
        }

        let summary = ScanSummary {
            project_id: project.id.clone(),
            snapshot_id: snapshot.id.clone(),
            envelope_id: envelope.id.clone(),
            baseline_id: envelope.old_snapshot_id.clone(),
            superseded,
            annotations: snapshot.data.len(),
            counts: envelope.counts(),
            commit: envelope.commit.clone(),
        };
        self.report(format!(
            "diff {}: {}",
            summary.envelope_id,
            summary.counts_line()
        ))?;
        Ok(summary)
    }

    /// `extract <path> <config.json> > output.json`
    fn extract(
        &self,
        workspace: &Path,
        checkout: &Path,
        payload: serde_json::Value,
    ) -> Result<Vec<AnnotationRecord>> {
        let config_path = workspace.join("config.json");
        let output_path = workspace.join("output.json");
        fs::write(&config_path, serde_json::to_vec_pretty(&payload)?)?;

        self.tool(&self.scanner.tools.extract)
            .arg(checkout)
            .arg(&config_path)
            .stdout_to(&output_path)
            .current_dir(workspace)
            .run()?;

        let records: Vec<AnnotationRecord> = read_tool_output(&output_path, "extraction tool")?;
        let mut seen = HashSet::new();
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.id.as_str())) {
            return Err(Error::ExternalTool(format!(
                "extraction tool returned duplicate annotation id {}",
                dup.id
            )));
        }
        Ok(records)
    }

    /// `diff <old.json> <new.json> > diff.json 2> err.log`
    fn diff(
        &self,
        workspace: &Path,
        old: &[AnnotationRecord],
        new: &[AnnotationRecord],
    ) -> Result<Vec<DiffItem>> {
        let old_path = workspace.join("old.json");
        let new_path = workspace.join("new.json");
        let diff_path = workspace.join("diff.json");
        fs::write(&old_path, serde_json::to_vec(old)?)?;
        fs::write(&new_path, serde_json::to_vec(new)?)?;

        self.tool(&self.scanner.tools.diff)
            .arg(&old_path)
            .arg(&new_path)
            .stdout_to(&diff_path)
            .stderr_to(workspace.join("err.log"))
            .current_dir(workspace)
            .run()?;

        read_tool_output(&diff_path, "diff tool")
    }
}

fn read_tool_output<T: serde::de::DeserializeOwned>(path: &Path, tool: &str) -> Result<Vec<T>> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text)
        .map_err(|e| Error::ExternalTool(format!("{} produced invalid JSON: {}", tool, e)))
}

/// Every annotation in the new snapshot must appear in the diff, and every
/// non-DELETE item must refer to an annotation in the new snapshot.
fn check_coverage(new: &[AnnotationRecord], items: &[DiffItem]) -> Result<()> {
    let live: Vec<&DiffItem> = items.iter().filter(|i| i.kind != DiffKind::Delete).collect();
    let coverage = diff_keyed(new, live, |r| r.id.clone(), |i| i.id.clone());

    if let Some(missing) = coverage.removed.first() {
        return Err(Error::ExternalTool(format!(
            "diff tool output has no item for annotation {}",
            missing.id
        )));
    }
    if let Some(unknown) = coverage.added.first() {
        return Err(Error::ExternalTool(format!(
            "diff tool reported {} for unknown annotation {}",
            unknown.kind, unknown.id
        )));
    }
    Ok(())
}
