//! Progress events emitted by a running scan.

use crate::models::{CommitInfo, DiffKind};
use serde::Serialize;
use std::fmt;

/// Marker line that ends a successful scan stream.
pub const DONE_LINE: &str = "done";

/// Pipeline stage. Ending states are carried by [`ScanEvent::Done`] and
/// [`ScanEvent::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
    Starting,
    Cloning,
    Extracting,
    Diffing,
    Persisting,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Starting => "starting",
            ScanState::Cloning => "cloning",
            ScanState::Extracting => "extracting",
            ScanState::Diffing => "diffing",
            ScanState::Persisting => "persisting",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub project_id: String,
    pub snapshot_id: String,
    pub envelope_id: String,
    /// Accepted snapshot the diff was taken against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_id: Option<String>,
    /// PENDING envelopes moved to IGNORED by this scan
    pub superseded: Vec<String>,
    pub annotations: usize,
    pub counts: Vec<(DiffKind, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
}

impl ScanSummary {
    /// e.g. `2 new, 1 move, 5 same`
    pub fn counts_line(&self) -> String {
        if self.counts.is_empty() {
            return "no changes".to_string();
        }
        self.counts
            .iter()
            .map(|(kind, n)| format!("{} {}", n, kind.as_str().to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One item on the progress channel.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// The pipeline entered or progressed within a stage
    Progress { state: ScanState, message: String },
    /// Terminal success
    Done(ScanSummary),
    /// Terminal failure in `state`
    Failed { state: ScanState, error: String },
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::Progress { .. })
    }

    /// The text line for this event. Success ends with exactly `done`.
    pub fn to_line(&self) -> String {
        match self {
            ScanEvent::Progress { state, message } => format!("[{}] {}", state, message),
            ScanEvent::Done(_) => DONE_LINE.to_string(),
            ScanEvent::Failed { state, error } => format!("error: {} (while {})", error, state),
        }
    }
}
