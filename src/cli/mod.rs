//! CLI argument definitions for Logbook.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Logbook - keep tasks in step with the annotations in your code.
///
/// Register a project with `lb project add`, run `lb scan`, review the result
/// with `lb diff show`, then apply your decisions with `lb reconcile`.
#[derive(Parser, Debug)]
#[command(name = "lb")]
#[command(author, version, about = "Track TODO/BUG/NOTE annotations as tasks", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Act as this owner (defaults to $USER)
    #[arg(long, global = true, env = "LB_OWNER")]
    pub owner: Option<String>,

    /// Directory holding logbook.db (defaults to ~/.local/share/logbook)
    #[arg(long = "data-dir", global = true, env = "LB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `logbook::scan=debug`
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Log format on stderr: text or json
    #[arg(long = "log-format", global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Scan a project's repository and record a diff for review
    ///
    /// Progress is streamed one line at a time. A successful scan ends with a
    /// line reading exactly `done`; anything else is a failure.
    Scan {
        /// Project ID (e.g., proj-a1b2c3d4)
        project: String,

        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Inspect recorded diffs
    Diff {
        #[command(subcommand)]
        command: DiffCommands,
    },

    /// Inspect annotation snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Accept or reject a diff and apply decisions to its annotations
    Reconcile(ReconcileArgs),

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Show the resolved configuration
    Config,
}

/// Tool and credential overrides for `lb scan`
#[derive(Args, Debug, Default)]
pub struct ToolArgs {
    /// Extraction tool command line
    #[arg(long)]
    pub extract: Option<String>,

    /// Diff tool command line
    #[arg(long)]
    pub diff: Option<String>,

    /// Per-tool timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// GitHub token for private repositories
    #[arg(long = "github-token")]
    pub github_token: Option<String>,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Register a project
    Add {
        /// Project name
        name: String,

        /// Repository: github:owner/name, owner/name, or a local directory
        #[arg(long)]
        repo: Option<String>,

        /// Branch to scan (default branch when omitted)
        #[arg(long)]
        branch: Option<String>,

        /// Tag rule, NAME or NAME=PATTERN[,PATTERN...] (can be specified multiple times)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Glob excluded from extraction (can be specified multiple times)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },

    /// List your projects
    List,

    /// Show a project with its scan state
    Show {
        /// Project ID
        id: String,
    },
}

/// Diff subcommands
#[derive(Subcommand, Debug)]
pub enum DiffCommands {
    /// List the diffs recorded for a project, newest first
    List {
        /// Project ID
        project: String,
    },

    /// Show one diff with all of its items
    Show {
        /// Diff ID (e.g., diff-a1b2c3d4)
        id: String,
    },
}

/// Snapshot subcommands
#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// List the snapshots of a project, newest first
    List {
        /// Project ID
        project: String,
    },
}

/// Arguments for `lb reconcile`
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Project ID
    pub project: String,

    /// Diff ID
    pub diff: String,

    /// Create a task for this annotation (can be specified multiple times)
    #[arg(long = "create", value_name = "ID")]
    pub create: Vec<String>,

    /// Keep the linked task, renaming it if --title is given
    #[arg(long = "confirm", value_name = "ID")]
    pub confirm: Vec<String>,

    /// Mark the linked task completed
    #[arg(long = "complete", value_name = "ID")]
    pub complete: Vec<String>,

    /// Mark the linked task completed and stop tracking the annotation
    #[arg(long = "delete", value_name = "ID")]
    pub delete: Vec<String>,

    /// Drop the registry entry, leaving the task alone
    #[arg(long = "unlink", value_name = "ID")]
    pub unlink: Vec<String>,

    /// Do nothing for this annotation
    #[arg(long = "ignore", value_name = "ID")]
    pub ignore: Vec<String>,

    /// Any decision as ACTION=ID
    #[arg(long = "decision", value_name = "ACTION=ID")]
    pub decisions: Vec<String>,

    /// Task title for an annotation as ID=TITLE
    #[arg(long = "title", value_name = "ID=TITLE")]
    pub titles: Vec<String>,

    /// Reject the diff instead of accepting it; decisions are not applied
    #[arg(long)]
    pub reject: bool,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task, or update it when --id names an existing one
    ///
    /// The task's tags are set to exactly the --tag values given.
    Upsert {
        /// Task ID to update
        #[arg(long)]
        id: Option<String>,

        /// Task title (required for new tasks)
        #[arg(long)]
        title: Option<String>,

        /// Project ID
        #[arg(long)]
        project: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// unstarted, in_progress or completed
        #[arg(long)]
        progress: Option<String>,

        /// low, medium or high
        #[arg(short, long)]
        priority: Option<String>,

        /// private or public
        #[arg(long)]
        visibility: Option<String>,

        /// Tag title (can be specified multiple times)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// List your tasks
    List {
        /// Only tasks of this project
        #[arg(long)]
        project: Option<String>,
    },

    /// Show a task
    Show {
        /// Task ID (e.g., lb-a1b2c3d4)
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_reconcile_args() {
        let cli = Cli::try_parse_from([
            "lb",
            "reconcile",
            "proj-1",
            "diff-1",
            "--create",
            "a1",
            "--create",
            "a2",
            "--title",
            "a1=Fix it",
            "--decision",
            "ARCHIVE=a3",
        ])
        .unwrap();
        match cli.command {
            Commands::Reconcile(args) => {
                assert_eq!(args.create, vec!["a1", "a2"]);
                assert_eq!(args.titles, vec!["a1=Fix it"]);
                assert_eq!(args.decisions, vec!["ARCHIVE=a3"]);
                assert!(!args.reject);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lb", "task", "list", "-H", "--owner", "ana"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.owner.as_deref(), Some("ana"));
    }
}
