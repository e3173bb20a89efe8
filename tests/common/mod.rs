//! Common test utilities for logbook integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/logbook/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Owner every `lb()` command acts as.
pub const OWNER: &str = "ana";

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates three temporary directories:
/// - `repo_dir`: Acts as the repository a project links to
/// - `data_dir`: Holds logbook.db (via `LB_DATA_DIR`)
/// - `tools_dir`: Fake tools and their canned output
///
/// The `lb()` method returns a `Command` that sets the environment
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub data_dir: TempDir,
    pub tools_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
            tools_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the lb binary with isolated data and config.
    pub fn lb(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lb"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("LB_DATA_DIR", self.data_dir.path());
        cmd.env("LB_OWNER", OWNER);
        cmd.env("LB_CONFIG", self.data_dir.path().join("config.kdl"));
        for var in ["LB_EXTRACT_CMD", "LB_DIFF_CMD", "LB_TOOL_TIMEOUT", "LB_GITHUB_TOKEN", "LB_LOG"] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Same as `lb()`, acting as another owner.
    pub fn lb_as(&self, owner: &str) -> Command {
        let mut cmd = self.lb();
        cmd.env("LB_OWNER", owner);
        cmd
    }

    /// Get the path to the repo directory.
    pub fn path(&self) -> &Path {
        self.repo_dir.path()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    /// Run `lb` and parse its stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.lb().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "lb {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Register a project linked to `repo_dir` and return its id.
    pub fn add_project(&self, name: &str) -> String {
        let repo = self.path().to_string_lossy().to_string();
        let project = self.json(&["project", "add", name, "--repo", &repo]);
        project["id"].as_str().unwrap().to_string()
    }

    /// Path of the canned extractor output.
    pub fn annotations_path(&self) -> PathBuf {
        self.tools_dir.path().join("annotations.json")
    }

    /// Set what the fake extractor reports.
    pub fn set_annotations(&self, json: &str) {
        fs::write(self.annotations_path(), json).unwrap();
    }

    /// Write an executable shell script into `tools_dir`.
    #[cfg(unix)]
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.tools_dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Extractor that prints the canned annotations.
    #[cfg(unix)]
    pub fn extractor(&self) -> PathBuf {
        self.script(
            "extract.sh",
            &format!("cat '{}'", self.annotations_path().display()),
        )
    }

    /// The bundled reference diff tool.
    pub fn diff_tool(&self) -> &'static str {
        env!("CARGO_BIN_EXE_lb-diff")
    }

    /// Run `lb scan` with the fake extractor and `lb-diff`.
    #[cfg(unix)]
    pub fn scan(&self, project: &str) -> assert_cmd::assert::Assert {
        let extract = self.extractor();
        self.lb()
            .args(["scan", project, "--timeout", "30"])
            .arg("--extract")
            .arg(&extract)
            .arg("--diff")
            .arg(self.diff_tool())
            .assert()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// The last non-empty line of some output.
pub fn last_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}
