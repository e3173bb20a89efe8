//! Logbook - a project tracker that keeps tasks in step with annotations in code.
//!
//! This library provides the core functionality for the `lb` CLI tool:
//! scanning a repository for tagged comments, reviewing the diff between
//! scans, and reconciling the accepted changes into the task store.

pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod linkdiff;
pub mod logging;
pub mod models;
pub mod process;
pub mod reconcile;
pub mod scan;
pub mod source;
pub mod storage;
pub mod tasks;

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::Path;
    use tempfile::TempDir;

    use crate::models::{Project, RepoLink};
    use crate::storage::{Storage, generate_id};

    /// Test environment with an isolated data directory.
    pub struct TestEnv {
        /// Stand-in for a repository checkout
        pub repo_dir: TempDir,
        /// Holds the database
        pub data_dir: TempDir,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self {
                repo_dir: TempDir::new().unwrap(),
                data_dir: TempDir::new().unwrap(),
            }
        }

        /// Get the path to the simulated repository.
        pub fn path(&self) -> &Path {
            self.repo_dir.path()
        }

        /// Get the path to the isolated data directory.
        pub fn data_path(&self) -> &Path {
            self.data_dir.path()
        }

        /// Open storage for this test environment (DI-based).
        pub fn open_storage(&self) -> Storage {
            Storage::open_in(self.data_path()).unwrap()
        }

        /// Open storage and register a project linked to `repo_dir`.
        pub fn storage_with_project(&self, owner: &str) -> (Storage, Project) {
            let storage = self.open_storage();
            let project = self.add_project(&storage, owner);
            (storage, project)
        }

        /// Register another project linked to `repo_dir`.
        pub fn add_project(&self, storage: &Storage, owner: &str) -> Project {
            let mut project = Project::new(
                generate_id("proj", "test project"),
                owner.to_string(),
                "test project".to_string(),
            );
            project.repo = Some(RepoLink::Local {
                path: self.path().to_string_lossy().to_string(),
            });
            storage.projects().insert(&project).unwrap();
            project
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Library-level error type for Logbook operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Logbook operations.
pub type Result<T> = std::result::Result<T, Error>;
