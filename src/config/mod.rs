//! Configuration for Logbook.
//!
//! ## config.kdl - user preferences and tool setup
//!
//! Located at `$LB_CONFIG`, else `~/.config/logbook/config.kdl`.
//!
//! Contains:
//! - `tools` block - extraction and diff tool command lines, per-tool timeout
//! - `log-level` / `log-format` - logging defaults
//! - `github-token` / `github-api` - access to private or enterprise repositories
//!
//! ## Precedence
//!
//! CLI flag > environment variable > config.kdl > built-in defaults.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, GITHUB_TOKEN_ENV, LOG_ENV, Resolved, ResolvedConfig, ToolCommand,
    ValueSource, config_path, resolve_config, resolve_with,
};
pub use schema::{LogFormat, LogbookConfig};
