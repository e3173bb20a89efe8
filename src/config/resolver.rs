//! Precedence resolution for configuration.
//!
//! Every setting is resolved independently, highest precedence first:
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`LB_EXTRACT_CMD`, `LB_DIFF_CMD`, `LB_TOOL_TIMEOUT`,
//!    `LB_GITHUB_TOKEN`, `LB_LOG`)
//! 3. config.kdl (`$LB_CONFIG`, else `~/.config/logbook/config.kdl`)
//! 4. Built-in defaults

use super::schema::{LogFormat, LogbookConfig};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "LB_CONFIG";
/// Environment variable overriding the extraction tool command line.
pub const EXTRACT_CMD_ENV: &str = "LB_EXTRACT_CMD";
/// Environment variable overriding the diff tool command line.
pub const DIFF_CMD_ENV: &str = "LB_DIFF_CMD";
/// Environment variable overriding the per-tool timeout (seconds).
pub const TOOL_TIMEOUT_ENV: &str = "LB_TOOL_TIMEOUT";
/// Environment variable holding the GitHub token.
pub const GITHUB_TOKEN_ENV: &str = "LB_GITHUB_TOKEN";
/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "LB_LOG";

/// Default extraction tool.
pub const DEFAULT_EXTRACT: &str = "annotate-extract";
/// Default diff tool (bundled).
pub const DEFAULT_DIFF: &str = "lb-diff";
/// Default per-tool timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl at this path
    ConfigFile(String),
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile(path) => write!(f, "config:{}", path),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// An external tool: program and leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from `[program, args...]`.
    pub fn from_parts(parts: Vec<String>) -> Result<Self> {
        let mut parts = parts.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::Validation("tool command needs a program".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Split a whitespace-separated command line (env vars and CLI flags).
    pub fn parse(line: &str) -> Result<Self> {
        Self::from_parts(line.split_whitespace().map(str::to_string).collect())
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub extract: Resolved<ToolCommand>,
    pub diff: Resolved<ToolCommand>,
    pub tool_timeout: Resolved<Duration>,
    pub log_level: Resolved<String>,
    pub log_format: Resolved<LogFormat>,
    /// GitHub token for private repositories
    pub github_token: Option<Resolved<String>>,
    pub github_api: Option<Resolved<String>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            extract: Resolved::new(ToolCommand::new(DEFAULT_EXTRACT), ValueSource::Default),
            diff: Resolved::new(ToolCommand::new(DEFAULT_DIFF), ValueSource::Default),
            tool_timeout: Resolved::new(DEFAULT_TOOL_TIMEOUT, ValueSource::Default),
            log_level: Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
            log_format: Resolved::new(LogFormat::Text, ValueSource::Default),
            github_token: None,
            github_api: None,
        }
    }
}

impl ResolvedConfig {
    /// Get the token value, if set.
    pub fn token(&self) -> Option<&str> {
        self.github_token.as_ref().map(|r| r.value.as_str())
    }

    /// Get the masked token for display purposes.
    pub fn masked_token(&self) -> Option<String> {
        self.github_token.as_ref().map(|r| {
            let token = &r.value;
            if token.len() <= 12 {
                format!("{}...", &token[..4.min(token.len())])
            } else {
                format!("{}...{}", &token[..4], &token[token.len() - 4..])
            }
        })
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub extract: Option<String>,
    pub diff: Option<String>,
    pub tool_timeout_secs: Option<u64>,
    pub github_token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

/// Location of config.kdl.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("logbook").join("config.kdl"))
}

/// Resolve configuration from the process environment and the default config file.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let (file, path) = match config_path() {
        Some(path) => (LogbookConfig::load(&path)?, path),
        None => (LogbookConfig::default(), PathBuf::from("config.kdl")),
    };
    resolve_with(overrides, &|name| std::env::var(name).ok(), &file, &path)
}

/// Resolve from explicit sources. `lookup` reads an environment variable.
pub fn resolve_with(
    overrides: &ConfigOverrides,
    lookup: &dyn Fn(&str) -> Option<String>,
    file: &LogbookConfig,
    file_path: &Path,
) -> Result<ResolvedConfig> {
    let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let from_file = || ValueSource::ConfigFile(file_path.display().to_string());
    let from_env = |name: &str| ValueSource::EnvVar(name.to_string());

    let mut result = ResolvedConfig::default();

    // Tools
    if let Some(line) = &overrides.extract {
        result.extract = Resolved::new(ToolCommand::parse(line)?, ValueSource::CliFlag);
    } else if let Some(line) = env(EXTRACT_CMD_ENV) {
        result.extract = Resolved::new(ToolCommand::parse(&line)?, from_env(EXTRACT_CMD_ENV));
    } else if let Some(parts) = &file.extract {
        result.extract = Resolved::new(ToolCommand::from_parts(parts.clone())?, from_file());
    }

    if let Some(line) = &overrides.diff {
        result.diff = Resolved::new(ToolCommand::parse(line)?, ValueSource::CliFlag);
    } else if let Some(line) = env(DIFF_CMD_ENV) {
        result.diff = Resolved::new(ToolCommand::parse(&line)?, from_env(DIFF_CMD_ENV));
    } else if let Some(parts) = &file.diff {
        result.diff = Resolved::new(ToolCommand::from_parts(parts.clone())?, from_file());
    }

    // Timeout
    if let Some(secs) = overrides.tool_timeout_secs {
        result.tool_timeout = Resolved::new(timeout(secs)?, ValueSource::CliFlag);
    } else if let Some(raw) = env(TOOL_TIMEOUT_ENV) {
        let secs = raw.trim().parse::<u64>().map_err(|_| {
            Error::Validation(format!("{} must be a number of seconds, got {}", TOOL_TIMEOUT_ENV, raw))
        })?;
        result.tool_timeout = Resolved::new(timeout(secs)?, from_env(TOOL_TIMEOUT_ENV));
    } else if let Some(secs) = file.timeout_secs {
        result.tool_timeout = Resolved::new(timeout(secs)?, from_file());
    }

    // Logging
    if let Some(level) = &overrides.log_level {
        result.log_level = Resolved::new(level.clone(), ValueSource::CliFlag);
    } else if let Some(level) = env(LOG_ENV) {
        result.log_level = Resolved::new(level, from_env(LOG_ENV));
    } else if let Some(level) = &file.log_level {
        result.log_level = Resolved::new(level.clone(), from_file());
    }

    if let Some(format) = overrides.log_format {
        result.log_format = Resolved::new(format, ValueSource::CliFlag);
    } else if let Some(format) = file.log_format {
        result.log_format = Resolved::new(format, from_file());
    }

    // GitHub
    if let Some(token) = &overrides.github_token {
        result.github_token = Some(Resolved::new(token.clone(), ValueSource::CliFlag));
    } else if let Some(token) = env(GITHUB_TOKEN_ENV) {
        result.github_token = Some(Resolved::new(token, from_env(GITHUB_TOKEN_ENV)));
    } else if let Some(token) = &file.github_token {
        result.github_token = Some(Resolved::new(token.clone(), from_file()));
    }

    if let Some(api) = &file.github_api {
        result.github_api = Some(Resolved::new(api.clone(), from_file()));
    }

    Ok(result)
}

fn timeout(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Validation("tool timeout must be positive".to_string()));
    }
    Ok(Duration::from_secs(secs))
}
