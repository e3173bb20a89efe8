//! KDL schema for config.kdl.
//!
//! ```kdl
//! tools {
//!     extract "annotate" "extract"   // program + leading args
//!     diff "lb-diff"
//!     timeout-secs 300
//! }
//! log-level "info"
//! log-format "json"                  // or "text"
//! github-token "ghp_xxxxxxxxxxxxxxxxxxxx"
//! github-api "https://github.example.com/api/v3"
//! ```
//!
//! Unknown nodes are ignored so newer files still load in older builds.

use crate::{Error, Result};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines (default)
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings read from config.kdl. Every field is optional; unset fields fall
/// through to the next source during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogbookConfig {
    /// Extraction tool: program followed by leading arguments
    pub extract: Option<Vec<String>>,

    /// Diff tool: program followed by leading arguments
    pub diff: Option<Vec<String>>,

    /// Wall-clock limit per tool invocation, in seconds
    pub timeout_secs: Option<u64>,

    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace` or an EnvFilter directive)
    pub log_level: Option<String>,

    pub log_format: Option<LogFormat>,

    /// GitHub PAT used to fetch private repositories
    pub github_token: Option<String>,

    /// GitHub API root, for GitHub Enterprise
    pub github_api: Option<String>,
}

impl LogbookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config.kdl text.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e| Error::Validation(format!("Failed to parse config.kdl: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Load config.kdl from `path`. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .map_err(|e| Error::Validation(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read config from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        if let Some(tools) = doc.get("tools")
            && let Some(children) = tools.children()
        {
            config.extract = command_node(children, "extract")?;
            config.diff = command_node(children, "diff")?;
            if let Some(node) = children.get("timeout-secs") {
                let secs = first_integer(node)?;
                if secs <= 0 {
                    return Err(Error::Validation(format!(
                        "timeout-secs must be positive, got {}",
                        secs
                    )));
                }
                config.timeout_secs = Some(secs as u64);
            }
        }

        config.log_level = doc.get("log-level").map(first_string).transpose()?;

        if let Some(node) = doc.get("log-format") {
            let value = first_string(node)?;
            config.log_format = Some(LogFormat::parse(&value).ok_or_else(|| {
                Error::Validation(format!("log-format must be text or json, got {}", value))
            })?);
        }

        config.github_token = doc.get("github-token").map(first_string).transpose()?;
        config.github_api = doc.get("github-api").map(first_string).transpose()?;

        Ok(config)
    }
}

/// Positional string arguments of a node.
fn string_args(node: &KdlNode) -> Result<Vec<String>> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| {
            e.value().as_string().map(str::to_string).ok_or_else(|| {
                Error::Validation(format!(
                    "'{}' expects string arguments",
                    node.name().value()
                ))
            })
        })
        .collect()
}

fn first_string(node: &KdlNode) -> Result<String> {
    string_args(node)?.into_iter().next().ok_or_else(|| {
        Error::Validation(format!("'{}' needs a value", node.name().value()))
    })
}

fn first_integer(node: &KdlNode) -> Result<i128> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| {
            Error::Validation(format!(
                "'{}' expects an integer",
                node.name().value()
            ))
        })
}

/// A tool node: program plus leading args, at least one entry.
fn command_node(doc: &KdlDocument, name: &str) -> Result<Option<Vec<String>>> {
    let Some(node) = doc.get(name) else {
        return Ok(None);
    };
    let args = string_args(node)?;
    if args.is_empty() || args[0].trim().is_empty() {
        return Err(Error::Validation(format!("'{}' needs a program", name)));
    }
    Ok(Some(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = LogbookConfig::parse(
            r#"
            tools {
                extract "annotate" "extract"
                diff "lb-diff"
                timeout-secs 30
            }
            log-level "debug"
            log-format "json"
            github-token "ghp_abc"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.extract,
            Some(vec!["annotate".to_string(), "extract".to_string()])
        );
        assert_eq!(config.diff, Some(vec!["lb-diff".to_string()]));
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_format, Some(LogFormat::Json));
        assert_eq!(config.github_token.as_deref(), Some("ghp_abc"));
        assert!(config.github_api.is_none());
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(LogbookConfig::parse("").unwrap(), LogbookConfig::default());
    }

    #[test]
    fn test_unknown_nodes_ignored() {
        let config = LogbookConfig::parse("editor \"nvim\"\nlog-level \"warn\"").unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LogbookConfig::parse("tools { timeout-secs 0 }").is_err());
        assert!(LogbookConfig::parse("tools { timeout-secs \"ten\" }").is_err());
        assert!(LogbookConfig::parse("tools { extract }").is_err());
        assert!(LogbookConfig::parse("log-format \"yaml\"").is_err());
        assert!(LogbookConfig::parse("log-level 3").is_err());
        assert!(LogbookConfig::parse("tools {").is_err());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let config = LogbookConfig::load(&temp.path().join("config.kdl")).unwrap();
        assert_eq!(config, LogbookConfig::default());
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.kdl");
        std::fs::write(&path, "log-format \"xml\"").unwrap();

        let err = LogbookConfig::load(&path).unwrap_err().to_string();
        assert!(err.contains("config.kdl"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("yaml"), None);
    }
}
