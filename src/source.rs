//! Repository content fetchers.
//!
//! A scan needs two things from the linked repository: a gzip tar archive of
//! the tracked branch, and the branch list used to attach commit metadata to
//! the diff envelope. [`RepoSource`] provides both:
//!
//! - [`GitHub`] talks to the GitHub REST API (`/tarball`, `/branches`, `/commits`)
//! - [`LocalDir`] packs a directory on disk and reads its `.git` refs
//! - [`Sources`] dispatches on the project's [`RepoLink`]

use crate::models::{CommitInfo, RepoLink};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// GitHub API base URL
const GITHUB_API_BASE: &str = "https://api.github.com";

/// User-Agent header required by GitHub API
const USER_AGENT: &str = "logbook-cli";

/// Largest archive accepted from a remote.
const MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;

/// Errors that can occur while fetching repository contents.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Token is invalid or expired (401 Unauthorized)
    #[error("Invalid or expired token: GitHub returned 401 Unauthorized")]
    Unauthorized,

    /// Token lacks required permissions (403 Forbidden)
    #[error("Token lacks required permissions: GitHub returned 403 Forbidden")]
    Forbidden,

    /// Repository or branch does not exist, or is not visible to the token
    #[error("Repository not found: {0}")]
    NotFound(String),

    /// Network or other HTTP error
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response
    #[error("Failed to parse GitHub response: {0}")]
    Parse(String),

    /// Archive could not be built or unpacked
    #[error("Archive error: {0}")]
    Archive(String),

    /// The source cannot serve this kind of repository link
    #[error("Unsupported repository link: {0}")]
    Unsupported(String),
}

impl From<FetchError> for crate::Error {
    fn from(e: FetchError) -> Self {
        crate::Error::ExternalTool(e.to_string())
    }
}

/// Access credentials for the repository host.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
}

impl Credentials {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Head commit of one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub name: String,
    pub sha: String,
    pub message: Option<String>,
    pub url: Option<String>,
}

impl BranchHead {
    fn into_commit_info(self) -> CommitInfo {
        CommitInfo {
            branch: self.name,
            sha: self.sha,
            message: self.message,
            url: self.url,
        }
    }
}

/// Pick the branch that best matches `requested`.
///
/// An exact name match wins. Otherwise the candidates are branches whose name
/// contains `requested`; among those `main` is preferred, then `master`, then
/// the first in listing order.
pub fn select_branch<'a>(heads: &'a [BranchHead], requested: &str) -> Option<&'a BranchHead> {
    if let Some(exact) = heads.iter().find(|h| h.name == requested) {
        return Some(exact);
    }
    let candidates: Vec<&BranchHead> = heads
        .iter()
        .filter(|h| h.name.contains(requested))
        .collect();
    ["main", "master"]
        .iter()
        .find_map(|preferred| candidates.iter().find(|h| h.name == *preferred).copied())
        .or_else(|| candidates.first().copied())
}

/// Something that can serve a repository's contents and branch heads.
pub trait RepoSource: Send + Sync {
    /// Fetch a gzip tar archive of `branch` (the default branch when `None`).
    fn fetch_archive(
        &self,
        repo: &RepoLink,
        branch: Option<&str>,
        creds: &Credentials,
    ) -> Result<Vec<u8>, FetchError>;

    /// List branch heads.
    fn branches(&self, repo: &RepoLink, creds: &Credentials) -> Result<Vec<BranchHead>, FetchError>;

    /// Commit metadata for the branch best matching `branch`, if any.
    fn commit_info(
        &self,
        repo: &RepoLink,
        branch: &str,
        creds: &Credentials,
    ) -> Result<Option<CommitInfo>, FetchError> {
        let heads = self.branches(repo, creds)?;
        Ok(select_branch(&heads, branch)
            .cloned()
            .map(BranchHead::into_commit_info))
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
    commit: GitHubBranchCommit,
}

#[derive(Debug, Deserialize)]
struct GitHubBranchCommit {
    sha: String,
}

/// Response from GET /repos/{owner}/{repo}/commits/{sha} (only fields we care about).
#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    html_url: Option<String>,
    commit: GitHubCommitDetail,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    message: String,
}

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GitHub {
    api_base: String,
}

impl Default for GitHub {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
        }
    }
}

impl GitHub {
    /// Client against another API root (GitHub Enterprise).
    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn repo_path<'a>(repo: &'a RepoLink) -> Result<(&'a str, &'a str), FetchError> {
        match repo {
            RepoLink::Github { owner, name } => Ok((owner.as_str(), name.as_str())),
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }

    fn get(&self, url: &str, creds: &Credentials) -> Result<ureq::Response, FetchError> {
        let mut request = ureq::get(url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT)
            .set("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &creds.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        match request.call() {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(401, _)) => Err(FetchError::Unauthorized),
            Err(ureq::Error::Status(403, _)) => Err(FetchError::Forbidden),
            Err(ureq::Error::Status(404, _)) => Err(FetchError::NotFound(url.to_string())),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(FetchError::Http(format!("HTTP {}: {}", code, body)))
            }
            Err(e) => Err(FetchError::Http(e.to_string())),
        }
    }

    fn commit(
        &self,
        owner: &str,
        name: &str,
        sha: &str,
        creds: &Credentials,
    ) -> Result<GitHubCommit, FetchError> {
        let url = format!("{}/repos/{}/{}/commits/{}", self.api_base, owner, name, sha);
        self.get(&url, creds)?
            .into_json()
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

impl RepoSource for GitHub {
    fn fetch_archive(
        &self,
        repo: &RepoLink,
        branch: Option<&str>,
        creds: &Credentials,
    ) -> Result<Vec<u8>, FetchError> {
        let (owner, name) = Self::repo_path(repo)?;
        let url = match branch {
            Some(branch) => format!("{}/repos/{}/{}/tarball/{}", self.api_base, owner, name, branch),
            None => format!("{}/repos/{}/{}/tarball", self.api_base, owner, name),
        };

        let mut bytes = Vec::new();
        self.get(&url, creds)?
            .into_reader()
            .take(MAX_ARCHIVE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(bytes)
    }

    fn branches(&self, repo: &RepoLink, creds: &Credentials) -> Result<Vec<BranchHead>, FetchError> {
        let (owner, name) = Self::repo_path(repo)?;
        let url = format!("{}/repos/{}/{}/branches?per_page=100", self.api_base, owner, name);
        let branches: Vec<GitHubBranch> = self
            .get(&url, creds)?
            .into_json()
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(branches
            .into_iter()
            .map(|b| BranchHead {
                name: b.name,
                sha: b.commit.sha,
                message: None,
                url: None,
            })
            .collect())
    }

    fn commit_info(
        &self,
        repo: &RepoLink,
        branch: &str,
        creds: &Credentials,
    ) -> Result<Option<CommitInfo>, FetchError> {
        let (owner, name) = Self::repo_path(repo)?;
        let heads = self.branches(repo, creds)?;
        let Some(head) = select_branch(&heads, branch) else {
            return Ok(None);
        };

        // The branch list carries no commit message; one more call for the chosen head.
        let commit = self.commit(owner, name, &head.sha, creds)?;
        Ok(Some(CommitInfo {
            branch: head.name.clone(),
            sha: commit.sha,
            message: Some(commit.commit.message),
            url: commit.html_url,
        }))
    }
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Serves a directory on disk, skipping its `.git` folder.
#[derive(Debug, Clone, Default)]
pub struct LocalDir;

impl LocalDir {
    fn root(repo: &RepoLink) -> Result<PathBuf, FetchError> {
        match repo {
            RepoLink::Local { path } => {
                let root = PathBuf::from(path);
                if !root.is_dir() {
                    return Err(FetchError::NotFound(path.clone()));
                }
                Ok(root)
            }
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }

    /// Pack `root` into a gzip tar archive with a single top-level `repo/` folder.
    pub fn pack(root: &Path) -> Result<Vec<u8>, FetchError> {
        let archive_err = |e: std::io::Error| FetchError::Archive(e.to_string());

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder.follow_symlinks(false);

        let mut entries: Vec<_> = fs::read_dir(root)
            .map_err(archive_err)?
            .collect::<std::io::Result<_>>()
            .map_err(archive_err)?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if entry.file_name() == ".git" {
                continue;
            }
            let target = Path::new("repo").join(entry.file_name());
            if entry.file_type().map_err(archive_err)?.is_dir() {
                builder
                    .append_dir_all(&target, entry.path())
                    .map_err(archive_err)?;
            } else {
                builder
                    .append_path_with_name(entry.path(), &target)
                    .map_err(archive_err)?;
            }
        }

        builder
            .into_inner()
            .and_then(|gz| gz.finish())
            .map_err(archive_err)
    }

    /// Resolve the checked-out branch from `.git/HEAD`.
    fn head(root: &Path) -> Option<BranchHead> {
        let git = root.join(".git");
        let head = fs::read_to_string(git.join("HEAD")).ok()?;
        let reference = head.trim().strip_prefix("ref: ")?;
        let name = reference.strip_prefix("refs/heads/")?.to_string();

        let sha = match fs::read_to_string(git.join(reference)) {
            Ok(sha) => sha.trim().to_string(),
            Err(_) => {
                let packed = fs::read_to_string(git.join("packed-refs")).ok()?;
                packed.lines().find_map(|line| {
                    let (sha, r) = line.split_once(' ')?;
                    (r == reference).then(|| sha.to_string())
                })?
            }
        };

        Some(BranchHead {
            name,
            sha,
            message: None,
            url: None,
        })
    }
}

impl RepoSource for LocalDir {
    fn fetch_archive(
        &self,
        repo: &RepoLink,
        _branch: Option<&str>,
        _creds: &Credentials,
    ) -> Result<Vec<u8>, FetchError> {
        Self::pack(&Self::root(repo)?)
    }

    fn branches(&self, repo: &RepoLink, _creds: &Credentials) -> Result<Vec<BranchHead>, FetchError> {
        Ok(Self::head(&Self::root(repo)?).into_iter().collect())
    }
}

/// Dispatches to the source matching each repository link.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub github: GitHub,
    pub local: LocalDir,
}

impl Sources {
    fn pick(&self, repo: &RepoLink) -> &dyn RepoSource {
        match repo {
            RepoLink::Github { .. } => &self.github,
            RepoLink::Local { .. } => &self.local,
        }
    }
}

impl RepoSource for Sources {
    fn fetch_archive(
        &self,
        repo: &RepoLink,
        branch: Option<&str>,
        creds: &Credentials,
    ) -> Result<Vec<u8>, FetchError> {
        self.pick(repo).fetch_archive(repo, branch, creds)
    }

    fn branches(&self, repo: &RepoLink, creds: &Credentials) -> Result<Vec<BranchHead>, FetchError> {
        self.pick(repo).branches(repo, creds)
    }

    fn commit_info(
        &self,
        repo: &RepoLink,
        branch: &str,
        creds: &Credentials,
    ) -> Result<Option<CommitInfo>, FetchError> {
        self.pick(repo).commit_info(repo, branch, creds)
    }
}

// ---------------------------------------------------------------------------
// Unpacking
// ---------------------------------------------------------------------------

/// Unpack a gzip tar archive into `dest`, dropping the top-level folder.
///
/// GitHub tarballs wrap everything in `<owner>-<repo>-<sha>/`; local archives
/// in `repo/`. Entries that would escape `dest` are rejected. Only regular
/// files and directories are written: links are skipped, so no later entry
/// can be routed through one to a path outside `dest`.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<usize, FetchError> {
    let archive_err = |e: std::io::Error| FetchError::Archive(e.to_string());

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut count = 0;
    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let path = entry.path().map_err(archive_err)?.into_owned();
        let kind = entry.header().entry_type();
        if !kind.is_file() && !kind.is_dir() {
            tracing::debug!(path = %path.display(), kind = ?kind, "skipping archive entry");
            continue;
        }

        let mut stripped = PathBuf::new();
        for component in path.components().skip(1) {
            match component {
                Component::Normal(part) => stripped.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(FetchError::Archive(format!(
                        "entry escapes archive root: {}",
                        path.display()
                    )));
                }
            }
        }
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let target = dest.join(&stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(archive_err)?;
        }
        entry.unpack(&target).map_err(archive_err)?;
        if kind.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
