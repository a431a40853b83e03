//! Read-only git queries
//!
//! The [GitProvider] trait is the only way the rest of the crate looks at
//! repository history. Implementations:
//!
//! - [repository::Git2Provider]: in-process, using the `git2` crate
//! - [exec::ExecGitProvider]: shells out to the system `git` binary
//! - [mock::MockGitProvider]: in-memory history for tests
//!
//! The backend is chosen once at startup; callers hold a `&dyn GitProvider`.
//!
//! ```rust
//! # use relgate::git::GitProvider;
//! # fn example(git: &dyn GitProvider) -> relgate::Result<()> {
//! let head = git.current_commit()?;
//! let tags = git.tags_reachable_from("HEAD")?;
//! # Ok(())
//! # }
//! ```

pub mod exec;
pub mod mock;
pub mod repository;

pub use exec::ExecGitProvider;
pub use mock::MockGitProvider;
pub use repository::Git2Provider;

use crate::domain::{CommitRef, TagRef, Version};
use crate::error::{RelgateError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Upper bound on first-parent steps when looking for a tagged ancestor
const MAX_WALK_DEPTH: usize = 100_000;

/// Owner, name and remote URL of the local checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepositoryMetadata {
    pub owner: String,
    pub name: String,
    pub remote: String,
}

/// Read-only repository queries
///
/// All methods are pure queries. Implementations map "cannot resolve this
/// ref" to [RelgateError::RefNotFound], which is distinct from "resolved, but
/// carries no tags".
pub trait GitProvider: Send + Sync {
    /// Resolve a ref (`HEAD`, branch, tag, full hash) to a full commit hash
    fn resolve_commit(&self, reference: &str) -> Result<String>;

    /// Name of the checked-out branch; empty on a detached HEAD
    fn current_branch(&self) -> Result<String>;

    /// First parent of a commit, `None` for a root commit
    fn first_parent(&self, commit: &str) -> Result<Option<String>>;

    /// Every tag in the repository grouped by the commit it peels to
    fn tag_index(&self) -> Result<HashMap<String, Vec<String>>>;

    /// Hash of the resolved tree, independent of author, message and time
    fn content_hash(&self, reference: &str) -> Result<String>;

    /// Full message of the resolved commit
    fn commit_message(&self, reference: &str) -> Result<String>;

    /// True if tracked files have uncommitted changes; untracked files are ignored
    fn is_dirty(&self) -> Result<bool>;

    /// URL of the preferred remote (`origin` first), if any remote exists
    fn remote_url(&self) -> Result<Option<String>>;

    /// Full hash of `HEAD`
    fn current_commit(&self) -> Result<String> {
        self.resolve_commit("HEAD")
    }

    /// Tags on `reference` and its first-parent ancestors
    ///
    /// Walks from the resolved commit toward the root, collecting every tag
    /// on each visited commit, and stops after the first commit that carries
    /// a semver tag. If `reference` itself names a tag the walk stops at that
    /// commit. The result is ordered nearest commit first, names sorted within
    /// a commit.
    fn tags_reachable_from(&self, reference: &str) -> Result<Vec<TagRef>> {
        let index = self.tag_index()?;
        let start = self.resolve_commit(reference)?;
        let reference_is_tag = reference.starts_with("refs/tags/")
            || index.values().any(|names| names.iter().any(|n| n == reference));

        let mut collected = Vec::new();
        let mut current = Some(start);
        let mut depth = 0;

        while let Some(hash) = current {
            let mut names = index.get(&hash).cloned().unwrap_or_default();
            names.sort();

            let tagged = names.iter().any(|n| Version::parse(n).is_ok());
            collected.extend(names.into_iter().map(|n| TagRef::new(n, hash.clone())));

            depth += 1;
            if tagged || reference_is_tag || depth >= MAX_WALK_DEPTH {
                debug!(reference, commit = %hash, depth, "stopped tag walk");
                break;
            }
            current = self.first_parent(&hash)?;
        }

        Ok(collected)
    }

    /// Owner and name parsed from the preferred remote's URL
    fn local_repository_metadata(&self) -> Result<LocalRepositoryMetadata> {
        let remote = self
            .remote_url()?
            .ok_or_else(|| RelgateError::ref_not_found("no git remotes configured"))?;
        parse_remote_url(&remote).ok_or_else(|| {
            RelgateError::config(format!("Cannot parse owner/name from remote '{}'", remote))
        })
    }
}

/// Gather branch, head, content hash and reachable tags for `reference`
pub fn commit_facts(git: &dyn GitProvider, reference: &str) -> Result<CommitRef> {
    let hash = git.resolve_commit(reference)?;
    let branch = git.current_branch()?;
    let content_hash = git.content_hash(&hash)?;
    let tags = git.tags_reachable_from(reference)?;

    Ok(CommitRef {
        hash,
        branch,
        content_hash,
        tags,
    })
}

/// Split `git@host:owner/name.git` or `https://host/owner/name` into parts
pub fn parse_remote_url(url: &str) -> Option<LocalRepositoryMetadata> {
    static REMOTE_RE: OnceLock<Regex> = OnceLock::new();
    let re = REMOTE_RE.get_or_init(|| {
        Regex::new(r"[:/]([^/:]+)/([^/]+?)(?:\.git)?/?$").expect("remote url regex is valid")
    });

    let caps = re.captures(url.trim())?;
    Some(LocalRepositoryMetadata {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
        remote: url.trim().to_string(),
    })
}

/// True for a full 40-character hex object id
pub(crate) fn is_full_hash(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssh_remote() {
        let meta = parse_remote_url("git@github.com:acme/widget.git").unwrap();
        assert_eq!(meta.owner, "acme");
        assert_eq!(meta.name, "widget");
        assert_eq!(meta.remote, "git@github.com:acme/widget.git");
    }

    #[test]
    fn test_parse_https_remote() {
        let meta = parse_remote_url("https://github.com/acme/widget").unwrap();
        assert_eq!(meta.owner, "acme");
        assert_eq!(meta.name, "widget");
    }

    #[test]
    fn test_parse_https_remote_with_suffix() {
        let meta = parse_remote_url("https://github.com/acme/widget.rs.git").unwrap();
        assert_eq!(meta.name, "widget.rs");
    }

    #[test]
    fn test_parse_remote_invalid() {
        assert!(parse_remote_url("widget").is_none());
    }

    #[test]
    fn test_is_full_hash() {
        assert!(is_full_hash(&"a".repeat(40)));
        assert!(!is_full_hash("HEAD"));
        assert!(!is_full_hash(&"g".repeat(40)));
    }

    #[test]
    fn test_commit_facts() {
        let git = MockGitProvider::new()
            .commit("aa", "initial")
            .tag("v0.3.0")
            .commit("bb", "next")
            .tag("nightly")
            .with_tree("bb", "tree-bb")
            .on_branch("feature/x");

        let facts = commit_facts(&git, "HEAD").unwrap();
        assert_eq!(facts.hash, mock::pad_hash("bb"));
        assert_eq!(facts.branch, "feature/x");
        assert_eq!(facts.content_hash, "tree-bb");
        assert_eq!(facts.tags.len(), 2);
        assert_eq!(facts.latest_semver_tag(), Some(Version::new(0, 3, 0)));
    }

    #[test]
    fn test_metadata_without_remote() {
        let git = MockGitProvider::new().commit("aa", "initial");
        assert!(matches!(
            git.local_repository_metadata(),
            Err(RelgateError::RefNotFound(_))
        ));
    }
}
