//! Release ledger: idempotence checks and artifact moves against a release host
//!
//! The remote [ReleaseProvider] is the system of record. [ReleaseLedger] only
//! reads from it and proposes changes; it keeps no state of its own.

pub mod github;
pub mod mock;

pub use github::GithubReleaseProvider;
pub use mock::MockReleaseProvider;

use crate::boundary::BoundaryWarning;
use crate::domain::{Release, Version};
use crate::error::{RelgateError, Result};
use crate::git::GitProvider;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Span};

/// Default number of recent releases inspected by the idempotence check
pub const DEFAULT_LOOKBACK: usize = 100;

/// Remote release host capability
pub trait ReleaseProvider: Send + Sync {
    /// Create a draft release for `tag` at `commit`
    fn create_release(&self, tag: &str, commit: &str) -> Result<Release>;

    /// Point an existing release at a new version and commit
    fn tag_release(&self, release: &Release, version: &Version, commit: &str) -> Result<Release>;

    /// Fails with [RelgateError::ReleaseNotFound] when no release has `tag`
    fn get_release_by_tag(&self, tag: &str) -> Result<Release>;

    /// Most recent releases first, at most `limit`
    fn list_recent_releases(&self, limit: usize) -> Result<Vec<Release>>;

    /// Upload `path` as artifact `name`; re-uploading identical content is a no-op
    fn upload_release_artifact(&self, release: &Release, name: &str, path: &Path) -> Result<()>;

    /// Download artifact `name` into `dest_dir` and return the file path
    fn download_release_artifact(
        &self,
        release: &Release,
        name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf>;

    /// Turn a draft into a final release
    fn publish_release(&self, release: &Release) -> Result<Release>;
}

/// Outcome of the idempotence gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCheck {
    pub released: bool,
    /// Tag of the matching release; empty on a miss
    pub tag: String,
}

/// Reads and proposes changes to releases held by a provider
pub struct ReleaseLedger<'a> {
    provider: &'a dyn ReleaseProvider,
    lookback: usize,
    span: Span,
}

impl<'a> ReleaseLedger<'a> {
    pub fn new(provider: &'a dyn ReleaseProvider) -> Self {
        ReleaseLedger {
            provider,
            lookback: DEFAULT_LOOKBACK,
            span: tracing::info_span!("release_ledger"),
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn provider(&self) -> &dyn ReleaseProvider {
        self.provider
    }

    /// Whether a recent release was cut from the current commit
    ///
    /// An empty release list is a clean miss, not an error.
    pub fn already_released(&self, git: &dyn GitProvider) -> Result<ReleaseCheck> {
        let _guard = self.span.enter();

        let current = git.current_commit()?;
        let releases = self.provider.list_recent_releases(self.lookback)?;
        debug!(count = releases.len(), lookback = self.lookback, "listed recent releases");

        match releases.into_iter().find(|r| r.commit_hash == current) {
            Some(release) => {
                BoundaryWarning::AlreadyReleased {
                    commit_hash: current,
                    tag: release.tag.clone(),
                }
                .emit();
                Ok(ReleaseCheck {
                    released: true,
                    tag: release.tag,
                })
            }
            None => Ok(ReleaseCheck {
                released: false,
                tag: String::new(),
            }),
        }
    }

    /// Existing release for `tag`, or a new draft at `commit`
    pub fn ensure_release(&self, tag: &str, commit: &str) -> Result<Release> {
        let _guard = self.span.enter();

        match self.provider.get_release_by_tag(tag) {
            Ok(release) => Ok(release),
            Err(RelgateError::ReleaseNotFound(_)) => {
                info!(tag, commit, "creating draft release");
                self.provider.create_release(tag, commit)
            }
            Err(e) => Err(e),
        }
    }

    /// Copy every artifact of `from` onto `to`
    ///
    /// Artifacts pass through a scratch directory removed on return. The first
    /// failure aborts the copy; artifacts already uploaded stay on `to`.
    pub fn copy_artifacts(
        &self,
        from_provider: &dyn ReleaseProvider,
        from: &Release,
        to: &Release,
    ) -> Result<()> {
        let _guard = self.span.enter();
        let scratch = tempfile::tempdir()?;

        for artifact in &from.artifacts {
            let path = from_provider.download_release_artifact(from, artifact, scratch.path())?;
            self.provider.upload_release_artifact(to, artifact, &path)?;
            debug!(artifact = %artifact, from = %from.tag, to = %to.tag, "copied artifact");
        }

        info!(count = from.artifacts.len(), from = %from.tag, to = %to.tag, "copied artifacts");
        Ok(())
    }

    /// Publish a draft once every expected artifact is present
    pub fn finalize(&self, release: &Release, expected: &[String]) -> Result<Release> {
        let _guard = self.span.enter();

        let current = self.provider.get_release_by_tag(&release.tag)?;
        if let Some(missing) = expected.iter().find(|name| !current.has_artifact(name)) {
            return Err(RelgateError::release_not_found(format!(
                "artifact '{}' missing from release '{}'",
                missing, current.tag
            )));
        }

        if !current.draft {
            debug!(tag = %current.tag, "release already final");
            return Ok(current);
        }

        let published = self.provider.publish_release(&current)?;
        info!(tag = %published.tag, "release finalized");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::pad_hash;
    use crate::git::MockGitProvider;
    use std::fs;

    fn git_at(hash: &str) -> MockGitProvider {
        MockGitProvider::new().commit(hash, "head")
    }

    #[test]
    fn test_already_released_hit() {
        let provider = MockReleaseProvider::new();
        provider.create_release("v1.2.3", &pad_hash("aa")).unwrap();
        provider.create_release("v1.2.2", &pad_hash("bb")).unwrap();

        let check = ReleaseLedger::new(&provider)
            .already_released(&git_at("aa"))
            .unwrap();
        assert!(check.released);
        assert_eq!(check.tag, "v1.2.3");
    }

    #[test]
    fn test_already_released_miss() {
        let provider = MockReleaseProvider::new();
        provider.create_release("v1.2.3", &pad_hash("aa")).unwrap();

        let check = ReleaseLedger::new(&provider)
            .already_released(&git_at("cc"))
            .unwrap();
        assert_eq!(
            check,
            ReleaseCheck {
                released: false,
                tag: String::new()
            }
        );
    }

    #[test]
    fn test_already_released_empty_provider() {
        let provider = MockReleaseProvider::new();
        let check = ReleaseLedger::new(&provider)
            .already_released(&git_at("aa"))
            .unwrap();
        assert!(!check.released);
    }

    #[test]
    fn test_lookback_bounds_search() {
        let provider = MockReleaseProvider::new();
        provider.create_release("v1.0.0", &pad_hash("aa")).unwrap();
        provider.create_release("v1.1.0", &pad_hash("bb")).unwrap();

        let check = ReleaseLedger::new(&provider)
            .with_lookback(1)
            .already_released(&git_at("aa"))
            .unwrap();
        assert!(!check.released);
    }

    #[test]
    fn test_copy_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.tar.gz");
        fs::write(&file, "payload").unwrap();

        let source = MockReleaseProvider::new();
        let from = source.create_release("v1.0.0", "aa").unwrap();
        source.upload_release_artifact(&from, "app.tar.gz", &file).unwrap();
        let from = source.get_release_by_tag("v1.0.0").unwrap();

        let dest = MockReleaseProvider::new();
        let to = dest.create_release("v1.0.0", "aa").unwrap();

        ReleaseLedger::new(&dest).copy_artifacts(&source, &from, &to).unwrap();
        assert_eq!(dest.artifact_content("v1.0.0", "app.tar.gz").unwrap(), b"payload");
    }

    #[test]
    fn test_copy_artifacts_stops_at_first_failure() {
        let source = MockReleaseProvider::new();
        let mut from = source.create_release("v1.0.0", "aa").unwrap();
        from.artifacts = vec!["missing.tar.gz".to_string()];

        let dest = MockReleaseProvider::new();
        let to = dest.create_release("v1.0.0", "aa").unwrap();

        let err = ReleaseLedger::new(&dest)
            .copy_artifacts(&source, &from, &to)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_finalize_requires_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, "a").unwrap();

        let provider = MockReleaseProvider::new();
        let release = provider.create_release("v2.0.0", "aa").unwrap();
        provider.upload_release_artifact(&release, "a", &file).unwrap();

        let ledger = ReleaseLedger::new(&provider);
        let expected = vec!["a".to_string(), "b".to_string()];
        let err = ledger.finalize(&release, &expected).unwrap_err();
        assert!(matches!(err, RelgateError::ReleaseNotFound(_)));

        let published = ledger.finalize(&release, &expected[..1]).unwrap();
        assert!(!published.draft);
    }

    #[test]
    fn test_ensure_release_reuses_existing() {
        let provider = MockReleaseProvider::new();
        let first = provider.create_release("v1.0.0", "aa").unwrap();
        let ledger = ReleaseLedger::new(&provider);

        assert_eq!(ledger.ensure_release("v1.0.0", "aa").unwrap().id, first.id);
        assert_ne!(ledger.ensure_release("v1.1.0", "bb").unwrap().id, first.id);
    }
}
