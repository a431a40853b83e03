//! In-memory release host for tests
//!
//! Releases are listed newest first, matching the order hosts return them.

use crate::domain::{Release, Version};
use crate::error::{RelgateError, Result};
use crate::ledger::ReleaseProvider;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock release provider, cheap to clone; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockReleaseProvider {
    inner: Arc<Mutex<MockReleaseInner>>,
}

#[derive(Debug, Default)]
struct MockReleaseInner {
    /// Oldest first
    releases: Vec<Release>,
    /// (tag, artifact name) -> content
    artifacts: HashMap<(String, String), Vec<u8>>,
    next_id: u64,
    uploads: usize,
}

impl MockReleaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockReleaseInner>> {
        self.inner
            .lock()
            .map_err(|_| RelgateError::release("mock provider lock poisoned"))
    }

    /// Stored bytes of an artifact
    pub fn artifact_content(&self, tag: &str, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .ok()?
            .artifacts
            .get(&(tag.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of uploads that actually stored new content
    pub fn upload_count(&self) -> usize {
        self.lock().map(|inner| inner.uploads).unwrap_or_default()
    }
}

impl MockReleaseInner {
    fn find_mut(&mut self, tag: &str) -> Result<&mut Release> {
        self.releases
            .iter_mut()
            .find(|r| r.tag == tag)
            .ok_or_else(|| RelgateError::release_not_found(tag))
    }
}

impl ReleaseProvider for MockReleaseProvider {
    fn create_release(&self, tag: &str, commit: &str) -> Result<Release> {
        let mut inner = self.lock()?;
        if inner.releases.iter().any(|r| r.tag == tag) {
            return Err(RelgateError::release(format!("release '{}' already exists", tag)));
        }

        inner.next_id += 1;
        let release = Release {
            id: inner.next_id.to_string(),
            commit_hash: commit.to_string(),
            tag: tag.to_string(),
            pr: None,
            artifacts: Vec::new(),
            draft: true,
        };
        inner.releases.push(release.clone());
        Ok(release)
    }

    fn tag_release(&self, release: &Release, version: &Version, commit: &str) -> Result<Release> {
        let mut inner = self.lock()?;
        let new_tag = version.to_tag(false);
        inner.find_mut(&release.tag)?;

        let keys: Vec<(String, String)> = inner
            .artifacts
            .keys()
            .filter(|(tag, _)| *tag == release.tag)
            .cloned()
            .collect();
        for key in keys {
            if let Some(content) = inner.artifacts.remove(&key) {
                inner.artifacts.insert((new_tag.clone(), key.1), content);
            }
        }

        let stored = inner.find_mut(&release.tag)?;
        stored.tag = new_tag;
        stored.commit_hash = commit.to_string();
        Ok(stored.clone())
    }

    fn get_release_by_tag(&self, tag: &str) -> Result<Release> {
        let mut inner = self.lock()?;
        Ok(inner.find_mut(tag)?.clone())
    }

    fn list_recent_releases(&self, limit: usize) -> Result<Vec<Release>> {
        let inner = self.lock()?;
        Ok(inner.releases.iter().rev().take(limit).cloned().collect())
    }

    fn upload_release_artifact(&self, release: &Release, name: &str, path: &Path) -> Result<()> {
        let content = fs::read(path)?;
        let mut inner = self.lock()?;
        let key = (release.tag.clone(), name.to_string());

        if inner.artifacts.get(&key) == Some(&content) {
            return Ok(());
        }

        let stored = inner.find_mut(&release.tag)?;
        if !stored.has_artifact(name) {
            stored.artifacts.push(name.to_string());
        }
        inner.artifacts.insert(key, content);
        inner.uploads += 1;
        Ok(())
    }

    fn download_release_artifact(
        &self,
        release: &Release,
        name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let content = self
            .artifact_content(&release.tag, name)
            .ok_or_else(|| {
                RelgateError::release_not_found(format!("{} on {}", name, release.tag))
            })?;

        let path = dest_dir.join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    fn publish_release(&self, release: &Release) -> Result<Release> {
        let mut inner = self.lock()?;
        let stored = inner.find_mut(&release.tag)?;
        stored.draft = false;
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_releases_newest_first() {
        let provider = MockReleaseProvider::new();
        provider.create_release("v1.0.0", "a").unwrap();
        provider.create_release("v1.1.0", "b").unwrap();

        let tags: Vec<String> = provider
            .list_recent_releases(10)
            .unwrap()
            .into_iter()
            .map(|r| r.tag)
            .collect();
        assert_eq!(tags, vec!["v1.1.0", "v1.0.0"]);
    }

    #[test]
    fn test_identical_upload_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bin");
        fs::write(&file, "x").unwrap();

        let provider = MockReleaseProvider::new();
        let release = provider.create_release("v1.0.0", "a").unwrap();
        provider.upload_release_artifact(&release, "bin", &file).unwrap();
        provider.upload_release_artifact(&release, "bin", &file).unwrap();
        assert_eq!(provider.upload_count(), 1);

        fs::write(&file, "y").unwrap();
        provider.upload_release_artifact(&release, "bin", &file).unwrap();
        assert_eq!(provider.upload_count(), 2);
    }

    #[test]
    fn test_tag_release_moves_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bin");
        fs::write(&file, "x").unwrap();

        let provider = MockReleaseProvider::new();
        let release = provider.create_release("v1.0.0-pr.3", "a").unwrap();
        provider.upload_release_artifact(&release, "bin", &file).unwrap();

        let retagged = provider
            .tag_release(&release, &Version::new(1, 0, 0), "b")
            .unwrap();
        assert_eq!(retagged.tag, "v1.0.0");
        assert_eq!(retagged.commit_hash, "b");
        assert!(provider.artifact_content("v1.0.0", "bin").is_some());
        assert!(provider.get_release_by_tag("v1.0.0-pr.3").is_err());
    }

    #[test]
    fn test_tag_unknown_release_changes_nothing() {
        let provider = MockReleaseProvider::new();
        let release = provider.create_release("v1.0.0-pr.3", "a").unwrap();
        provider.lock().unwrap().releases.clear();
        provider
            .lock()
            .unwrap()
            .artifacts
            .insert(("v1.0.0-pr.3".to_string(), "bin".to_string()), b"x".to_vec());

        let err = provider
            .tag_release(&release, &Version::new(1, 0, 0), "b")
            .unwrap_err();
        assert!(matches!(err, RelgateError::ReleaseNotFound(_)));
        assert!(provider.artifact_content("v1.0.0-pr.3", "bin").is_some());
        assert!(provider.artifact_content("v1.0.0", "bin").is_none());
    }

    #[test]
    fn test_missing_release() {
        let provider = MockReleaseProvider::new();
        let err = provider.get_release_by_tag("v9.9.9").unwrap_err();
        assert!(matches!(err, RelgateError::ReleaseNotFound(_)));
    }
}
