use crate::error::{RelgateError, Result};
use crate::git::GitProvider;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct MockCommit {
    parent: Option<String>,
    message: String,
    tree: String,
}

/// In-memory history for testing without a repository on disk
///
/// Commits are added oldest first with [MockGitProvider::commit], which
/// links each new commit to the previous head and moves `HEAD` forward.
#[derive(Debug, Clone, Default)]
pub struct MockGitProvider {
    commits: HashMap<String, MockCommit>,
    tags: HashMap<String, String>,
    branches: HashMap<String, String>,
    head: Option<String>,
    branch: String,
    dirty: bool,
    remote: Option<String>,
}

impl MockGitProvider {
    /// Create an empty history on branch `main`
    pub fn new() -> Self {
        MockGitProvider {
            branch: "main".to_string(),
            ..Default::default()
        }
    }

    /// Append a commit on top of `HEAD`
    ///
    /// The hash is padded to 40 hex characters so it resolves like a real id.
    pub fn commit(mut self, hash: &str, message: &str) -> Self {
        let hash = pad_hash(hash);
        let commit = MockCommit {
            parent: self.head.clone(),
            message: message.to_string(),
            tree: format!("tree-{}", hash),
        };
        self.commits.insert(hash.clone(), commit);
        self.branches.insert(self.branch.clone(), hash.clone());
        self.head = Some(hash);
        self
    }

    /// Tag the current `HEAD`
    pub fn tag(mut self, name: &str) -> Self {
        if let Some(head) = self.head.clone() {
            self.tags.insert(name.to_string(), head);
        }
        self
    }

    /// Tag an arbitrary commit
    pub fn tag_commit(mut self, name: &str, hash: &str) -> Self {
        self.tags.insert(name.to_string(), pad_hash(hash));
        self
    }

    /// Override the tree hash of a commit
    pub fn with_tree(mut self, hash: &str, tree: &str) -> Self {
        if let Some(commit) = self.commits.get_mut(&pad_hash(hash)) {
            commit.tree = tree.to_string();
        }
        self
    }

    /// Rename the current branch; an empty name means detached `HEAD`
    pub fn on_branch(mut self, branch: &str) -> Self {
        if let Some(head) = self.head.clone() {
            self.branches.insert(branch.to_string(), head);
        }
        self.branch = branch.to_string();
        self
    }

    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    pub fn with_remote(mut self, url: &str) -> Self {
        self.remote = Some(url.to_string());
        self
    }

    fn lookup(&self, reference: &str) -> Option<String> {
        if reference == "HEAD" {
            return self.head.clone();
        }
        let name = reference
            .strip_prefix("refs/tags/")
            .or_else(|| reference.strip_prefix("refs/heads/"))
            .unwrap_or(reference);

        if let Some(hash) = self.tags.get(name).or_else(|| self.branches.get(name)) {
            return Some(hash.clone());
        }

        let padded = pad_hash(reference);
        if self.commits.contains_key(&padded) {
            return Some(padded);
        }
        None
    }

    fn find(&self, reference: &str) -> Result<&MockCommit> {
        self.lookup(reference)
            .and_then(|hash| self.commits.get(&hash))
            .ok_or_else(|| RelgateError::ref_not_found(reference))
    }
}

/// Right-pad a short hex id with zeros
pub fn pad_hash(hash: &str) -> String {
    if hash.len() >= 40 {
        hash.to_string()
    } else {
        format!("{:0<40}", hash)
    }
}

impl GitProvider for MockGitProvider {
    fn resolve_commit(&self, reference: &str) -> Result<String> {
        self.lookup(reference)
            .filter(|hash| self.commits.contains_key(hash))
            .ok_or_else(|| RelgateError::ref_not_found(reference))
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn first_parent(&self, commit: &str) -> Result<Option<String>> {
        Ok(self.find(commit)?.parent.clone())
    }

    fn tag_index(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for (name, hash) in &self.tags {
            index.entry(hash.clone()).or_default().push(name.clone());
        }
        Ok(index)
    }

    fn content_hash(&self, reference: &str) -> Result<String> {
        Ok(self.find(reference)?.tree.clone())
    }

    fn commit_message(&self, reference: &str) -> Result<String> {
        Ok(self.find(reference)?.message.clone())
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self.dirty)
    }

    fn remote_url(&self) -> Result<Option<String>> {
        Ok(self.remote.clone())
    }
}
