use crate::error::{RelgateError, Result};
use crate::git::{is_full_hash, GitProvider};
use git2::{Commit, Oid, Repository as Git2Repo, StatusOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// In-process provider backed by `git2`
pub struct Git2Provider {
    // git2::Repository is Send but not Sync
    repo: Mutex<Git2Repo>,
}

impl Git2Provider {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Provider {
            repo: Mutex::new(repo),
        })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Provider {
            repo: Mutex::new(repo),
        }
    }

    fn with_repo<T>(&self, f: impl FnOnce(&Git2Repo) -> Result<T>) -> Result<T> {
        let repo = self
            .repo
            .lock()
            .map_err(|_| RelgateError::config("git repository lock poisoned"))?;
        f(&repo)
    }
}

/// Resolve a ref to a commit, falling back to the `origin` remote-tracking branch
fn find_commit<'r>(repo: &'r Git2Repo, reference: &str) -> Result<Commit<'r>> {
    if is_full_hash(reference) {
        let oid = Oid::from_str(reference)?;
        return repo
            .find_commit(oid)
            .map_err(|_| RelgateError::ref_not_found(reference));
    }

    debug!(reference, "resolving ref");

    let object = match repo.revparse_single(reference) {
        Ok(object) => object,
        Err(_) => repo
            .revparse_single(&format!("refs/remotes/origin/{}", reference))
            .map_err(|_| RelgateError::ref_not_found(reference))?,
    };

    object
        .peel_to_commit()
        .map_err(|_| RelgateError::ref_not_found(reference))
}

impl GitProvider for Git2Provider {
    fn resolve_commit(&self, reference: &str) -> Result<String> {
        self.with_repo(|repo| Ok(find_commit(repo, reference)?.id().to_string()))
    }

    fn current_branch(&self) -> Result<String> {
        self.with_repo(|repo| {
            let head = match repo.head() {
                Ok(head) => head,
                Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                    return Err(RelgateError::ref_not_found("HEAD"))
                }
                Err(e) => return Err(e.into()),
            };

            if head.is_branch() {
                Ok(head.shorthand().unwrap_or_default().to_string())
            } else {
                Ok(String::new())
            }
        })
    }

    fn first_parent(&self, commit: &str) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let commit = find_commit(repo, commit)?;
            Ok(commit.parent_id(0).ok().map(|oid| oid.to_string()))
        })
    }

    fn tag_index(&self) -> Result<HashMap<String, Vec<String>>> {
        self.with_repo(|repo| {
            let mut index: HashMap<String, Vec<String>> = HashMap::new();

            for name in repo.tag_names(None)?.iter().flatten() {
                let reference = repo.find_reference(&format!("refs/tags/{}", name))?;
                // Tags on trees or blobs have no commit to walk from
                if let Ok(commit) = reference.peel_to_commit() {
                    index
                        .entry(commit.id().to_string())
                        .or_default()
                        .push(name.to_string());
                }
            }

            Ok(index)
        })
    }

    fn content_hash(&self, reference: &str) -> Result<String> {
        self.with_repo(|repo| Ok(find_commit(repo, reference)?.tree_id().to_string()))
    }

    fn commit_message(&self, reference: &str) -> Result<String> {
        self.with_repo(|repo| {
            let commit = find_commit(repo, reference)?;
            Ok(commit.message().unwrap_or_default().to_string())
        })
    }

    fn is_dirty(&self) -> Result<bool> {
        self.with_repo(|repo| {
            let mut opts = StatusOptions::new();
            // Untracked files do not count, matching `git describe --dirty`
            opts.include_untracked(false).include_ignored(false);
            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(!statuses.is_empty())
        })
    }

    fn remote_url(&self) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let names = repo.remotes()?;
            let mut names: Vec<&str> = names.iter().flatten().collect();
            names.sort_by_key(|name| (*name != "origin", name.to_string()));

            match names.first() {
                Some(name) => Ok(repo.find_remote(name)?.url().map(str::to_string)),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn commit_file(repo: &Git2Repo, dir: &Path, content: &str, message: &str) -> Oid {
        fs::write(dir.join("README.md"), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        let parents: Vec<Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn setup() -> (TempDir, Git2Provider, Oid, Oid) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Git2Repo::init(temp_dir.path()).unwrap();
        let first = commit_file(&repo, temp_dir.path(), "one\n", "initial");
        repo.tag_lightweight("v1.0.0", &repo.find_object(first, None).unwrap(), false)
            .unwrap();
        let second = commit_file(&repo, temp_dir.path(), "two\n", "fix: patch things");
        (temp_dir, Git2Provider::from_git2(repo), first, second)
    }

    #[test]
    fn test_resolve_head_and_parent() {
        let (_dir, git, first, second) = setup();
        assert_eq!(git.current_commit().unwrap(), second.to_string());
        assert_eq!(
            git.first_parent(&second.to_string()).unwrap(),
            Some(first.to_string())
        );
        assert_eq!(git.first_parent(&first.to_string()).unwrap(), None);
    }

    #[test]
    fn test_unknown_ref_is_ref_not_found() {
        let (_dir, git, _, _) = setup();
        let err = git.resolve_commit("no-such-branch").unwrap_err();
        assert!(matches!(err, RelgateError::RefNotFound(_)));
    }

    #[test]
    fn test_tags_reachable_from_head() {
        let (_dir, git, first, _) = setup();
        let tags = git.tags_reachable_from("HEAD").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1.0.0");
        assert_eq!(tags[0].commit, first.to_string());
    }

    #[test]
    fn test_commit_message_and_dirty() {
        let (dir, git, _, _) = setup();
        assert!(git.commit_message("HEAD").unwrap().contains("patch"));
        assert!(!git.is_dirty().unwrap());
        fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        assert!(!git.is_dirty().unwrap());
        fs::write(dir.path().join("README.md"), "changed\n").unwrap();
        assert!(git.is_dirty().unwrap());
    }

    #[test]
    fn test_content_hash_is_tree_id() {
        let (_dir, git, first, second) = setup();
        let a = git.content_hash(&first.to_string()).unwrap();
        let b = git.content_hash(&second.to_string()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_no_remote() {
        let (_dir, git, _, _) = setup();
        assert_eq!(git.remote_url().unwrap(), None);
        assert!(git.local_repository_metadata().is_err());
    }
}
