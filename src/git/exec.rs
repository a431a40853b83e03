//! Git backend that shells out to the system `git` binary
//!
//! Useful on CI images where the checkout was made by a newer git than
//! libgit2 understands (partial clones, sparse checkouts).

use crate::error::{RelgateError, Result};
use crate::git::GitProvider;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Provider running `git -C <dir> ...` subprocesses
pub struct ExecGitProvider {
    work_tree: PathBuf,
}

impl ExecGitProvider {
    /// Open the repository containing `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let probe = ExecGitProvider {
            work_tree: path.as_ref().to_path_buf(),
        };
        let top = probe.run(&["rev-parse", "--show-toplevel"])?;

        Ok(ExecGitProvider {
            work_tree: PathBuf::from(top),
        })
    }

    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.work_tree);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("LC_ALL", "C");
        cmd
    }

    /// Run a git command and return trimmed stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        debug!(%command, "running git");

        let output = self.git_cmd().args(args).output()?;
        if !output.status.success() {
            return Err(RelgateError::GitCommand {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Resolve `spec` to an object id, mapping failure to RefNotFound
    fn rev_parse(&self, spec: &str, reference: &str) -> Result<String> {
        self.run(&["rev-parse", "--verify", "--quiet", spec])
            .map_err(|_| RelgateError::ref_not_found(reference))
    }
}

impl GitProvider for ExecGitProvider {
    fn resolve_commit(&self, reference: &str) -> Result<String> {
        let local = format!("{}^{{commit}}", reference);
        match self.rev_parse(&local, reference) {
            Ok(hash) => Ok(hash),
            Err(_) => {
                let remote = format!("refs/remotes/origin/{}^{{commit}}", reference);
                self.rev_parse(&remote, reference)
            }
        }
    }

    fn current_branch(&self) -> Result<String> {
        self.run(&["branch", "--show-current"])
    }

    fn first_parent(&self, commit: &str) -> Result<Option<String>> {
        let hash = self.resolve_commit(commit)?;
        let spec = format!("{}^1", hash);
        // Root commits have no ^1
        match self.run(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(parent) if !parent.is_empty() => Ok(Some(parent)),
            _ => Ok(None),
        }
    }

    fn tag_index(&self) -> Result<HashMap<String, Vec<String>>> {
        let listing = self.run(&[
            "for-each-ref",
            "refs/tags",
            "--format=%(refname:short) %(objecttype) %(objectname) %(*objecttype) %(*objectname)",
        ])?;

        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for line in listing.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let commit = match fields.as_slice() {
                [name, "commit", hash] => Some((*name, *hash)),
                [name, "tag", _, "commit", peeled] => Some((*name, *peeled)),
                _ => None,
            };
            if let Some((name, hash)) = commit {
                index
                    .entry(hash.to_string())
                    .or_default()
                    .push(name.to_string());
            }
        }

        Ok(index)
    }

    fn content_hash(&self, reference: &str) -> Result<String> {
        let hash = self.resolve_commit(reference)?;
        self.run(&["rev-parse", &format!("{}^{{tree}}", hash)])
    }

    fn commit_message(&self, reference: &str) -> Result<String> {
        let hash = self.resolve_commit(reference)?;
        self.run(&["log", "-1", "--format=%B", &hash])
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(!self.run(&["status", "--porcelain", "--untracked-files=no"])?.is_empty())
    }

    fn remote_url(&self) -> Result<Option<String>> {
        let remotes = self.run(&["remote"])?;
        let mut names: Vec<&str> = remotes.lines().filter(|l| !l.is_empty()).collect();
        names.sort_by_key(|name| (*name != "origin", name.to_string()));

        match names.first() {
            Some(name) => Ok(Some(self.run(&["remote", "get-url", name])?)),
            None => Ok(None),
        }
    }
}
