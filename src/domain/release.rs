use serde::{Deserialize, Serialize};

/// A release as recorded by the remote release provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    /// Commit the release was cut from
    pub commit_hash: String,
    pub tag: String,
    /// Originating pull request number, if any
    pub pr: Option<u64>,
    /// Names of the uploaded artifacts
    pub artifacts: Vec<String>,
    pub draft: bool,
}

impl Release {
    pub fn has_artifact(&self, name: &str) -> bool {
        self.artifacts.iter().any(|a| a == name)
    }
}
