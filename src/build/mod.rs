//! Build-and-package step
//!
//! For each configured target, in order:
//! - run the build script with the target exported
//! - pack the output into `<file>.tar.gz`
//! - write `<file>.sha256`
//!
//! Each target is memoized in the pipeline store by content hash and
//! version, and the whole step is skipped when the commit is already
//! released. A dirty working tree is never cached.

pub mod executor;
pub mod runner;

pub use executor::ScriptExecutor;
pub use runner::{BuildOutput, BuildReport, BuildRunner};

use crate::domain::Target;

/// Values every build script invocation receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Resolved version tag
    pub version: String,
    pub commit: String,
    pub content_hash: String,
}

impl BuildContext {
    /// Environment for one target's script run
    pub fn to_env_vars(&self, target: &Target) -> Vec<(String, String)> {
        vec![
            ("TARGET_OS".to_string(), target.os.clone()),
            ("TARGET_ARCH".to_string(), target.arch.clone()),
            ("RELGATE_VERSION".to_string(), self.version.clone()),
            ("RELGATE_COMMIT".to_string(), self.commit.clone()),
            ("RELGATE_CONTENT_HASH".to_string(), self.content_hash.clone()),
        ]
    }

    /// Pipeline cache key for one target's outputs
    ///
    /// The version is part of the key because the script sees it.
    pub fn cache_key(&self, target: &Target) -> String {
        format!("build:{}:{}:{}", self.content_hash, self.version, target.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BuildContext {
        BuildContext {
            version: "v1.2.3".to_string(),
            commit: "abc".to_string(),
            content_hash: "tree123".to_string(),
        }
    }

    #[test]
    fn test_env_vars() {
        let env = ctx().to_env_vars(&Target::new("darwin", "arm64"));
        assert!(env.contains(&("TARGET_OS".to_string(), "darwin".to_string())));
        assert!(env.contains(&("TARGET_ARCH".to_string(), "arm64".to_string())));
        assert!(env.contains(&("RELGATE_VERSION".to_string(), "v1.2.3".to_string())));
    }

    #[test]
    fn test_cache_key_uses_content_hash_and_version() {
        let target = Target::new("linux", "amd64");
        assert_eq!(ctx().cache_key(&target), "build:tree123:v1.2.3:linux-amd64");

        let pr = BuildContext {
            version: "v1.3.0-pr.5".to_string(),
            ..ctx()
        };
        assert_ne!(pr.cache_key(&target), ctx().cache_key(&target));
    }
}
