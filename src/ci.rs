//! Snapshot of the CI environment
//!
//! Environment variables are read once at startup into a [CiEnvironment] and
//! passed explicitly; nothing else in the crate calls `std::env::var`.

use crate::error::{RelgateError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

pub const CI: &str = "CI";
pub const GITHUB_ACTIONS: &str = "GITHUB_ACTIONS";
pub const GITHUB_ENV: &str = "GITHUB_ENV";
pub const GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";
pub const GITHUB_REF: &str = "GITHUB_REF";
pub const GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// Cross-step channel files of a GitHub Actions runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubActions {
    /// File receiving `KEY=VALUE` lines visible to later steps
    pub env_file: PathBuf,
    /// File receiving step outputs such as `result=<value>`
    pub output_file: PathBuf,
}

/// Immutable view of the process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnvironment {
    vars: HashMap<String, String>,
}

impl CiEnvironment {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        CiEnvironment {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        CiEnvironment {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Non-empty value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// True when a CI system announced itself through `CI`
    pub fn is_ci(&self) -> bool {
        matches!(self.get(CI), Some(v) if !v.eq_ignore_ascii_case("false") && v != "0")
    }

    /// Identify the CI provider and its channel files
    pub fn detect(&self) -> Result<GithubActions> {
        if self.get(CI).is_none() {
            return Err(RelgateError::not_in_ci("env variable CI is empty"));
        }
        if self.get(GITHUB_ACTIONS) != Some("true") {
            return Err(RelgateError::not_in_ci("not in a github action"));
        }

        let env_file = self
            .get(GITHUB_ENV)
            .ok_or_else(|| RelgateError::not_in_ci("env variable GITHUB_ENV is empty"))?;
        let output_file = self
            .get(GITHUB_OUTPUT)
            .ok_or_else(|| RelgateError::not_in_ci("env variable GITHUB_OUTPUT is empty"))?;

        Ok(GithubActions {
            env_file: PathBuf::from(env_file),
            output_file: PathBuf::from(output_file),
        })
    }

    /// Pull request number from `refs/pull/<n>/merge`, if this run builds one
    pub fn pr_number(&self) -> Option<u64> {
        let reference = self.get(GITHUB_REF)?;
        let rest = reference.strip_prefix("refs/pull/")?;
        rest.split('/').next()?.parse().ok()
    }

    pub fn token(&self) -> Option<&str> {
        self.get(GITHUB_TOKEN)
    }

    /// `owner/name` of the repository being built
    pub fn repository(&self) -> Option<(&str, &str)> {
        self.get(GITHUB_REPOSITORY)?.split_once('/')
    }
}
