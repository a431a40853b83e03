//! Invocation context: why version resolution is being run

use crate::error::{RelgateError, Result};
use std::fmt;
use std::str::FromStr;

/// Default token that forces a patch bump when found in the commit message
pub const DEFAULT_PATCH_INDICATOR: &str = "patch";

/// Kind of version being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitType {
    Local,
    PullRequest,
    Release,
}

impl FromStr for CommitType {
    type Err = RelgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(CommitType::Local),
            "pr" | "pull-request" => Ok(CommitType::PullRequest),
            "release" => Ok(CommitType::Release),
            other => Err(RelgateError::invalid_context(format!(
                "Unknown commit type '{}' (expected local, pr or release)",
                other
            ))),
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitType::Local => write!(f, "local"),
            CommitType::PullRequest => write!(f, "pr"),
            CommitType::Release => write!(f, "release"),
        }
    }
}

/// Immutable input describing a version resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub commit_type: CommitType,
    /// Pick the type from the CI environment instead of `commit_type`
    pub auto: bool,
    /// Pull request number; 0 means none
    pub pr_number: u64,
    pub patch_indicator: String,
    /// Force a patch bump regardless of the commit message
    pub patch: bool,
    pub commit_message_override: Option<String>,
    pub latest_tag_override: Option<String>,
    /// Emit `1.2.3` instead of `v1.2.3`
    pub exclude_v: bool,
}

impl Default for InvocationContext {
    fn default() -> Self {
        InvocationContext {
            commit_type: CommitType::Local,
            auto: false,
            pr_number: 0,
            patch_indicator: DEFAULT_PATCH_INDICATOR.to_string(),
            patch: false,
            commit_message_override: None,
            latest_tag_override: None,
            exclude_v: false,
        }
    }
}

impl InvocationContext {
    pub fn new(commit_type: CommitType) -> Self {
        InvocationContext {
            commit_type,
            ..Default::default()
        }
    }

    pub fn with_pr_number(mut self, pr_number: u64) -> Self {
        self.pr_number = pr_number;
        self
    }

    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn with_patch_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.patch_indicator = indicator.into();
        self
    }

    pub fn with_patch(mut self, patch: bool) -> Self {
        self.patch = patch;
        self
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message_override = Some(message.into());
        self
    }

    pub fn with_latest_tag(mut self, tag: impl Into<String>) -> Self {
        self.latest_tag_override = Some(tag.into());
        self
    }

    pub fn with_exclude_v(mut self, exclude_v: bool) -> Self {
        self.exclude_v = exclude_v;
        self
    }

    /// Normalize `auto` into a concrete type and validate preconditions
    ///
    /// With `auto`: no CI signal means local, a PR number means pull-request,
    /// anything else is a release.
    pub fn effective_type(&self, in_ci: bool) -> Result<CommitType> {
        let commit_type = if self.auto {
            if !in_ci {
                CommitType::Local
            } else if self.pr_number > 0 {
                CommitType::PullRequest
            } else {
                CommitType::Release
            }
        } else {
            self.commit_type
        };

        if commit_type == CommitType::PullRequest && self.pr_number == 0 {
            return Err(RelgateError::invalid_context(
                "pull-request versions require a pull request number greater than 0",
            ));
        }

        Ok(commit_type)
    }
}
