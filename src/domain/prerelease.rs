//! Pre-release suffixes assigned to non-release builds
//!
//! Two encodings exist:
//! - `pr.<number>` for pull-request builds. Deterministic per PR and compared
//!   numerically, so `pr.9 < pr.10`.
//! - `local.<branch>.g<short-sha>[.dirty]` for developer builds. The `g`
//!   prefix keeps an all-digit hash from becoming a numeric identifier with a
//!   leading zero, which semver rejects.
//!
//! See <https://semver.org/#spec-item-9>

use crate::error::{RelgateError, Result};
use std::fmt;
use std::str::FromStr;

const PR_MARKER: &str = "pr";
const LOCAL_MARKER: &str = "local";
const DIRTY_MARKER: &str = "dirty";

/// Pre-release suffix attached to a resolved version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreRelease {
    /// Build of an open pull request
    PullRequest { number: u64 },
    /// Developer build outside CI
    Local {
        /// Sanitized branch token (see [`BranchContext::prerelease_token`](crate::domain::BranchContext::prerelease_token))
        branch: String,
        /// Abbreviated commit hash, without the `g` prefix
        short_sha: String,
        /// Working tree had uncommitted changes
        dirty: bool,
    },
}

impl PreRelease {
    /// Parse a pre-release suffix produced by [`Display`](fmt::Display)
    ///
    /// # Examples
    /// ```ignore
    /// let pr = PreRelease::parse("pr.42")?;
    /// assert_eq!(pr, PreRelease::PullRequest { number: 42 });
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for PreRelease {
    type Err = RelgateError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();

        match parts.as_slice() {
            [PR_MARKER, number] => {
                let number = number.parse::<u64>().map_err(|_| {
                    RelgateError::version(format!("Invalid pull request number: '{}'", number))
                })?;
                Ok(PreRelease::PullRequest { number })
            }
            [LOCAL_MARKER, branch, sha, rest @ ..] => {
                let short_sha = sha.strip_prefix('g').ok_or_else(|| {
                    RelgateError::version(format!("Invalid local commit marker: '{}'", sha))
                })?;
                let dirty = match rest {
                    [] => false,
                    [DIRTY_MARKER] => true,
                    _ => {
                        return Err(RelgateError::version(format!(
                            "Invalid local pre-release: '{}'",
                            s
                        )))
                    }
                };
                Ok(PreRelease::Local {
                    branch: branch.to_string(),
                    short_sha: short_sha.to_string(),
                    dirty,
                })
            }
            _ => Err(RelgateError::version(format!(
                "Unrecognized pre-release: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreRelease::PullRequest { number } => write!(f, "{}.{}", PR_MARKER, number),
            PreRelease::Local {
                branch,
                short_sha,
                dirty,
            } => {
                write!(f, "{}.{}.g{}", LOCAL_MARKER, branch, short_sha)?;
                if *dirty {
                    write!(f, ".{}", DIRTY_MARKER)?;
                }
                Ok(())
            }
        }
    }
}
