use std::fmt;

/// Non-fatal conditions met while resolving, caching or gating a release.
/// These are reported to the user but never change the outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// Tags on the walked history that are not semantic versions
    NonSemverTagsSkipped { tags: Vec<String> },
    /// The pipeline store could not be read and was treated as empty
    CacheCorrupted { path: String, reason: String },
    /// A cached entry no longer decodes as the requested type and was dropped
    CacheEntryDiscarded { name: String, reason: String },
    /// A local build was resolved from a working tree with uncommitted changes
    DirtyWorkingTree { commit_hash: String },
    /// A release already exists for the commit, so work was skipped
    AlreadyReleased { commit_hash: String, tag: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NonSemverTagsSkipped { tags } => {
                write!(f, "Skipped non-semver tags: {}", tags.join(", "))
            }
            BoundaryWarning::CacheCorrupted { path, reason } => {
                write!(
                    f,
                    "Pipeline store '{}' is unreadable, starting empty: {}",
                    path, reason
                )
            }
            BoundaryWarning::CacheEntryDiscarded { name, reason } => {
                write!(f, "Discarded cache entry '{}', recomputing: {}", name, reason)
            }
            BoundaryWarning::DirtyWorkingTree { commit_hash } => {
                write!(
                    f,
                    "Working tree has uncommitted changes on top of {}",
                    crate::domain::commit::short_hash(commit_hash)
                )
            }
            BoundaryWarning::AlreadyReleased { commit_hash, tag } => {
                write!(
                    f,
                    "Commit {} is already released as '{}'",
                    crate::domain::commit::short_hash(commit_hash),
                    tag
                )
            }
        }
    }
}

impl BoundaryWarning {
    /// Emit the warning as a structured `tracing` event
    pub fn emit(&self) {
        tracing::warn!(warning = %self, "boundary warning");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_semver_display() {
        let w = BoundaryWarning::NonSemverTagsSkipped {
            tags: vec!["nightly".to_string(), "latest".to_string()],
        };
        assert_eq!(w.to_string(), "Skipped non-semver tags: nightly, latest");
    }

    #[test]
    fn test_already_released_uses_short_hash() {
        let w = BoundaryWarning::AlreadyReleased {
            commit_hash: "0123456789abcdef0123456789abcdef01234567".to_string(),
            tag: "v1.2.0".to_string(),
        };
        let msg = w.to_string();
        assert!(msg.contains("0123456"));
        assert!(!msg.contains("0123456789abcdef0123"));
        assert!(msg.contains("v1.2.0"));
    }
}
