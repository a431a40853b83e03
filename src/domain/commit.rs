use crate::domain::tag::{highest_semver, TagRef};
use crate::domain::Version;

/// Facts about one commit gathered at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    /// Full commit hash
    pub hash: String,
    /// Branch name when the facts were gathered; empty on a detached HEAD
    pub branch: String,
    /// Hash of the file tree only, independent of commit metadata
    pub content_hash: String,
    /// Tags on this commit or on the ancestors walked to reach a tagged one
    pub tags: Vec<TagRef>,
}

impl CommitRef {
    /// Abbreviated hash (first 7 characters)
    pub fn short_hash(&self) -> &str {
        short_hash(&self.hash)
    }

    /// Highest-precedence semver tag among the collected tags
    pub fn latest_semver_tag(&self) -> Option<Version> {
        highest_semver(&self.tags).map(|(version, _)| version)
    }
}

/// First seven characters of a hash, or the whole string if shorter
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(7) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommitRef {
        CommitRef {
            hash: "1234567890abcdef".to_string(),
            branch: "main".to_string(),
            content_hash: "feedbeef".to_string(),
            tags: vec![
                TagRef::new("v1.0.0", "1234567890abcdef"),
                TagRef::new("v0.9.0", "0000000"),
                TagRef::new("nightly", "1234567890abcdef"),
            ],
        }
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(sample().short_hash(), "1234567");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash(""), "");
    }

    #[test]
    fn test_latest_semver_tag() {
        assert_eq!(sample().latest_semver_tag(), Some(Version::new(1, 0, 0)));
    }
}
