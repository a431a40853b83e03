use crate::domain::PreRelease;
use crate::error::{RelgateError, Result};
use std::cmp::Ordering;
use std::fmt;

/// Semantic version with optional pre-release and build metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// Create a new release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version(semver::Version::new(major, minor, patch))
    }

    /// Parse version from a tag string (e.g., "v1.2.3-rc.1" -> 1.2.3-rc.1)
    pub fn parse(tag: &str) -> Result<Self> {
        let clean_tag = tag
            .trim()
            .strip_prefix(['v', 'V'])
            .unwrap_or_else(|| tag.trim());

        semver::Version::parse(clean_tag)
            .map(Version)
            .map_err(|e| RelgateError::version(format!("Invalid version '{}': {}", tag, e)))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn prerelease(&self) -> &str {
        self.0.pre.as_str()
    }

    /// Bump version according to bump type
    ///
    /// Pre-release and build metadata are always cleared. A patch bump of a
    /// pre-release only drops the suffix (`1.2.3-rc.1` -> `1.2.3`).
    pub fn bump(&self, bump_type: VersionBump) -> Self {
        let mut next = semver::Version::new(self.0.major, self.0.minor, self.0.patch);

        match bump_type {
            VersionBump::Minor => {
                next.minor += 1;
                next.patch = 0;
            }
            VersionBump::Patch => {
                if self.0.pre.is_empty() {
                    next.patch += 1;
                }
            }
            VersionBump::None => {}
        }

        Version(next)
    }

    /// Attach a pre-release suffix, replacing any existing one
    pub fn with_prerelease(&self, pre: &PreRelease) -> Result<Self> {
        let mut next = self.0.clone();
        next.pre = semver::Prerelease::new(&pre.to_string()).map_err(|e| {
            RelgateError::version(format!("Invalid pre-release '{}': {}", pre, e))
        })?;
        next.build = semver::BuildMetadata::EMPTY;
        Ok(Version(next))
    }

    /// Compare by semver precedence, ignoring build metadata
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }

    /// Render as a tag, with or without the `v` prefix
    pub fn to_tag(&self, exclude_v: bool) -> String {
        if exclude_v {
            self.0.to_string()
        } else {
            format!("v{}", self.0)
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Version(v)
    }
}

/// Version bump type decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Minor,
    Patch,
    /// Reuse the base version's numbers
    None,
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Minor => write!(f, "minor"),
            VersionBump::Patch => write!(f, "patch"),
            VersionBump::None => write!(f, "none"),
        }
    }
}
