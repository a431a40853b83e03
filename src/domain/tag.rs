use crate::domain::Version;

/// A tag together with the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub commit: String,
}

impl TagRef {
    /// Create a new tag reference
    pub fn new(name: impl Into<String>, commit: impl Into<String>) -> Self {
        TagRef {
            name: name.into(),
            commit: commit.into(),
        }
    }

    /// The tag's version, if the name parses as semver
    pub fn version(&self) -> Option<Version> {
        Version::parse(&self.name).ok()
    }

    pub fn is_semver(&self) -> bool {
        self.version().is_some()
    }
}

/// Pick the highest-precedence semver tag, skipping names that do not parse
///
/// Ties in precedence (e.g. `v1.2.3` and `1.2.3` on the same commit) keep the
/// first tag seen, so the nearest commit wins.
pub fn highest_semver(tags: &[TagRef]) -> Option<(Version, &TagRef)> {
    let mut best: Option<(Version, &TagRef)> = None;

    for tag in tags {
        let Some(version) = tag.version() else {
            continue;
        };

        let better = match &best {
            Some((current, _)) => version.cmp_precedence(current).is_gt(),
            None => true,
        };
        if better {
            best = Some((version, tag));
        }
    }

    best
}
