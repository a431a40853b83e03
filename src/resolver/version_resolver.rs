use crate::boundary::BoundaryWarning;
use crate::domain::tag::highest_semver;
use crate::domain::{BranchContext, CommitType, InvocationContext, PreRelease, Version, VersionBump};
use crate::error::{RelgateError, Result};
use crate::git::GitProvider;
use tracing::{debug, info, Span};

/// Outcome of a resolution, with the facts that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: Version,
    /// Highest semver tag found, or the override
    pub base: Version,
    pub bump: VersionBump,
    /// Type after `auto` normalization
    pub commit_type: CommitType,
    pub commit: String,
    /// `version` rendered with or without the `v` prefix
    pub tag: String,
}

/// Computes the next version from git facts and an invocation context
///
/// Pure with respect to its inputs: no state is kept between calls.
pub struct VersionResolver {
    span: Span,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionResolver {
    pub fn new() -> Self {
        VersionResolver {
            span: tracing::info_span!("version_resolver"),
        }
    }

    /// Log under the caller's span instead of the default one
    pub fn with_span(span: Span) -> Self {
        VersionResolver { span }
    }

    /// Resolve the version for `HEAD`
    ///
    /// `in_ci` is only consulted when the context asks for `auto`.
    pub fn resolve(
        &self,
        git: &dyn GitProvider,
        ctx: &InvocationContext,
        in_ci: bool,
    ) -> Result<ResolvedVersion> {
        let _guard = self.span.enter();

        let commit_type = ctx.effective_type(in_ci)?;
        let head = git.current_commit()?;
        let (base, head_is_base) = self.base_version(git, ctx, &head)?;

        let message = match &ctx.commit_message_override {
            Some(message) => message.clone(),
            None => git.commit_message(&head)?,
        };
        let bump = decide_bump(commit_type, head_is_base, ctx, &message);
        let next = base.bump(bump);

        let version = match commit_type {
            CommitType::Release => next,
            CommitType::PullRequest => next.with_prerelease(&PreRelease::PullRequest {
                number: ctx.pr_number,
            })?,
            CommitType::Local => {
                let dirty = git.is_dirty()?;
                if dirty {
                    BoundaryWarning::DirtyWorkingTree {
                        commit_hash: head.clone(),
                    }
                    .emit();
                }
                let branch = BranchContext::new(git.current_branch()?);
                next.with_prerelease(&PreRelease::Local {
                    branch: branch.prerelease_token(),
                    short_sha: crate::domain::commit::short_hash(&head).to_string(),
                    dirty,
                })?
            }
        };

        let tag = version.to_tag(ctx.exclude_v);
        info!(%commit_type, %base, %bump, %tag, "resolved version");

        Ok(ResolvedVersion {
            version,
            base,
            bump,
            commit_type,
            commit: head,
            tag,
        })
    }

    /// Base version and whether `HEAD` itself carries it
    fn base_version(
        &self,
        git: &dyn GitProvider,
        ctx: &InvocationContext,
        head: &str,
    ) -> Result<(Version, bool)> {
        if let Some(tag) = &ctx.latest_tag_override {
            debug!(tag = %tag, "using latest tag override");
            return Ok((Version::parse(tag)?, false));
        }

        let tags = git.tags_reachable_from("HEAD")?;

        let skipped: Vec<String> = tags
            .iter()
            .filter(|t| !t.is_semver())
            .map(|t| t.name.clone())
            .collect();
        if !skipped.is_empty() {
            BoundaryWarning::NonSemverTagsSkipped { tags: skipped }.emit();
        }

        let (base, tag) = highest_semver(&tags).ok_or_else(|| RelgateError::NoBaseVersionFound {
            from: "HEAD".to_string(),
        })?;
        debug!(tag = %tag.name, commit = %tag.commit, "found base tag");

        let head_is_base = tag.commit == head;
        Ok((base, head_is_base))
    }
}

/// Bump rule
///
/// A release of a commit that already carries the base tag reuses it. Otherwise
/// the patch indicator (or the `patch` flag) selects a patch bump and anything
/// else is a minor bump.
fn decide_bump(
    commit_type: CommitType,
    head_is_base: bool,
    ctx: &InvocationContext,
    message: &str,
) -> VersionBump {
    if commit_type == CommitType::Release && head_is_base {
        return VersionBump::None;
    }

    let indicated = !ctx.patch_indicator.is_empty()
        && message
            .to_lowercase()
            .contains(&ctx.patch_indicator.to_lowercase());

    if ctx.patch || indicated {
        VersionBump::Patch
    } else {
        VersionBump::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGitProvider;

    fn tagged_history() -> MockGitProvider {
        MockGitProvider::new()
            .commit("a1", "initial")
            .tag("v1.2.3")
            .commit("b2", "feat: new things")
    }

    #[test]
    fn test_release_minor_bump() {
        let git = tagged_history();
        let ctx = InvocationContext::new(CommitType::Release);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v1.3.0");
        assert_eq!(resolved.bump, VersionBump::Minor);
        assert!(!resolved.version.is_prerelease());
    }

    #[test]
    fn test_release_patch_indicator() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .tag("v1.2.3")
            .commit("b2", "fix: [patch] off by one");
        let ctx = InvocationContext::new(CommitType::Release);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v1.2.4");
    }

    #[test]
    fn test_patch_flag_forces_patch() {
        let git = tagged_history();
        let ctx = InvocationContext::new(CommitType::Release).with_patch(true);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v1.2.4");
    }

    #[test]
    fn test_exact_tag_is_reused_for_release() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .commit("b2", "release")
            .tag("v1.2.3");
        let ctx = InvocationContext::new(CommitType::Release);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v1.2.3");
        assert_eq!(resolved.bump, VersionBump::None);
    }

    #[test]
    fn test_local_patch_sorts_below_release() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .tag("v1.2.3")
            .commit("b2", "patch: fix typo")
            .on_branch("feature/Login");
        let ctx = InvocationContext::new(CommitType::Local);
        let resolved = VersionResolver::new().resolve(&git, &ctx, false).unwrap();

        assert_eq!(resolved.version.patch(), 4);
        assert!(resolved.version.is_prerelease());
        assert!(resolved.version < Version::new(1, 2, 4));
        assert_eq!(resolved.tag, "v1.2.4-local.feature-login.gb200000");
    }

    #[test]
    fn test_local_dirty_marker() {
        let git = tagged_history().dirty(true);
        let ctx = InvocationContext::new(CommitType::Local).with_exclude_v(true);
        let resolved = VersionResolver::new().resolve(&git, &ctx, false).unwrap();
        assert!(resolved.tag.ends_with(".dirty"));
        assert!(!resolved.tag.starts_with('v'));
    }

    #[test]
    fn test_pull_request_suffix() {
        let git = tagged_history();
        let ctx = InvocationContext::new(CommitType::PullRequest).with_pr_number(42);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v1.3.0-pr.42");
    }

    #[test]
    fn test_pull_request_zero_is_invalid() {
        let git = tagged_history();
        let ctx = InvocationContext::new(CommitType::PullRequest);
        let err = VersionResolver::new().resolve(&git, &ctx, true).unwrap_err();
        assert!(matches!(err, RelgateError::InvalidContext(_)));
    }

    #[test]
    fn test_no_semver_tags() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .tag("nightly")
            .tag("latest")
            .commit("b2", "second");
        let ctx = InvocationContext::new(CommitType::Release);
        let err = VersionResolver::new().resolve(&git, &ctx, true).unwrap_err();
        assert!(matches!(err, RelgateError::NoBaseVersionFound { .. }));
    }

    #[test]
    fn test_highest_tag_on_same_commit_wins() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .tag("v1.0.0")
            .tag("v2.0.0")
            .tag("v1.5.0")
            .commit("b2", "second");
        let ctx = InvocationContext::new(CommitType::Release).with_patch(true);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.base, Version::new(2, 0, 0));
        assert_eq!(resolved.tag, "v2.0.1");
    }

    #[test]
    fn test_nearest_tagged_ancestor_wins_over_farther_higher_tag() {
        let git = MockGitProvider::new()
            .commit("a1", "initial")
            .tag("v3.0.0")
            .commit("b2", "second")
            .tag("v1.0.0")
            .commit("c3", "third");
        let ctx = InvocationContext::new(CommitType::Release).with_patch(true);
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.base, Version::new(1, 0, 0));
    }

    #[test]
    fn test_latest_tag_override_skips_walk() {
        let git = MockGitProvider::new().commit("a1", "initial");
        let ctx = InvocationContext::new(CommitType::Release)
            .with_latest_tag("v0.9.1")
            .with_commit_message("patch it");
        let resolved = VersionResolver::new().resolve(&git, &ctx, true).unwrap();
        assert_eq!(resolved.tag, "v0.9.2");
    }

    #[test]
    fn test_auto_without_ci_is_local() {
        let git = tagged_history();
        let ctx = InvocationContext::default().with_auto(true).with_pr_number(7);
        let resolved = VersionResolver::new().resolve(&git, &ctx, false).unwrap();
        assert_eq!(resolved.commit_type, CommitType::Local);
    }

    #[test]
    fn test_empty_patch_indicator_never_matches() {
        let ctx = InvocationContext::new(CommitType::Release).with_patch_indicator("");
        assert_eq!(
            decide_bump(CommitType::Release, false, &ctx, "anything"),
            VersionBump::Minor
        );
    }
}
