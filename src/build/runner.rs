use crate::archive::{self, write_checksum_file};
use crate::build::{BuildContext, ScriptExecutor};
use crate::config::BuildConfig;
use crate::domain::Target;
use crate::error::{RelgateError, Result};
use crate::git::GitProvider;
use crate::ledger::ReleaseLedger;
use crate::pipeline::PipelineStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Span};

/// Files produced for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub target: Target,
    pub binary: PathBuf,
    pub archive: PathBuf,
    pub checksum_file: PathBuf,
    pub sha256: String,
}

/// Result of a whole build step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildReport {
    /// The commit was already released under `tag`; nothing ran
    AlreadyReleased { tag: String },
    Built { outputs: Vec<BuildOutput> },
}

/// Drives the build script over every configured target, one at a time
pub struct BuildRunner {
    config: BuildConfig,
    name: String,
    work_dir: PathBuf,
    span: Span,
}

impl BuildRunner {
    /// `name` is the binary name used for output files
    pub fn new(config: BuildConfig, name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        BuildRunner {
            config,
            name: name.into(),
            work_dir: work_dir.into(),
            span: tracing::info_span!("build_runner"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Build all targets unless the commit is already released
    ///
    /// The first failing target aborts the batch. Outputs of targets that
    /// finished earlier stay on disk and in the cache.
    pub fn run(
        &self,
        pipeline: &PipelineStore,
        ledger: Option<&ReleaseLedger<'_>>,
        git: &dyn GitProvider,
        version: &str,
    ) -> Result<BuildReport> {
        let _guard = self.span.enter();

        if let Some(ledger) = ledger {
            let check = ledger.already_released(git)?;
            if check.released {
                return Ok(BuildReport::AlreadyReleased { tag: check.tag });
            }
        }

        let commit = git.current_commit()?;
        let ctx = BuildContext {
            version: version.to_string(),
            content_hash: git.content_hash(&commit)?,
            commit,
        };

        // The content hash is HEAD's tree; local edits are not part of it.
        let dirty = git.is_dirty()?;
        if dirty {
            debug!("working tree is dirty, build cache bypassed");
        }

        let targets = self.config.parsed_targets()?;
        let mut outputs = Vec::with_capacity(targets.len());
        for target in &targets {
            let output = if dirty {
                self.build_target(&ctx, target)?
            } else {
                pipeline.cache(&ctx.cache_key(target), || self.build_target(&ctx, target))?
            };
            outputs.push(output);
        }

        info!(count = outputs.len(), version, "build complete");
        Ok(BuildReport::Built { outputs })
    }

    /// Run the script for one target, then pack and checksum its output
    pub fn build_target(&self, ctx: &BuildContext, target: &Target) -> Result<BuildOutput> {
        let target_label = target.to_string();
        let out_dir = self.work_dir.join(&self.config.output_dir);
        fs::create_dir_all(&out_dir)?;
        let binary = out_dir.join(target.output_file_name(&self.name));

        info!(target = %target_label, file = %binary.display(), "building");
        ScriptExecutor::execute(
            &self.work_dir,
            &self.config.script,
            &binary,
            &ctx.to_env_vars(target),
            &target_label,
            Duration::from_secs(self.config.timeout_secs),
        )?;

        if !binary.exists() {
            return Err(RelgateError::build(
                &self.config.script,
                &target_label,
                format!("expected file {} to be created but it was not", binary.display()),
            ));
        }

        let archive = archive::pack(&binary)?;
        let (checksum_file, sha256) = write_checksum_file(&binary)?;

        Ok(BuildOutput {
            target: target.clone(),
            binary,
            archive,
            checksum_file,
            sha256,
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
