//! Command wiring
//!
//! A [Session] owns everything a command needs (configuration, the git
//! backend, the CI environment snapshot) and exposes one method per
//! command. Methods return data; [Session::dispatch] prints it and records
//! the primary result for later pipeline steps.

use crate::archive;
use crate::build::{BuildReport, BuildRunner};
use crate::ci::CiEnvironment;
use crate::cli::{Cli, Command, CommitTypeArg, GitBackend, GlobalArgs, NextVersionArgs};
use crate::config::{load_config, Config};
use crate::domain::{CommitType, InvocationContext, Release};
use crate::error::{RelgateError, Result};
use crate::git::{commit_facts, ExecGitProvider, Git2Provider, GitProvider};
use crate::ledger::{GithubReleaseProvider, ReleaseCheck, ReleaseLedger, ReleaseProvider};
use crate::pipeline::{ExportMode, KvStore, PipelineStore};
use crate::resolver::{ResolvedVersion, VersionResolver};
use crate::ui;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, Span};

/// Binary name used when neither the config nor the directory provides one
const FALLBACK_NAME: &str = "app";

/// Outcome of `publish`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    /// The commit was released under a different tag; nothing ran
    AlreadyReleased { tag: String },
    Published { release: Release },
}

/// Run one parsed invocation
///
/// File utilities run without opening a repository.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        command @ (Command::Pack { .. } | Command::Unpack { .. } | Command::Checksum { .. }) => {
            run_file_command(command)
        }
        command => Session::open(&cli.global)?
            .with_span(info_span!("relgate", command = command.name()))
            .dispatch(command),
    }
}

/// `pack`, `unpack` and `checksum`; other commands are rejected
pub fn run_file_command(command: Command) -> Result<()> {
    match command {
        Command::Pack { path } => {
            let out = archive::pack(&path)?;
            ui::print_result(&out.display().to_string())?;
        }
        Command::Unpack { archive: path } => {
            let out = archive::unpack(&path)?;
            ui::print_result(&out.display().to_string())?;
        }
        Command::Checksum { path, verify } => {
            if verify {
                let checksum_file = archive::checksum_path(&path);
                if !archive::verify_checksum_file(&path, &checksum_file)? {
                    return Err(RelgateError::archive_io(
                        &path,
                        io::Error::new(io::ErrorKind::InvalidData, "checksum mismatch"),
                    ));
                }
                ui::display_success(&format!("{} matches", checksum_file.display()));
            } else {
                let (_, digest) = archive::write_checksum_file(&path)?;
                ui::print_result(&digest)?;
            }
        }
        other => {
            return Err(RelgateError::invalid_context(format!(
                "'{}' is not a file command",
                other.name()
            )))
        }
    }
    Ok(())
}

pub struct Session {
    config: Config,
    git: Box<dyn GitProvider>,
    env: CiEnvironment,
    work_dir: PathBuf,
    /// Parent of every component span opened for this session
    span: Span,
}

impl Session {
    /// Load configuration, open the selected git backend and snapshot the environment
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let config = load_config(global.config.as_deref())?;
        let git: Box<dyn GitProvider> = match global.git_backend {
            GitBackend::Git2 => Box::new(Git2Provider::open(&global.git_dir)?),
            GitBackend::Exec => Box::new(ExecGitProvider::open(&global.git_dir)?),
        };
        debug!(backend = ?global.git_backend, dir = %global.git_dir.display(), "opened repository");

        Ok(Session::new(
            config,
            git,
            CiEnvironment::from_env(),
            global.git_dir.clone(),
        ))
    }

    pub fn new(
        config: Config,
        git: Box<dyn GitProvider>,
        env: CiEnvironment,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Session {
            config,
            git,
            env,
            work_dir: work_dir.into(),
            span: info_span!("relgate"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn git(&self) -> &dyn GitProvider {
        self.git.as_ref()
    }

    /// Pipeline store for this run; a relative store file lives in the work dir
    pub fn pipeline(&self) -> Result<PipelineStore> {
        let located = KvStore::locate(&self.config.cache, &self.env);
        let store = if located.path().is_relative() {
            KvStore::new(self.work_dir.join(located.path()))
        } else {
            located
        };
        Ok(PipelineStore::open(store, self.env.clone())?
            .with_span(info_span!(parent: &self.span, "pipeline_store")))
    }

    /// Write to the CI channel when there is one, else to the store only
    pub fn export_mode(&self) -> ExportMode {
        match self.env.detect() {
            Ok(_) => ExportMode::Channel,
            Err(e) => {
                debug!(reason = %e, "no CI channel, keeping values in the store");
                ExportMode::StoreOnly
            }
        }
    }

    /// Build the resolution request from flags, config and CI environment
    ///
    /// Without `--type` the type is picked automatically.
    pub fn invocation_context(&self, args: &NextVersionArgs) -> InvocationContext {
        let mut ctx = InvocationContext::new(
            args.commit_type
                .map(CommitType::from)
                .unwrap_or(CommitType::Local),
        )
        .with_auto(args.auto || args.commit_type.is_none())
        .with_patch(args.patch)
        .with_patch_indicator(
            args.patch_indicator
                .clone()
                .unwrap_or_else(|| self.config.version.patch_indicator.clone()),
        )
        .with_exclude_v(args.no_v || self.config.version.exclude_v);

        if let Some(pr) = args.pr_number.or_else(|| self.env.pr_number()) {
            ctx = ctx.with_pr_number(pr);
        }
        if let Some(message) = &args.commit_message_override {
            ctx = ctx.with_commit_message(message.clone());
        }
        if let Some(tag) = &args.latest_tag_override {
            ctx = ctx.with_latest_tag(tag.clone());
        }
        ctx
    }

    pub fn next_version(&self, args: &NextVersionArgs) -> Result<ResolvedVersion> {
        let ctx = self.invocation_context(args);
        VersionResolver::with_span(info_span!(parent: &self.span, "version_resolver"))
            .resolve(self.git(), &ctx, self.env.is_ci())
    }

    /// GitHub provider from `GITHUB_TOKEN` and the repository slug
    ///
    /// The slug comes from `GITHUB_REPOSITORY`, else from the preferred remote.
    pub fn release_provider(&self) -> Result<GithubReleaseProvider> {
        if self.config.release.provider != "github" {
            return Err(RelgateError::config(format!(
                "Unsupported release provider '{}'",
                self.config.release.provider
            )));
        }

        let token = self
            .env
            .token()
            .ok_or_else(|| RelgateError::not_in_ci("env variable GITHUB_TOKEN is empty"))?;
        let (owner, name) = match self.env.repository() {
            Some((owner, name)) => (owner.to_string(), name.to_string()),
            None => {
                let meta = self.git.local_repository_metadata()?;
                (meta.owner, meta.name)
            }
        };

        GithubReleaseProvider::new(&self.config.release.api_base, owner, name, token)
    }

    /// Like [Session::release_provider], but a missing token means "no gate"
    pub fn optional_release_provider(&self) -> Result<Option<GithubReleaseProvider>> {
        if self.env.token().is_none() {
            debug!("GITHUB_TOKEN not set, release gate disabled");
            return Ok(None);
        }
        self.release_provider().map(Some)
    }

    pub fn ledger<'a>(&self, provider: &'a dyn ReleaseProvider) -> ReleaseLedger<'a> {
        ReleaseLedger::new(provider)
            .with_lookback(self.config.release.lookback)
            .with_span(info_span!(parent: &self.span, "release_ledger"))
    }

    pub fn already_released(&self, provider: &dyn ReleaseProvider) -> Result<ReleaseCheck> {
        self.ledger(provider).already_released(self.git())
    }

    fn binary_name(&self) -> String {
        if let Some(name) = &self.config.build.name {
            return name.clone();
        }
        fs::canonicalize(&self.work_dir)
            .ok()
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    fn runner(&self) -> BuildRunner {
        BuildRunner::new(self.config.build.clone(), self.binary_name(), &self.work_dir)
            .with_span(info_span!(parent: &self.span, "build_runner"))
    }

    /// Resolve the version, then build every target unless already released
    pub fn build(
        &self,
        pipeline: &PipelineStore,
        ledger: Option<&ReleaseLedger<'_>>,
        args: &NextVersionArgs,
    ) -> Result<BuildReport> {
        let resolved = self.next_version(args)?;
        self.runner().run(pipeline, ledger, self.git(), &resolved.tag)
    }

    /// Build, upload every package with its checksum, then publish the release
    ///
    /// A rerun after a partial upload resumes against the same draft: the
    /// gate only stops the run when the commit was released under another tag.
    pub fn publish(
        &self,
        pipeline: &PipelineStore,
        provider: &dyn ReleaseProvider,
    ) -> Result<PublishReport> {
        let resolved = self.next_version(&NextVersionArgs {
            commit_type: Some(CommitTypeArg::Release),
            ..Default::default()
        })?;
        let ledger = self.ledger(provider);

        let check = ledger.already_released(self.git())?;
        if check.released && check.tag != resolved.tag {
            return Ok(PublishReport::AlreadyReleased { tag: check.tag });
        }

        let outputs = match self.runner().run(pipeline, None, self.git(), &resolved.tag)? {
            BuildReport::Built { outputs } => outputs,
            BuildReport::AlreadyReleased { tag } => return Ok(PublishReport::AlreadyReleased { tag }),
        };

        let release = ledger.ensure_release(&resolved.tag, &resolved.commit)?;
        let mut expected = Vec::with_capacity(outputs.len() * 2);
        for output in &outputs {
            for path in [&output.archive, &output.checksum_file] {
                let name = file_name(path)?;
                provider.upload_release_artifact(&release, &name, path)?;
                expected.push(name);
            }
        }

        let release = ledger.finalize(&release, &expected)?;
        info!(tag = %release.tag, artifacts = expected.len(), "published release");
        Ok(PublishReport::Published { release })
    }

    /// Resolve the version and export the values later steps build on
    pub fn load(
        &self,
        pipeline: &PipelineStore,
        args: &NextVersionArgs,
    ) -> Result<Vec<(String, String)>> {
        let resolved = self.next_version(args)?;
        let facts = commit_facts(self.git(), &resolved.commit)?;
        let targets = self
            .config
            .build
            .parsed_targets()?
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let pairs = vec![
            ("RELGATE_TAG".to_string(), resolved.tag.clone()),
            ("RELGATE_TARGETS".to_string(), targets),
            ("RELGATE_CONTENT_HASH".to_string(), facts.content_hash.clone()),
            ("RELGATE_COMMIT".to_string(), facts.hash.clone()),
        ];
        pipeline.export_values("load", &pairs, self.export_mode())?;
        info!(
            commit = facts.short_hash(),
            branch = %facts.branch,
            base = ?facts.latest_semver_tag().map(|v| v.to_string()),
            tag = %resolved.tag,
            "loaded pipeline values"
        );
        Ok(pairs)
    }

    /// Run a parsed command, printing its result
    pub fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::NextVersion(args) => {
                let resolved = self.next_version(&args)?;
                ui::display_resolution(&resolved);
                self.record(&self.pipeline()?, "next-version", &resolved.tag)?;
            }
            Command::AlreadyReleased => {
                let provider = self.release_provider()?;
                let check = self.already_released(&provider)?;
                self.record(
                    &self.pipeline()?,
                    "already-released",
                    &ui::format_release_check(&check),
                )?;
            }
            Command::Build(args) => {
                let pipeline = self.pipeline()?;
                let provider = self.optional_release_provider()?;
                let ledger = provider
                    .as_ref()
                    .map(|p| self.ledger(p as &dyn ReleaseProvider));
                let report = self.build(&pipeline, ledger.as_ref(), &args)?;
                ui::display_build_report(&report);
            }
            Command::Publish => {
                let pipeline = self.pipeline()?;
                let provider = self.release_provider()?;
                match self.publish(&pipeline, &provider)? {
                    PublishReport::AlreadyReleased { tag } => {
                        ui::display_status(&format!("Already released as {}", tag));
                        self.record(&pipeline, "publish", &tag)?;
                    }
                    PublishReport::Published { release } => {
                        ui::display_success(&format!("Published {}", release.tag));
                        self.record(&pipeline, "publish", &release.tag)?;
                    }
                }
            }
            Command::Load(args) => {
                let pairs = self.load(&self.pipeline()?, &args)?;
                let lines: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                ui::print_lines(&lines)?;
            }
            Command::Export { pairs } => {
                let parsed = parse_pairs(&pairs)?;
                self.pipeline()?
                    .export_values("export", &parsed, self.export_mode())?;
                ui::display_success(&format!("Exported {} value(s)", parsed.len()));
            }
            Command::Env => {
                let values = self.pipeline()?.load_exported()?;
                ui::print_lines(&ui::format_exports(&values))?;
            }
            command @ (Command::Pack { .. } | Command::Unpack { .. } | Command::Checksum { .. }) => {
                run_file_command(command)?;
            }
        }
        Ok(())
    }

    fn record(&self, pipeline: &PipelineStore, command_id: &str, value: &str) -> Result<()> {
        pipeline.save_result(command_id, value, self.export_mode())?;
        ui::print_result(value)?;
        Ok(())
    }
}

/// `KEY=VALUE` arguments; the value may itself contain `=`
pub fn parse_pairs(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    RelgateError::invalid_context(format!("expected KEY=VALUE, got '{}'", pair))
                })
        })
        .collect()
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            RelgateError::archive_io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}
