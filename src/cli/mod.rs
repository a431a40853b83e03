//! Command-line surface of the `relgate` binary
//!
//! Argument types live here so the wiring in [orchestration] can be driven
//! from tests without going through `std::env::args`.

pub mod orchestration;

pub use orchestration::{run, Session};

use crate::domain::CommitType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "relgate",
    version,
    about = "Resolve release versions from git history and gate CI build/release steps"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = ".", help = "Repository directory")]
    pub git_dir: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = GitBackend::Git2)]
    pub git_backend: GitBackend,

    #[arg(long, global = true, help = "Verbose logging")]
    pub debug: bool,

    #[arg(short, long, global = true, conflicts_with = "debug", help = "Only log errors")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl Default for GlobalArgs {
    fn default() -> Self {
        GlobalArgs {
            config: None,
            git_dir: PathBuf::from("."),
            git_backend: GitBackend::Git2,
            debug: false,
            quiet: false,
            json_logs: false,
        }
    }
}

/// How repository facts are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GitBackend {
    /// In-process libgit2
    Git2,
    /// System `git` binary
    Exec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommitTypeArg {
    Local,
    Pr,
    Release,
}

impl From<CommitTypeArg> for CommitType {
    fn from(arg: CommitTypeArg) -> Self {
        match arg {
            CommitTypeArg::Local => CommitType::Local,
            CommitTypeArg::Pr => CommitType::PullRequest,
            CommitTypeArg::Release => CommitType::Release,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct NextVersionArgs {
    #[arg(long = "type", value_enum, help = "Kind of version to produce")]
    pub commit_type: Option<CommitTypeArg>,

    #[arg(long, conflicts_with = "commit_type", help = "Pick the type from the CI environment")]
    pub auto: bool,

    #[arg(long, help = "Pull request number (read from GITHUB_REF when omitted)")]
    pub pr_number: Option<u64>,

    #[arg(long, help = "Commit message token forcing a patch bump")]
    pub patch_indicator: Option<String>,

    #[arg(long, help = "Force a patch bump")]
    pub patch: bool,

    #[arg(long, help = "Use this message instead of HEAD's")]
    pub commit_message_override: Option<String>,

    #[arg(long, help = "Use this tag as the base version")]
    pub latest_tag_override: Option<String>,

    #[arg(long, help = "Print the version without the leading 'v'")]
    pub no_v: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the next version for HEAD
    NextVersion(NextVersionArgs),

    /// Print `true <tag>` if HEAD was already released, else `false`
    AlreadyReleased,

    /// Build and package every configured target
    Build(NextVersionArgs),

    /// Build, then upload the packages to a release and publish it
    Publish,

    /// Resolve the version and export it for later steps
    Load(NextVersionArgs),

    /// Export KEY=VALUE pairs for later steps
    Export {
        #[arg(required = true, value_name = "KEY=VALUE")]
        pairs: Vec<String>,
    },

    /// Print every value exported so far
    Env,

    /// Pack a file or directory into `<path>.tar.gz`
    Pack { path: PathBuf },

    /// Unpack `<name>.tar.gz` next to the archive
    Unpack { archive: PathBuf },

    /// Write `<path>.sha256`, or check it with `--verify`
    Checksum {
        path: PathBuf,

        #[arg(long)]
        verify: bool,
    },
}

impl Command {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::NextVersion(_) => "next-version",
            Command::AlreadyReleased => "already-released",
            Command::Build(_) => "build",
            Command::Publish => "publish",
            Command::Load(_) => "load",
            Command::Export { .. } => "export",
            Command::Env => "env",
            Command::Pack { .. } => "pack",
            Command::Unpack { .. } => "unpack",
            Command::Checksum { .. } => "checksum",
        }
    }
}
