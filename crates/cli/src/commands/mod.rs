//! CLI command definitions and execution
//!
//! Each command lives in its own module and exposes an `execute` function
//! returning an [`ExitCode`]. Commands that talk to the storage service get a
//! [`Session`] through [`connect`].

use std::sync::Arc;

use clap::{Parser, Subcommand};
use s3ctl_core::config::Defaults;
use s3ctl_core::{BulkOps, ProfileManager, Result, StorageBackend, TransferEngine};
use s3ctl_s3::S3Backend;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{OutputConfig, transfer_progress};

mod completions;
mod config;
mod del;
mod download;
mod ls;
mod mb;
mod put;
mod rb;
mod url;

/// s3ctl - command-line client for S3-compatible object storage
///
/// Maps filesystem-style operations onto buckets and objects addressed as
/// s3://bucket/key. A trailing slash addresses a prefix (directory).
#[derive(Parser, Debug)]
#[command(name = "s3ctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Profile to use instead of the current one
    #[arg(long, global = true, env = "S3CTL_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets, or objects under a bucket or prefix
    Ls(ls::LsArgs),

    /// Upload a file or a directory tree
    Put(put::PutArgs),

    /// Download an object or everything under a prefix
    #[command(visible_alias = "get")]
    Download(download::DownloadArgs),

    /// Delete an object or everything under a prefix
    Del(del::DelArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Remove an empty bucket
    Rb(rb::RbArgs),

    /// Generate a presigned download URL
    Url(url::UrlArgs),

    /// Manage the configuration file and profiles
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// State shared by every command of one invocation
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputConfig,
    pub profile: Option<String>,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(cli: &Cli, cancel: CancellationToken) -> Self {
        Self {
            output: OutputConfig {
                json: cli.json,
                no_color: cli.no_color,
                no_progress: cli.no_progress,
                quiet: cli.quiet,
            },
            profile: cli.profile.clone(),
            cancel,
        }
    }
}

/// A connected backend plus the configured defaults
pub(crate) struct Session {
    pub backend: Arc<dyn StorageBackend>,
    pub defaults: Defaults,
}

impl Session {
    /// Transfer engine wired to this invocation's progress and cancellation
    pub fn engine(&self, ctx: &Context) -> TransferEngine {
        TransferEngine::new(Arc::clone(&self.backend), ctx.cancel.clone())
            .with_progress(transfer_progress(&ctx.output, self.defaults.progress))
    }

    pub fn bulk(&self, ctx: &Context) -> BulkOps {
        BulkOps::new(self.engine(ctx)).with_page_size(self.defaults.page_size)
    }
}

/// Resolve the profile and build the S3 backend
pub(crate) async fn connect(ctx: &Context) -> Result<Session> {
    connect_with(ctx, |backend| backend).await
}

/// Like [`connect`], letting the command adjust the backend first
pub(crate) async fn connect_with(
    ctx: &Context,
    configure: impl FnOnce(S3Backend) -> S3Backend,
) -> Result<Session> {
    let profiles = ProfileManager::new()?;
    let profile = profiles.select(ctx.profile.as_deref())?;
    let defaults = profiles.config_manager().load()?.defaults;

    tracing::debug!(profile = %profile.name, endpoint = %profile.endpoint, "connecting");
    let backend = configure(S3Backend::new(&profile).await?);

    Ok(Session {
        backend: Arc::new(backend),
        defaults,
    })
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli, cancel: CancellationToken) -> ExitCode {
    let ctx = Context::new(&cli, cancel);

    match cli.command {
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Put(args) => put::execute(args, &ctx).await,
        Commands::Download(args) => download::execute(args, &ctx).await,
        Commands::Del(args) => del::execute(args, &ctx).await,
        Commands::Mb(args) => mb::execute(args, &ctx).await,
        Commands::Rb(args) => rb::execute(args, &ctx).await,
        Commands::Url(args) => url::execute(args, &ctx).await,
        Commands::Config(cmd) => config::execute(cmd, &ctx),
        Commands::Completions(args) => completions::execute(args),
    }
}
