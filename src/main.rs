// Entrypoint for the asset publisher.
// - Parses the command line, builds the layered configuration and hands
//   the synchronizer to the UI layer.
// - Exit codes: 0 when at least one file was published, 1 when every
//   file failed, 2 for configuration and precondition errors.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use asset_publish::api::ApiClient;
use asset_publish::assets;
use asset_publish::config::{FileConfig, Settings};
use asset_publish::sync::{RunSummary, Synchronizer, DEFAULT_MESSAGE_TEMPLATE};
use asset_publish::ui::{self, PublishOptions};

const DEFAULT_SOURCE_DIR: &str = "assets/images";

#[derive(Parser, Debug)]
#[command(
    name = "asset-publish",
    version,
    about = "Publish a directory of images to a repository through its contents API"
)]
struct Cli {
    /// Log progress to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update every image in DIR on the remote branch.
    Publish(PublishArgs),

    /// Show the resolved configuration without contacting the remote.
    Check(RepoArgs),
}

/// Repository coordinates and credentials. Flags override environment
/// variables, which override the config file.
#[derive(Args, Debug)]
struct RepoArgs {
    /// JSON config file (default: <config dir>/asset-publish/config.json)
    #[arg(long, env = "ASSET_PUBLISH_CONFIG")]
    config: Option<PathBuf>,

    /// API root, e.g. https://api.github.com
    #[arg(long, env = "ASSET_PUBLISH_API_BASE")]
    api_base: Option<String>,

    /// Repository owner
    #[arg(long, env = "ASSET_PUBLISH_OWNER")]
    owner: Option<String>,

    /// Repository name
    #[arg(long, env = "ASSET_PUBLISH_REPO")]
    repo: Option<String>,

    /// Access token with write access to the repository contents
    #[arg(long, env = "ASSET_PUBLISH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Target branch
    #[arg(long, env = "ASSET_PUBLISH_BRANCH")]
    branch: Option<String>,

    /// Directory inside the repository to publish under
    #[arg(long)]
    remote_dir: Option<String>,
}

impl RepoArgs {
    fn settings(&self) -> Result<Settings> {
        let file = FileConfig::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;
        let overrides = FileConfig {
            api_base: self.api_base.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            token: self.token.clone(),
            branch: self.branch.clone(),
            remote_dir: self.remote_dir.clone(),
        };
        Ok(file.merge(overrides).resolve())
    }
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Local directory holding the images
    #[arg(default_value = DEFAULT_SOURCE_DIR)]
    dir: PathBuf,

    #[command(flatten)]
    repo: RepoArgs,

    /// Commit message; `{name}` is replaced by the file name
    #[arg(long, default_value = DEFAULT_MESSAGE_TEMPLATE)]
    message: String,

    /// Probe every file and report what would change, without writing
    #[arg(long)]
    dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

/// Per-file failures already appear in the summary, so the quiet default
/// only lets through errors.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "error"
    }
}

fn init_tracing(verbose: bool) {
    let default = default_filter(verbose);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn publish(args: PublishArgs) -> Result<Option<RunSummary>> {
    let settings = args.repo.settings()?;
    settings.credentials.validate()?;

    let assets = assets::enumerate(&args.dir, &settings.remote_dir)?;
    let api = ApiClient::new(settings.credentials.clone())?;
    let sync = Synchronizer::new(api, settings.credentials.clone())?
        .with_message_template(args.message)
        .dry_run(args.dry_run);

    let opts = PublishOptions {
        assume_yes: args.yes,
        dry_run: args.dry_run,
    };
    ui::publish(&sync, assets, &settings, opts)
}

fn check(args: RepoArgs) -> Result<Option<RunSummary>> {
    let settings = args.settings()?;
    ui::print_check(&settings);
    settings.credentials.validate()?;
    Ok(None)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Publish(args) => publish(args),
        Commands::Check(args) => check(args),
    };
    if let Err(e) = &result {
        eprintln!("error: {e:#}");
    }
    ExitCode::from(ui::exit_code(&result))
}
