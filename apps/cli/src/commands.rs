//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use gitcorpus_core::pipeline::FetchSummary;
use gitcorpus_core::{
    ChainedCredentials, CredentialProvider, EnvCredentials, HarvestConfig, HarvestOverrides,
    HarvestResult, ProgressReporter, StaticCredentials, run_harvest,
};
use gitcorpus_shared::{AppConfig, RefreshMode, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::prompt::PromptCredentials;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// gitcorpus: turn repository files into a keyed JSON dataset.
#[derive(Parser)]
#[command(
    name = "gitcorpus",
    version,
    about = "Fetch pattern-matched files from a GitHub repository into a JSON dataset.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.gitcorpus/gitcorpus.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch matching files and write the dataset.
    Fetch(FetchArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `fetch`; each one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct FetchArgs {
    /// Repository owner (user or organization).
    #[arg(long)]
    pub owner: Option<String>,

    /// Repository name.
    #[arg(long)]
    pub repo: Option<String>,

    /// Branch, tag, or commit.
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Path regex; repeat to match any of several.
    #[arg(short, long = "pattern")]
    pub patterns: Vec<String>,

    /// Dataset JSON file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Refresh mode: update (keep prior records) or overwrite.
    #[arg(short, long, value_parser = RefreshMode::from_str)]
    pub mode: Option<RefreshMode>,

    /// Maximum blob requests in flight.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Bearer token (otherwise read from the configured env var or prompted).
    #[arg(long, env = "GITCORPUS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Never prompt for a token.
    #[arg(long)]
    pub no_prompt: bool,
}

impl FetchArgs {
    fn overrides(&self) -> HarvestOverrides {
        HarvestOverrides {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            patterns: self.patterns.clone(),
            output: self.output.clone(),
            mode: self.mode,
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "gitcorpus=info",
        1 => "gitcorpus=debug",
        _ => "gitcorpus=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Fetch(args) => cmd_fetch(config_path, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

async fn cmd_fetch(config_path: Option<&Path>, args: &FetchArgs) -> Result<()> {
    // Config and patterns first: nothing else runs on a bad config.
    let app = load_app_config(config_path)?;
    let config = HarvestConfig::resolve(&app, &args.overrides())?;

    let mut credentials = ChainedCredentials::new();
    if let Some(token) = &args.token {
        credentials = credentials.with(StaticCredentials::new(token.clone()));
    }
    credentials = credentials.with(EnvCredentials::new(&config.token_env));
    if !args.no_prompt {
        credentials = credentials.with(PromptCredentials::new("GitHub token"));
    }
    let token = credentials.bearer_token().map_err(|e| {
        eyre!("{e}\nSet the {} environment variable or pass --token.", config.token_env)
    })?;

    info!(
        repo = %config.coords,
        output = %config.output.display(),
        mode = %config.mode,
        "starting fetch"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight requests");
            on_signal.cancel();
        }
    });

    let reporter = CliProgress::new();
    let outcome = run_harvest(
        &config,
        &StaticCredentials::new(token),
        &reporter,
        &cancel,
    )
    .await;
    reporter.finish();
    let result = outcome?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &HarvestResult) {
    println!();
    if let Some(err) = &result.tree_error {
        println!("  Repository could not be listed: {err}");
    }
    println!("  Dataset written!");
    println!("  Matched:  {}", result.matched);
    println!("  Fetched:  {}", result.fetched);
    if !result.failures.is_empty() {
        println!("  Failed:   {}", result.failures.len());
        for failure in &result.failures {
            println!("    - {} ({})", failure.path, failure.error);
        }
    }
    println!("  Prior:    {}", result.prior_records);
    println!("  Total:    {}", result.total_records);
    println!("  Mode:     {}", result.mode);
    println!("  Path:     {}", result.output.display());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner for phases, a bar while fetching files.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn files_matched(&self, total: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("Parsing files: [{bar:50.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>."),
        );
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn file_fetched(&self, path: &str, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
        self.bar.set_message(path.to_string());
    }

    fn file_failed(&self, path: &str, error: &str) {
        self.bar.println(format!("  skipped {path}: {error}"));
    }

    fn done(&self, summary: &FetchSummary) {
        self.bar.finish_with_message(format!(
            "{} of {} files fetched",
            summary.fetched, summary.matched
        ));
    }
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
