//! End-to-end harvest pipeline: config → prior dataset → fetch → merge → persist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use gitcorpus_fetcher::{
    FetchOptions, FileFailure, GitHost, GithubClient, PatternSet, RemoteOptions, RepoFetcher,
};
use gitcorpus_shared::{AppConfig, GitCorpusError, RefreshMode, RepositoryCoordinates, Result};
use gitcorpus_storage::DatasetStore;

use crate::credentials::CredentialProvider;
use crate::merge::merge;

pub use gitcorpus_fetcher::{FetchSummary, ProgressReporter, SilentProgress};

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Values given on the command line; each one replaces its config file value.
#[derive(Debug, Clone, Default)]
pub struct HarvestOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    /// Replaces the configured pattern list when non-empty.
    pub patterns: Vec<String>,
    pub output: Option<PathBuf>,
    pub mode: Option<RefreshMode>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Runtime configuration for one harvest, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub coords: RepositoryCoordinates,
    pub patterns: PatternSet,
    /// Dataset JSON file.
    pub output: PathBuf,
    pub mode: RefreshMode,
    pub remote: RemoteOptions,
    pub fetch: FetchOptions,
    /// Env var consulted for the bearer token.
    pub token_env: String,
}

impl HarvestConfig {
    /// Merge `overrides` over `app`, check required values, and compile patterns.
    ///
    /// Runs before any credential lookup or network call, so a typo in a
    /// pattern costs nothing.
    pub fn resolve(app: &AppConfig, overrides: &HarvestOverrides) -> Result<Self> {
        let repo_cfg = &app.repository;

        let owner = required(overrides.owner.as_ref().or(repo_cfg.owner.as_ref()), "repository.owner")?;
        let repo = required(overrides.repo.as_ref().or(repo_cfg.repo.as_ref()), "repository.repo")?;
        let branch = required(
            overrides.branch.as_ref().or(Some(&repo_cfg.branch)),
            "repository.branch",
        )?;

        let pattern_src = if overrides.patterns.is_empty() {
            repo_cfg.patterns.to_vec()
        } else {
            overrides.patterns.clone()
        };
        let patterns = PatternSet::new(&pattern_src)?;

        let output = overrides
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&app.output.path));
        if output.as_os_str().is_empty() {
            return Err(GitCorpusError::config("output.path is not set"));
        }

        let mut remote = RemoteOptions::from(&app.remote);
        if let Some(secs) = overrides.timeout_secs {
            remote.timeout = Duration::from_secs(secs);
        }

        let mut fetch = FetchOptions::from(&app.remote);
        if let Some(n) = overrides.concurrency {
            fetch.concurrency = n;
        }
        if fetch.concurrency == 0 {
            return Err(GitCorpusError::config("remote.concurrency must be at least 1"));
        }

        Ok(Self {
            coords: RepositoryCoordinates::new(owner, repo, branch),
            patterns,
            output,
            mode: overrides.mode.unwrap_or(app.output.mode),
            remote,
            fetch,
            token_env: app.remote.token_env.clone(),
        })
    }
}

fn required(value: Option<&String>, key: &str) -> Result<String> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(GitCorpusError::config(format!("{key} is not set"))),
    }
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

/// Result of a harvest run.
#[derive(Debug)]
pub struct HarvestResult {
    /// Dataset file that was written.
    pub output: PathBuf,
    pub mode: RefreshMode,
    /// Files that passed the pattern filter.
    pub matched: usize,
    /// Records fetched in this run.
    pub fetched: usize,
    /// Matched files skipped because their blob could not be fetched.
    pub failures: Vec<FileFailure>,
    /// Set when the tree listing failed and nothing was fetched.
    pub tree_error: Option<String>,
    /// Records loaded from the prior dataset (UPDATE only).
    pub prior_records: usize,
    /// Records in the dataset that was written.
    pub total_records: usize,
    pub elapsed: Duration,
}

/// Acquire a token, connect to GitHub, and run the harvest.
///
/// A missing token fails here, before any network activity.
pub async fn run_harvest(
    config: &HarvestConfig,
    credentials: &dyn CredentialProvider,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<HarvestResult> {
    let token = credentials.bearer_token()?;
    let client = GithubClient::new(&config.remote, &token)?;
    harvest(config, Arc::new(client), progress, cancel).await
}

/// Run the harvest against any [`GitHost`].
///
/// 1. Load the prior dataset (UPDATE only; a corrupt file is fatal)
/// 2. Fetch matching files
/// 3. Merge according to the refresh mode
/// 4. Write the dataset once
#[instrument(skip_all, fields(repo = %config.coords, mode = %config.mode))]
pub async fn harvest(
    config: &HarvestConfig,
    host: Arc<dyn GitHost>,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<HarvestResult> {
    let start = Instant::now();
    let store = DatasetStore::new(&config.output);

    // --- Phase 1: Prior state ---
    let prior = match config.mode {
        RefreshMode::Update => {
            progress.phase("Loading prior dataset");
            store.load()?
        }
        RefreshMode::Overwrite => None,
    };
    let prior_records = prior.as_ref().map_or(0, |d| d.len());

    // --- Phase 2: Fetch ---
    let fetcher = RepoFetcher::new(host, config.fetch.clone());
    let outcome = fetcher
        .fetch(&config.coords, &config.patterns, progress, cancel)
        .await?;

    if outcome.is_degraded() {
        if let Some(err) = &outcome.tree_error {
            warn!(error = %err, "repository produced no files");
        }
        for failure in &outcome.failures {
            warn!(path = %failure.path, error = %failure.error, "file missing from dataset");
        }
    }

    // --- Phase 3: Merge ---
    let fetched = outcome.dataset.len();
    let merged = merge(prior, outcome.dataset, config.mode);

    // --- Phase 4: Persist ---
    progress.phase("Writing dataset");
    store.save(&merged)?;

    let result = HarvestResult {
        output: config.output.clone(),
        mode: config.mode,
        matched: outcome.matched,
        fetched,
        failures: outcome.failures,
        tree_error: outcome.tree_error,
        prior_records,
        total_records: merged.len(),
        elapsed: start.elapsed(),
    };

    info!(
        output = %result.output.display(),
        fetched = result.fetched,
        prior = result.prior_records,
        total = result.total_records,
        elapsed_ms = result.elapsed.as_millis(),
        "harvest completed"
    );

    Ok(result)
}
