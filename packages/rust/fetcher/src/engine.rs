//! Concurrent repository fetch engine.
//!
//! Lists the tree once, keeps blob entries whose path matches, then fetches
//! matching blobs through a semaphore-bounded set of tasks. Results are
//! collected by the calling task, so the dataset never sees concurrent writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use gitcorpus_shared::{
    Dataset, FileRecord, GitCorpusError, RemoteConfig, RepositoryCoordinates, Result, TreeEntry,
};

use crate::pattern::{PatternSet, matches};
use crate::progress::{FetchSummary, ProgressReporter};
use crate::remote::GitHost;
use crate::sanitize::sanitize;

// ---------------------------------------------------------------------------
// Options & outcome
// ---------------------------------------------------------------------------

/// Tuning for [`RepoFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum blob requests in flight.
    pub concurrency: usize,
    /// Web root for canonical keys (`https://github.com`).
    pub web_base_url: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for FetchOptions {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            web_base_url: config.web_base_url.to_string(),
        }
    }
}

/// A matched file whose blob could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Result of one fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Records for every successfully fetched file.
    pub dataset: Dataset,
    /// Files that passed the pattern filter.
    pub matched: usize,
    /// Matched files that were skipped because their blob fetch failed.
    pub failures: Vec<FileFailure>,
    /// Set when the tree could not be listed and the run produced nothing.
    pub tree_error: Option<String>,
    pub duration: Duration,
}

impl FetchOutcome {
    fn degraded(error: String, duration: Duration) -> Self {
        Self {
            tree_error: Some(error),
            duration,
            ..Self::default()
        }
    }

    fn summary(&self) -> FetchSummary {
        FetchSummary {
            matched: self.matched,
            fetched: self.dataset.len(),
            failed: self.failures.len(),
            elapsed: self.duration,
        }
    }

    /// Whether any part of the repository could not be read.
    pub fn is_degraded(&self) -> bool {
        self.tree_error.is_some() || !self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RepoFetcher
// ---------------------------------------------------------------------------

/// Fetches pattern-matched files of one repository snapshot into a [`Dataset`].
pub struct RepoFetcher {
    host: Arc<dyn GitHost>,
    options: FetchOptions,
}

impl RepoFetcher {
    pub fn new(host: Arc<dyn GitHost>, options: FetchOptions) -> Self {
        Self { host, options }
    }

    /// Fetch every blob under `coords` whose path matches `patterns`.
    ///
    /// Remote failures never escape: a tree failure yields an empty outcome with
    /// `tree_error` set, and a blob failure skips that one file. The only error
    /// returned is [`GitCorpusError::Cancelled`].
    #[instrument(skip_all, fields(repo = %coords))]
    pub async fn fetch(
        &self,
        coords: &RepositoryCoordinates,
        patterns: &PatternSet,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let start = Instant::now();

        info!(
            url = %coords.tree_web_url(&self.options.web_base_url),
            patterns = ?patterns.as_strs(),
            concurrency = self.options.concurrency,
            "fetching repository files"
        );

        progress.phase("Listing repository tree");
        let tree = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GitCorpusError::Cancelled),
            tree = self.host.tree(coords) => tree,
        };

        let tree = match tree {
            Ok(tree) => tree,
            Err(e) if e.is_remote() => {
                error!(error = %e, "tree retrieval failed; no files will be produced");
                let outcome = FetchOutcome::degraded(e.to_string(), start.elapsed());
                progress.files_matched(0);
                progress.done(&outcome.summary());
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };

        let file_count = tree.iter().filter(|e| e.is_file()).count();
        let selected = select_files(tree, patterns);
        let total = selected.len();
        info!(files = file_count, matched = total, "tree filtered");
        progress.files_matched(total);

        progress.phase("Fetching files");
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut paths = HashMap::with_capacity(total);

        for entry in selected {
            let host = Arc::clone(&self.host);
            let sem = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let coords = coords.clone();
            let web_base_url = self.options.web_base_url.clone();
            let path = entry.path.clone();

            let handle = tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|_| GitCorpusError::Cancelled)?;

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(GitCorpusError::Cancelled),
                    record = fetch_record(host.as_ref(), &coords, &entry, &web_base_url) => record,
                }
            });
            paths.insert(handle.id(), path);
        }

        let mut dataset = Dataset::new();
        let mut failures = Vec::new();
        let mut completed = 0;

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let path = paths.remove(&id).unwrap_or_default();

            match result {
                Ok(Ok((key, record))) => {
                    completed += 1;
                    debug!(%path, completed, total, "file fetched");
                    dataset.insert(key, record);
                    progress.file_fetched(&path, completed, total);
                }
                Ok(Err(GitCorpusError::Cancelled)) => {
                    tasks.abort_all();
                    return Err(GitCorpusError::Cancelled);
                }
                Ok(Err(e)) => {
                    warn!(%path, error = %e, "skipping file");
                    progress.file_failed(&path, &e.to_string());
                    failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(%path, error = %e, "fetch task failed");
                    progress.file_failed(&path, &e.to_string());
                    failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(GitCorpusError::Cancelled);
        }

        let outcome = FetchOutcome {
            dataset,
            matched: total,
            failures,
            tree_error: None,
            duration: start.elapsed(),
        };

        info!(
            matched = outcome.matched,
            fetched = outcome.dataset.len(),
            failed = outcome.failures.len(),
            duration_ms = outcome.duration.as_millis(),
            "fetch completed"
        );
        progress.done(&outcome.summary());

        Ok(outcome)
    }
}

/// Keep file entries whose path matches, in listing order.
pub(crate) fn select_files(tree: Vec<TreeEntry>, patterns: &PatternSet) -> Vec<TreeEntry> {
    tree.into_iter()
        .filter(|entry| entry.is_file() && matches(&entry.path, patterns))
        .collect()
}

/// Fetch one blob and turn it into its keyed record.
async fn fetch_record(
    host: &dyn GitHost,
    coords: &RepositoryCoordinates,
    entry: &TreeEntry,
    web_base_url: &str,
) -> Result<(String, FileRecord)> {
    let blob = host.blob(coords, &entry.sha).await?;

    let record = FileRecord {
        url: entry
            .url
            .clone()
            .unwrap_or_else(|| host.blob_url(coords, &entry.sha)),
        path: entry.path.clone(),
        content: sanitize(&blob.content),
        branch: coords.reference.clone(),
        repository: coords.repository.clone(),
        namespace: coords.namespace.clone(),
    };

    Ok((coords.blob_web_url(web_base_url, &entry.path), record))
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use gitcorpus_shared::EntryKind;

    use super::*;
    use crate::progress::SilentProgress;
    use crate::remote::Blob;

    /// In-memory host with optional failures and an in-flight counter.
    #[derive(Default)]
    struct FakeHost {
        tree: Vec<TreeEntry>,
        blobs: HashMap<String, Vec<u8>>,
        fail_tree: bool,
        fail_blobs: HashSet<String>,
        panic_blobs: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn with_files(files: &[(&str, &str, &str)]) -> Self {
            let mut host = Self::default();
            for (path, sha, content) in files {
                host.tree.push(blob_entry(path, sha));
                host.blobs.insert(sha.to_string(), content.as_bytes().to_vec());
            }
            host
        }
    }

    #[async_trait]
    impl GitHost for FakeHost {
        async fn tree(&self, _coords: &RepositoryCoordinates) -> Result<Vec<TreeEntry>> {
            if self.fail_tree {
                return Err(GitCorpusError::remote_status("HTTP 404", 404));
            }
            Ok(self.tree.clone())
        }

        async fn blob(&self, _coords: &RepositoryCoordinates, sha: &str) -> Result<Blob> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.requested.lock().unwrap().push(sha.to_string());
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_blobs.contains(sha) {
                panic!("host bug while fetching {sha}");
            }
            if self.fail_blobs.contains(sha) {
                return Err(GitCorpusError::remote(format!("blob {sha}: connection reset")));
            }
            let content = self
                .blobs
                .get(sha)
                .cloned()
                .ok_or_else(|| GitCorpusError::remote_status("HTTP 404", 404))?;
            Ok(Blob {
                sha: sha.to_string(),
                content,
            })
        }

        fn blob_url(&self, coords: &RepositoryCoordinates, sha: &str) -> String {
            format!(
                "https://api.example.com/repos/{}/{}/git/blobs/{sha}",
                coords.namespace, coords.repository
            )
        }
    }

    /// Records progress callbacks for assertions.
    #[derive(Default)]
    struct RecordingProgress {
        fetched: Mutex<Vec<(usize, usize)>>,
        failed: Mutex<Vec<String>>,
        matched: AtomicUsize,
        done: Mutex<Vec<FetchSummary>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn files_matched(&self, total: usize) {
            self.matched.store(total, Ordering::SeqCst);
        }
        fn file_fetched(&self, _path: &str, completed: usize, total: usize) {
            self.fetched.lock().unwrap().push((completed, total));
        }
        fn file_failed(&self, path: &str, _error: &str) {
            self.failed.lock().unwrap().push(path.to_string());
        }
        fn done(&self, summary: &FetchSummary) {
            self.done.lock().unwrap().push(summary.clone());
        }
    }

    fn blob_entry(path: &str, sha: &str) -> TreeEntry {
        TreeEntry {
            path: path.into(),
            sha: sha.into(),
            kind: EntryKind::Blob,
            url: None,
        }
    }

    fn coords() -> RepositoryCoordinates {
        RepositoryCoordinates::new("acme", "widgets", "main")
    }

    fn fetcher(host: Arc<FakeHost>, concurrency: usize) -> RepoFetcher {
        RepoFetcher::new(
            host,
            FetchOptions {
                concurrency,
                web_base_url: "https://github.com".into(),
            },
        )
    }

    #[test]
    fn select_files_skips_directories_and_non_matches() {
        let mut tree = vec![blob_entry("a.md", "1"), blob_entry("b.ts", "2")];
        tree.push(TreeEntry {
            path: "docs.md".into(),
            sha: "3".into(),
            kind: EntryKind::Tree,
            url: None,
        });
        tree.push(blob_entry("c.py", "4"));

        let patterns = PatternSet::new([r"\.md$", r"\.ts$"]).unwrap();
        let paths: Vec<_> = select_files(tree, &patterns)
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["a.md", "b.ts"]);
    }

    #[tokio::test]
    async fn fetch_keeps_only_matching_files() {
        let host = Arc::new(FakeHost::with_files(&[
            ("a.md", "sa", "# A"),
            ("b.ts", "sb", "export {}"),
            ("c.py", "sc", "print()"),
        ]));
        let patterns = PatternSet::new([r"\.md$", r"\.ts$"]).unwrap();

        let outcome = fetcher(host.clone(), 4)
            .fetch(&coords(), &patterns, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        let keys: Vec<_> = outcome.dataset.keys().collect();
        assert_eq!(
            keys,
            vec![
                "https://github.com/acme/widgets/blob/main/a.md",
                "https://github.com/acme/widgets/blob/main/b.ts",
            ]
        );
        assert_eq!(outcome.matched, 2);
        assert!(!outcome.is_degraded());
        assert!(!host.requested.lock().unwrap().contains(&"sc".to_string()));
    }

    #[tokio::test]
    async fn records_carry_coordinates_and_sanitized_content() {
        let host = Arc::new(FakeHost::with_files(&[("README.md", "abc", "Hello")]));
        let other = Arc::new(FakeHost::with_files(&[("notes.md", "n1", "caf\u{e9}")]));
        let patterns = PatternSet::single(r"\.md$").unwrap();
        let cancel = CancellationToken::new();

        let outcome = fetcher(host, 2)
            .fetch(&coords(), &patterns, &SilentProgress, &cancel)
            .await
            .unwrap();
        let record = outcome
            .dataset
            .get("https://github.com/acme/widgets/blob/main/README.md")
            .expect("README record");
        assert_eq!(record.content, "Hello");
        assert_eq!(record.path, "README.md");
        assert_eq!(record.branch, "main");
        assert_eq!(record.repository, "widgets");
        assert_eq!(record.namespace, "acme");
        assert_eq!(
            record.url,
            "https://api.example.com/repos/acme/widgets/git/blobs/abc"
        );

        let outcome = fetcher(other, 2)
            .fetch(&coords(), &patterns, &SilentProgress, &cancel)
            .await
            .unwrap();
        let (_, record) = outcome.dataset.iter().next().unwrap();
        assert_eq!(record.content, "caf\\u00e9");
    }

    #[tokio::test]
    async fn tree_failure_degrades_to_empty() {
        let host = Arc::new(FakeHost {
            fail_tree: true,
            ..FakeHost::default()
        });
        let patterns = PatternSet::single(".*").unwrap();

        let progress = RecordingProgress::default();

        let outcome = fetcher(host, 2)
            .fetch(&coords(), &patterns, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.dataset.is_empty());
        assert!(outcome.tree_error.as_deref().unwrap().contains("404"));
        assert!(outcome.is_degraded());

        let done = progress.done.lock().unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!((done[0].matched, done[0].fetched, done[0].failed), (0, 0, 0));
    }

    #[tokio::test]
    async fn blob_failure_is_isolated_to_its_file() {
        let mut host = FakeHost::with_files(&[
            ("a.md", "sa", "A"),
            ("b.md", "sb", "B"),
            ("c.md", "sc", "C"),
        ]);
        host.fail_blobs.insert("sb".into());
        let host = Arc::new(host);
        let progress = RecordingProgress::default();
        let patterns = PatternSet::single(r"\.md$").unwrap();

        let outcome = fetcher(host, 3)
            .fetch(&coords(), &patterns, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(outcome.matched, 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "b.md");
        assert!(outcome.failures[0].error.contains("connection reset"));
        assert_eq!(*progress.failed.lock().unwrap(), vec!["b.md".to_string()]);
    }

    #[tokio::test]
    async fn progress_counts_up_to_total() {
        let host = Arc::new(FakeHost::with_files(&[
            ("a.md", "sa", "A"),
            ("b.md", "sb", "B"),
            ("c.md", "sc", "C"),
        ]));
        let progress = RecordingProgress::default();
        let patterns = PatternSet::single(r"\.md$").unwrap();

        fetcher(host, 2)
            .fetch(&coords(), &patterns, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(progress.matched.load(Ordering::SeqCst), 3);
        assert_eq!(*progress.fetched.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let files: Vec<(String, String)> = (0..8)
            .map(|i| (format!("doc{i}.md"), format!("s{i}")))
            .collect();
        let mut host = FakeHost {
            delay: Duration::from_millis(20),
            ..FakeHost::default()
        };
        for (path, sha) in &files {
            host.tree.push(blob_entry(path, sha));
            host.blobs.insert(sha.clone(), b"x".to_vec());
        }
        let host = Arc::new(host);
        let patterns = PatternSet::single(r"\.md$").unwrap();

        let outcome = fetcher(host.clone(), 3)
            .fetch(&coords(), &patterns, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.dataset.len(), 8);
        let peak = host.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight requests was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn cancelled_fetch_returns_cancelled() {
        let host = Arc::new(FakeHost::with_files(&[("a.md", "sa", "A")]));
        let patterns = PatternSet::single(r"\.md$").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher(host, 2)
            .fetch(&coords(), &patterns, &SilentProgress, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GitCorpusError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_reaches_in_flight_requests() {
        let mut host = FakeHost::with_files(&[("a.md", "sa", "A"), ("b.md", "sb", "B")]);
        host.delay = Duration::from_secs(30);
        let host = Arc::new(host);
        let patterns = PatternSet::single(r"\.md$").unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = fetcher(host, 2)
            .fetch(&coords(), &patterns, &SilentProgress, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GitCorpusError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn panicked_task_is_reported_under_its_path() {
        let mut host = FakeHost::with_files(&[("a.md", "sa", "A"), ("b.md", "sb", "B")]);
        host.panic_blobs.insert("sb".into());
        let host = Arc::new(host);
        let progress = RecordingProgress::default();
        let patterns = PatternSet::single(r"\.md$").unwrap();

        let outcome = fetcher(host, 2)
            .fetch(&coords(), &patterns, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "b.md");
        assert_eq!(*progress.failed.lock().unwrap(), vec!["b.md".to_string()]);
    }

    #[tokio::test]
    async fn timed_out_blob_is_skipped_not_fatal() {
        use crate::remote::{GithubClient, RemoteOptions};
        use url::Url;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/trees/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "truncated": false,
                "tree": [
                    {"path": "fast.md", "type": "blob", "sha": "fast"},
                    {"path": "slow.md", "type": "blob", "sha": "slow"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/blobs/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "encoding": "base64",
                "content": "RmFzdA=="
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/blobs/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"encoding": "base64", "content": ""}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = GithubClient::new(
            &RemoteOptions {
                api_base_url: Url::parse(&server.uri()).unwrap(),
                timeout: Duration::from_millis(200),
            },
            "t0ken",
        )
        .unwrap();
        let fetcher = RepoFetcher::new(
            Arc::new(client),
            FetchOptions {
                concurrency: 2,
                web_base_url: "https://github.com".into(),
            },
        );
        let patterns = PatternSet::single(r"\.md$").unwrap();

        let outcome = fetcher
            .fetch(&coords(), &patterns, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.matched, 2);
        let record = outcome
            .dataset
            .get("https://github.com/acme/widgets/blob/main/fast.md")
            .expect("fast record");
        assert_eq!(record.content, "Fast");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "slow.md");
    }
}
