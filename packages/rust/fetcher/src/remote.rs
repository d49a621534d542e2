//! Remote service boundary: recursive tree listing and blob retrieval.
//!
//! [`GitHost`] is the seam the fetch engine talks to. [`GithubClient`] is the
//! REST implementation; tests substitute their own hosts.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use gitcorpus_shared::{GitCorpusError, RemoteConfig, RepositoryCoordinates, Result, TreeEntry};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("gitcorpus/", env!("CARGO_PKG_VERSION"));

/// REST API version pinned in every request.
const API_VERSION: &str = "2022-11-28";

/// A blob's decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub sha: String,
    pub content: Vec<u8>,
}

/// Tree and blob retrieval from a hosting service.
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Full recursive listing of the tree at `coords.reference`.
    async fn tree(&self, coords: &RepositoryCoordinates) -> Result<Vec<TreeEntry>>;

    /// Content of the blob `sha`, decoded from its transport encoding.
    async fn blob(&self, coords: &RepositoryCoordinates, sha: &str) -> Result<Blob>;

    /// API URL of the blob `sha`, used when a tree entry carries none.
    fn blob_url(&self, coords: &RepositoryCoordinates, sha: &str) -> String;
}

// ---------------------------------------------------------------------------
// GithubClient
// ---------------------------------------------------------------------------

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// REST API root (`https://api.github.com` or an enterprise `/api/v3` root).
    pub api_base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for RemoteOptions {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// GitHub REST v3 client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_base_url: Url,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    #[serde(default = "default_encoding")]
    encoding: String,
}

fn default_encoding() -> String {
    "base64".into()
}

impl GithubClient {
    /// Create a client that sends `token` with every request.
    pub fn new(opts: &RemoteOptions, token: &str) -> Result<Self> {
        if opts.api_base_url.cannot_be_a_base() {
            return Err(GitCorpusError::config(format!(
                "API base URL cannot carry a path: {}",
                opts.api_base_url
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GitCorpusError::config("bearer token contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(opts.timeout)
            .build()
            .map_err(|e| GitCorpusError::remote(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: opts.api_base_url.clone(),
        })
    }

    /// `{api}/repos/{owner}/{repo}/git/{kind}/{id}`, with each segment percent-encoded.
    fn git_object_url(
        &self,
        coords: &RepositoryCoordinates,
        kind: &str,
        id: &str,
    ) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GitCorpusError::config(format!(
                    "API base URL cannot carry a path: {}",
                    self.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend([
                "repos",
                coords.namespace.as_str(),
                coords.repository.as_str(),
                "git",
                kind,
                id,
            ]);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| GitCorpusError::remote(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GitCorpusError::remote_status(
                format!("{url}: HTTP {status}{}", status_hint(status)),
                status.as_u16(),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GitCorpusError::remote(format!("{url}: invalid response body: {e}")))
    }
}

#[async_trait]
impl GitHost for GithubClient {
    async fn tree(&self, coords: &RepositoryCoordinates) -> Result<Vec<TreeEntry>> {
        let mut url = self.git_object_url(coords, "trees", &coords.reference)?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let response: TreeResponse = self.get_json(url).await?;
        if response.truncated {
            warn!(
                %coords,
                entries = response.tree.len(),
                "tree listing was truncated by the server; some files will be missing"
            );
        }
        Ok(response.tree)
    }

    async fn blob(&self, coords: &RepositoryCoordinates, sha: &str) -> Result<Blob> {
        let url = self.git_object_url(coords, "blobs", sha)?;
        let response: BlobResponse = self.get_json(url).await?;
        let content = decode_content(&response.content, &response.encoding)
            .map_err(|e| GitCorpusError::Decode(format!("blob {sha}: {e}")))?;

        Ok(Blob {
            sha: sha.to_string(),
            content,
        })
    }

    fn blob_url(&self, coords: &RepositoryCoordinates, sha: &str) -> String {
        match self.git_object_url(coords, "blobs", sha) {
            Ok(url) => url.into(),
            Err(e) => {
                warn!(sha, error = %e, "no API URL for blob");
                String::new()
            }
        }
    }
}

/// Human hint appended to error messages for the statuses users hit most.
fn status_hint(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => " (token rejected)",
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            " (forbidden or rate limited)"
        }
        StatusCode::NOT_FOUND => " (repository or reference not found)",
        _ => "",
    }
}

/// Decode a blob payload. The API wraps base64 at 60 columns.
fn decode_content(content: &str, encoding: &str) -> std::result::Result<Vec<u8>, String> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD.decode(compact).map_err(|e| e.to_string())
        }
        "utf-8" | "utf8" => Ok(content.as_bytes().to_vec()),
        other => Err(format!("unsupported encoding '{other}'")),
    }
}
