//! Application configuration for gitcorpus.
//!
//! User config lives at `~/.gitcorpus/gitcorpus.toml` unless `--config` points
//! elsewhere. CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GitCorpusError, Result};
use crate::types::RefreshMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "gitcorpus.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".gitcorpus";

// ---------------------------------------------------------------------------
// Config structs (matching gitcorpus.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which repository to read and which paths to keep.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Where the dataset is persisted and how it is refreshed.
    #[serde(default)]
    pub output: OutputConfig,

    /// Hosting service endpoints and request limits.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// `[repository]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Owning user or organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Branch, tag, or commit to read.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Path regexes; a file is kept if any of them matches.
    #[serde(default = "default_patterns")]
    pub patterns: PatternList,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            branch: default_branch(),
            patterns: default_patterns(),
        }
    }
}

fn default_branch() -> String {
    "main".into()
}
fn default_patterns() -> PatternList {
    PatternList::Many(vec![r".*\.md$".into(), r".*\.ts$".into()])
}

/// A single pattern or a list of patterns, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    /// Uniform list view of the configured patterns.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(p) => vec![p.clone()],
            Self::Many(ps) => ps.clone(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Dataset JSON file.
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Refresh mode: "update" or "overwrite".
    #[serde(default)]
    pub mode: RefreshMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            mode: RefreshMode::default(),
        }
    }
}

fn default_output_path() -> String {
    "./output/output.json".into()
}

/// `[remote]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// REST API root.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,

    /// Web root used to build the canonical dataset keys.
    #[serde(default = "default_web_base_url")]
    pub web_base_url: Url,

    /// Name of the env var holding the bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum blob requests in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            web_base_url: default_web_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_api_base_url() -> Url {
    Url::parse("https://api.github.com").expect("static URL parses")
}
fn default_web_base_url() -> Url {
    Url::parse("https://github.com").expect("static URL parses")
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.gitcorpus/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GitCorpusError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.gitcorpus/gitcorpus.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GitCorpusError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        GitCorpusError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file at `path` (or the default location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| GitCorpusError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GitCorpusError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GitCorpusError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("output.json"));
        assert!(!toml_str.contains("owner"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.repository.branch, "main");
        assert_eq!(parsed.output.mode, RefreshMode::Update);
        assert_eq!(parsed.remote.concurrency, 8);
        assert_eq!(parsed.remote.api_base_url.as_str(), "https://api.github.com/");
    }

    #[test]
    fn single_pattern_is_accepted() {
        let toml_str = r#"
[repository]
owner = "acme"
repo = "widgets"
patterns = '\.md$'

[output]
mode = "overwrite"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.repository.owner.as_deref(), Some("acme"));
        assert_eq!(config.repository.patterns.to_vec(), vec![r"\.md$".to_string()]);
        assert_eq!(config.output.mode, RefreshMode::Overwrite);
        assert_eq!(config.output.path, "./output/output.json");
    }

    #[test]
    fn pattern_list_is_accepted() {
        let toml_str = r#"
[repository]
patterns = ['\.md$', '\.ts$']
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.repository.patterns.to_vec().len(), 2);
        assert!(config.repository.owner.is_none());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let toml_str = "[output]\nmode = \"append\"\n";
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn init_then_load_from_custom_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("gitcorpus.toml");

        let written = init_config(Some(&path)).expect("init");
        assert_eq!(written, path);

        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.remote.token_env, "GITHUB_TOKEN");
        assert_eq!(loaded.remote.timeout_secs, 30);
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[repository\nowner = ").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
