//! Bearer token acquisition.
//!
//! The pipeline receives a [`CredentialProvider`] instead of reaching into the
//! environment itself. Interactive prompting lives in the CLI, which chains a
//! prompt behind [`EnvCredentials`].

use gitcorpus_shared::{GitCorpusError, Result};

/// Source of the bearer token sent to the hosting service.
pub trait CredentialProvider: Send + Sync {
    /// Short description used in error messages ("env var GITHUB_TOKEN").
    fn describe(&self) -> String;

    /// Return a non-empty token, or `Ok(None)` if this source has none.
    fn try_token(&self) -> Result<Option<String>>;

    /// Return a token or fail with [`GitCorpusError::MissingCredential`].
    fn bearer_token(&self) -> Result<String> {
        match self.try_token()? {
            Some(token) => Ok(token),
            None => Err(GitCorpusError::missing_credential(format!(
                "no token available from {}",
                self.describe()
            ))),
        }
    }
}

/// Reads the token from a named environment variable. Blank values count as absent.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentials {
    fn describe(&self) -> String {
        format!("env var {}", self.var)
    }

    fn try_token(&self) -> Result<Option<String>> {
        Ok(std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

/// A fixed token (from `--token`, or tests).
#[derive(Debug, Clone)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredentials {
    fn describe(&self) -> String {
        "explicit token".into()
    }

    fn try_token(&self) -> Result<Option<String>> {
        Ok(self.0.clone().filter(|t| !t.trim().is_empty()))
    }
}

/// Tries each provider in order and returns the first token found.
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl Default for ChainedCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for ChainedCredentials {
    fn describe(&self) -> String {
        let parts: Vec<_> = self.providers.iter().map(|p| p.describe()).collect();
        if parts.is_empty() {
            "no credential sources".into()
        } else {
            parts.join(" or ")
        }
    }

    fn try_token(&self) -> Result<Option<String>> {
        for provider in &self.providers {
            if let Some(token) = provider.try_token()? {
                tracing::debug!(source = %provider.describe(), "bearer token resolved");
                return Ok(Some(token));
            }
        }
        Ok(None)
    }
}
