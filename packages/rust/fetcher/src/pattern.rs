//! Path filtering against a set of regular expressions.

use regex::Regex;

use gitcorpus_shared::{GitCorpusError, Result};

/// One or more compiled path patterns with "any of" semantics.
///
/// A single pattern is stored as a one-element set, so callers never branch
/// on how the patterns were written in the config.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every pattern, failing on the first invalid one.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|source| GitCorpusError::MalformedPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(GitCorpusError::config("at least one path pattern is required"));
        }

        Ok(Self { patterns })
    }

    /// Compile a single pattern.
    pub fn single(pattern: &str) -> Result<Self> {
        Self::new([pattern])
    }

    /// Source text of each pattern, for log output.
    pub fn as_strs(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }

    pub fn is_match(&self, path: &str) -> bool {
        matches(path, self)
    }
}

/// True iff `path` is non-empty and at least one pattern finds a match in it.
pub fn matches(path: &str, patterns: &PatternSet) -> bool {
    !path.is_empty() && patterns.patterns.iter().any(|p| p.is_match(path))
}
