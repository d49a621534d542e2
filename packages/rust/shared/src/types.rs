//! Core domain types for gitcorpus datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GitCorpusError;

// ---------------------------------------------------------------------------
// RepositoryCoordinates
// ---------------------------------------------------------------------------

/// Which repository snapshot a fetch operates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryCoordinates {
    /// Owning user or organization.
    pub namespace: String,
    /// Repository name.
    pub repository: String,
    /// Branch, tag, or commit sha.
    pub reference: String,
}

impl RepositoryCoordinates {
    pub fn new(
        namespace: impl Into<String>,
        repository: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            repository: repository.into(),
            reference: reference.into(),
        }
    }

    /// Canonical web URL of `path` at this snapshot, used as the dataset key.
    ///
    /// `https://github.com` + `acme/widgets@main` + `README.md` gives
    /// `https://github.com/acme/widgets/blob/main/README.md`.
    pub fn blob_web_url(&self, web_base_url: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/blob/{}/{}",
            web_base_url.trim_end_matches('/'),
            self.namespace,
            self.repository,
            self.reference,
            path
        )
    }

    /// Web URL of the tree root at this snapshot (for log output).
    pub fn tree_web_url(&self, web_base_url: &str) -> String {
        format!(
            "{}/{}/{}/tree/{}",
            web_base_url.trim_end_matches('/'),
            self.namespace,
            self.repository,
            self.reference
        )
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.namespace, self.repository, self.reference)
    }
}

// ---------------------------------------------------------------------------
// TreeEntry
// ---------------------------------------------------------------------------

/// Object kind reported by the recursive tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A file.
    Blob,
    /// A directory.
    Tree,
    /// A submodule pointer.
    Commit,
    #[serde(other)]
    Other,
}

/// One path in a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// Content-addressable blob identifier.
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// API URL of the object, when the listing provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// A fetched file as persisted in the dataset JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Blob API URL.
    pub url: String,
    /// Path within the repository.
    pub path: String,
    /// Sanitized text content (ASCII only).
    pub content: String,
    /// Reference the file was read at.
    pub branch: String,
    pub repository: String,
    pub namespace: String,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Mapping from canonical web URL to file record.
///
/// Backed by a `BTreeMap` so the serialized form is key-sorted, which keeps
/// diffs between runs stable no matter in which order blobs arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(BTreeMap<String, FileRecord>);

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the record it replaced.
    pub fn insert(&mut self, key: impl Into<String>, record: FileRecord) -> Option<FileRecord> {
        self.0.insert(key.into(), record)
    }

    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply every entry of `other` on top of this dataset; `other` wins on collision.
    pub fn overlay(&mut self, other: Dataset) {
        self.0.extend(other.0);
    }

    /// Borrowing list projection of the records, in key order.
    pub fn records(&self) -> Vec<&FileRecord> {
        self.0.values().collect()
    }

    /// Owning list projection of the records, in key order.
    pub fn into_records(self) -> Vec<FileRecord> {
        self.0.into_values().collect()
    }
}

impl FromIterator<(String, FileRecord)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (String, FileRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Dataset {
    type Item = (String, FileRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ---------------------------------------------------------------------------
// RefreshMode
// ---------------------------------------------------------------------------

/// How a run combines fresh records with the previously persisted dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Discard the prior dataset; persist only what this run fetched.
    Overwrite,
    /// Keep prior records and lay fresh records over them.
    #[default]
    Update,
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Update => f.write_str("update"),
        }
    }
}

impl FromStr for RefreshMode {
    type Err = GitCorpusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "update" => Ok(Self::Update),
            other => Err(GitCorpusError::config(format!(
                "unknown refresh mode '{other}': expected 'update' or 'overwrite'"
            ))),
        }
    }
}
