//! Persisted dataset file.
//!
//! The [`DatasetStore`] owns one JSON file: a top-level object mapping
//! canonical web URL to file record.
//!
//! **Access rules:**
//! - read once at the start of a run ([`DatasetStore::load`])
//! - written once at the end ([`DatasetStore::save`]), via a sibling temporary
//!   file renamed into place

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use gitcorpus_shared::{Dataset, GitCorpusError, Result};

/// Indentation used for the dataset file.
const INDENT: &[u8] = b"\t";

/// Handle on the dataset JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted dataset.
    ///
    /// Returns `Ok(None)` when no file exists yet. A file that exists but does
    /// not hold a valid dataset is an error, never an empty dataset.
    pub fn load(&self) -> Result<Option<Dataset>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no prior dataset");
                return Ok(None);
            }
            Err(e) => return Err(GitCorpusError::io(&self.path, e)),
        };

        let dataset: Dataset = serde_json::from_str(&content)
            .map_err(|e| GitCorpusError::persistence(&self.path, e.to_string()))?;

        tracing::info!(
            path = %self.path.display(),
            records = dataset.len(),
            "loaded prior dataset"
        );
        Ok(Some(dataset))
    }

    /// Write `dataset`, replacing any previous file.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| GitCorpusError::io(dir, e))?;

        let bytes = to_tab_indented_json(dataset)
            .map_err(|e| GitCorpusError::persistence(&self.path, e.to_string()))?;

        let tmp_path = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(GitCorpusError::io(&self.path, e));
        }

        tracing::info!(
            path = %self.path.display(),
            records = dataset.len(),
            bytes = bytes.len(),
            "dataset written"
        );
        Ok(())
    }

    /// `<dir>/.<file name>.tmp`
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.json".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

fn to_tab_indented_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    Ok(buf)
}
