//! Shared types, error model, and configuration for gitcorpus.
//!
//! This crate is the foundation depended on by all other gitcorpus crates.
//! It provides:
//! - [`GitCorpusError`], the unified error type
//! - Domain types ([`RepositoryCoordinates`], [`FileRecord`], [`Dataset`], [`RefreshMode`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OutputConfig, PatternList, RemoteConfig, RepositoryConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GitCorpusError, Result};
pub use types::{
    Dataset, EntryKind, FileRecord, RefreshMode, RepositoryCoordinates, TreeEntry,
};
