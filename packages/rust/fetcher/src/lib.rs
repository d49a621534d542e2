//! Repository traversal, filtering, and blob retrieval.
//!
//! This crate provides:
//! - [`PatternSet`] and [`matches`], path filtering by regex
//! - [`sanitize`], ASCII-safe normalization of blob text
//! - [`GitHost`], the remote service boundary, and its [`GithubClient`] implementation
//! - [`RepoFetcher`], concurrent tree-then-blob fetching into a [`Dataset`]
//!
//! [`Dataset`]: gitcorpus_shared::Dataset

pub mod engine;
pub mod pattern;
pub mod progress;
pub mod remote;
pub mod sanitize;

pub use engine::{FetchOptions, FetchOutcome, FileFailure, RepoFetcher};
pub use pattern::{PatternSet, matches};
pub use progress::{FetchSummary, ProgressReporter, SilentProgress};
pub use remote::{Blob, GitHost, GithubClient, RemoteOptions};
pub use sanitize::{sanitize, sanitize_str};
