//! Core pipeline orchestration and domain logic for gitcorpus.
//!
//! This crate ties together credential acquisition, repository fetching,
//! dataset merging, and persistence into the end-to-end `harvest` workflow.

pub mod credentials;
pub mod merge;
pub mod pipeline;

pub use credentials::{ChainedCredentials, CredentialProvider, EnvCredentials, StaticCredentials};
pub use merge::merge;
pub use pipeline::{
    HarvestConfig, HarvestOverrides, HarvestResult, ProgressReporter, SilentProgress, harvest,
    run_harvest,
};
