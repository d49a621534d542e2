//! Combining freshly fetched records with the persisted dataset.

use gitcorpus_shared::{Dataset, RefreshMode};

/// Merge `fresh` into `prior` according to `mode`.
///
/// - [`RefreshMode::Overwrite`]: `fresh` alone; `prior` is ignored.
/// - [`RefreshMode::Update`]: `prior` (or empty) with every `fresh` record laid
///   on top, so fresh records win on key collision and prior-only keys survive.
pub fn merge(prior: Option<Dataset>, fresh: Dataset, mode: RefreshMode) -> Dataset {
    match mode {
        RefreshMode::Overwrite => fresh,
        RefreshMode::Update => {
            let mut merged = prior.unwrap_or_default();
            merged.overlay(fresh);
            merged
        }
    }
}
