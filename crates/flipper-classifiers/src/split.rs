//! Stratified train/test splitting.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data_handling::{Column, Dataset};
use crate::error::{FlipperError, Result};

/// Disjoint train/test row indices into the dataset the split was made from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    pub fn training(&self, dataset: &Dataset) -> Dataset {
        dataset.select_rows(&self.train)
    }

    pub fn testing(&self, dataset: &Dataset) -> Dataset {
        dataset.select_rows(&self.test)
    }
}

/// Split `dataset` into train and test sets, stratified by `strata`.
///
/// Rows are grouped by their `strata` value, each group is shuffled with a
/// generator seeded from `seed` and `round(n * train_fraction)` rows (clamped
/// so both sides get at least one row) go to the training set. Both index
/// lists are returned in ascending row order.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FlipperError::InvalidConfig`] | `train_fraction` is not in (0, 1) |
/// | [`FlipperError::EmptyDataset`] | `dataset` has no rows |
/// | [`FlipperError::SchemaMismatch`] | `strata` is not in the schema |
/// | [`FlipperError::DegenerateSplit`] | a row has no stratum value, fewer than two strata exist, or a stratum has fewer than two rows |
pub fn stratified_split(
    dataset: &Dataset,
    strata: Column,
    train_fraction: f64,
    seed: u64,
) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(FlipperError::InvalidConfig {
            reason: format!("train_fraction must be in (0, 1), got {}", train_fraction),
        });
    }
    if dataset.is_empty() {
        return Err(FlipperError::EmptyDataset);
    }
    dataset.require_column(strata)?;

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, record) in dataset.records().iter().enumerate() {
        let key = record
            .category(strata)
            .ok_or_else(|| FlipperError::DegenerateSplit {
                reason: format!("row {} has no value for '{}'", row, strata),
            })?;
        groups.entry(key).or_default().push(row);
    }

    if groups.len() < 2 {
        return Err(FlipperError::DegenerateSplit {
            reason: format!(
                "'{}' has {} distinct value(s), at least 2 are required",
                strata,
                groups.len()
            ),
        });
    }
    if let Some((level, rows)) = groups.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(FlipperError::DegenerateSplit {
            reason: format!(
                "class '{}' has {} record(s), at least 2 are required",
                level,
                rows.len()
            ),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    // BTreeMap iteration order keeps the RNG stream stable across runs.
    for (level, mut rows) in groups {
        rows.shuffle(&mut rng);
        let n = rows.len();
        let n_train = ((n as f64) * train_fraction).round() as usize;
        let n_train = n_train.clamp(1, n - 1);
        log::debug!("Stratum '{}': {} train, {} test", level, n_train, n - n_train);
        train.extend_from_slice(&rows[..n_train]);
        test.extend_from_slice(&rows[n_train..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    log::info!(
        "Split {} records into {} training and {} testing records",
        dataset.len(),
        train.len(),
        test.len()
    );

    Ok(Split { train, test })
}
