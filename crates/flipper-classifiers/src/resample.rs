//! Bootstrap resampling of a training set.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data_handling::Dataset;
use crate::error::{FlipperError, Result};

/// One bootstrap draw: in-bag rows (with repeats) and the rows never drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSample {
    pub id: usize,
    pub in_bag: Vec<usize>,
    pub out_of_bag: Vec<usize>,
}

impl BootstrapSample {
    /// Rows the model is fit on.
    pub fn analysis(&self, train: &Dataset) -> Dataset {
        train.select_rows(&self.in_bag)
    }

    /// Out-of-bag rows the fitted model is assessed on.
    pub fn assessment(&self, train: &Dataset) -> Dataset {
        train.select_rows(&self.out_of_bag)
    }

    /// Display label, 1-based like the report tables.
    pub fn label(&self) -> String {
        format!("Bootstrap{:02}", self.id + 1)
    }
}

/// Generate a bootstrap sample and the out-of-bag indices.
fn bootstrap_sample(id: usize, n_samples: usize, rng: &mut impl Rng) -> BootstrapSample {
    let mut drawn = vec![false; n_samples];
    let mut in_bag = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let idx = rng.gen_range(0..n_samples);
        in_bag.push(idx);
        drawn[idx] = true;
    }
    let out_of_bag = (0..n_samples).filter(|&i| !drawn[i]).collect();
    BootstrapSample {
        id,
        in_bag,
        out_of_bag,
    }
}

/// Draw `n_bootstraps` samples of `train`, each the size of `train`.
///
/// Samples come from one generator seeded with `seed`, drawn in id order, so a
/// fixed seed always yields the same sequence.
pub fn bootstraps(train: &Dataset, n_bootstraps: usize, seed: u64) -> Result<Vec<BootstrapSample>> {
    if n_bootstraps == 0 {
        return Err(FlipperError::InvalidConfig {
            reason: "n_bootstraps must be at least 1".to_string(),
        });
    }
    if train.is_empty() {
        return Err(FlipperError::EmptyDataset);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let samples: Vec<BootstrapSample> = (0..n_bootstraps)
        .map(|id| bootstrap_sample(id, train.len(), &mut rng))
        .collect();

    let mean_oob = samples.iter().map(|s| s.out_of_bag.len()).sum::<usize>() as f64
        / (n_bootstraps * train.len()) as f64;
    log::info!(
        "Drew {} bootstrap samples of {} records (mean out-of-bag fraction {:.3})",
        n_bootstraps,
        train.len(),
        mean_oob
    );

    Ok(samples)
}
