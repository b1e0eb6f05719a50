//! Random forest of bagged CART trees with per-split feature sampling.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::{ModelConfig, ModelType};
use crate::error::{FlipperError, Result};
use crate::models::cart::{Tree, TreeParams};
use crate::models::classifier_trait::ClassifierModel;

/// Random forest classifier.
///
/// Each tree is grown on a bootstrap of the fitting rows. Every split
/// considers `max_features` columns drawn afresh for that node. The
/// positive-class probability is the fraction of trees voting for label 1.
pub struct RandomForestClassifier {
    params: ModelConfig,
    seed: u64,
    n_features: Option<usize>,
    trees: Vec<Tree>,
}

/// Resolve the number of candidate features per split: floor(sqrt(p)) unless given.
pub(crate) fn resolve_max_features(max_features: Option<usize>, n_features: usize) -> usize {
    max_features
        .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
        .clamp(1, n_features.max(1))
}

impl RandomForestClassifier {
    pub fn new(params: ModelConfig, seed: u64) -> Self {
        RandomForestClassifier {
            params,
            seed,
            n_features: None,
            trees: Vec::new(),
        }
    }

    fn fit_error(&self, reason: impl Into<String>) -> FlipperError {
        FlipperError::ModelFit {
            model: self.params.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let ModelType::RandomForest {
            n_trees,
            max_features,
            max_depth,
            min_samples_leaf,
        } = self.params.model_type
        else {
            return Err(self.fit_error(format!(
                "expected RandomForest params, got {:?}",
                self.params.model_type
            )));
        };

        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(FlipperError::EmptyDataset);
        }
        if n_features == 0 {
            return Err(self.fit_error("no feature columns"));
        }
        if n_samples != y.len() {
            return Err(self.fit_error(format!(
                "{} feature rows but {} labels",
                n_samples,
                y.len()
            )));
        }
        if n_trees == 0 {
            return Err(self.fit_error("n_trees must be at least 1"));
        }
        if y.iter().any(|&label| label > 1) {
            return Err(self.fit_error("labels must be 0 or 1"));
        }

        let tree_params = TreeParams {
            max_features: resolve_max_features(max_features, n_features),
            max_depth,
            min_samples_leaf,
        };
        log::debug!(
            "Growing {} trees on {} rows, {} of {} features per split",
            n_trees,
            n_samples,
            tree_params.max_features,
            n_features
        );

        // Per-tree seeds from one master generator keep the forest
        // reproducible regardless of rayon scheduling.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..n_trees).map(|_| master_rng.gen()).collect();

        self.trees = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let rows: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                Tree::fit(x, y, &rows, &tree_params, &mut rng)
            })
            .collect();
        self.n_features = Some(n_features);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n_features = self
            .n_features
            .ok_or_else(|| self.fit_error("model has not been fitted"))?;
        if x.ncols() != n_features {
            return Err(self.fit_error(format!(
                "prediction input has {} features, expected {}",
                x.ncols(),
                n_features
            )));
        }
        if self.trees.is_empty() {
            return Err(self.fit_error("forest has no trees"));
        }

        let votes = self
            .trees
            .par_iter()
            .map(|tree| {
                x.rows()
                    .into_iter()
                    .map(|row| tree.predict_row(row) as f64)
                    .collect::<Array1<f64>>()
            })
            .reduce(|| Array1::zeros(x.nrows()), |acc, v| acc + v);

        Ok(votes / self.trees.len() as f64)
    }

    fn name(&self) -> &str {
        &self.params.name
    }
}
