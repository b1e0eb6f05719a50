use ndarray::{Array1, Array2};

use crate::error::Result;

/// Probability at or above which a row is assigned the positive class.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// The contract shared by the linear and the tree ensemble models.
///
/// Labels use the crate convention: 1 for the positive class, 0 otherwise.
/// Implementations operate on an already encoded design matrix.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model on `x` (rows are samples) and `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    /// Probability of the positive class for every row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard class predictions at [`DECISION_THRESHOLD`].
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| usize::from(p >= DECISION_THRESHOLD)))
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
