use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::error::{FlipperError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::preprocessing::{fit_scaler, transform_all, Scaler};

/// Logistic regression on standardized features, fitted by linfa-logistic.
pub struct LogisticClassifier {
    params: ModelConfig,
    fitted: Option<Fitted>,
}

struct Fitted {
    scaler: Scaler,
    model: FittedLogisticRegression<f64, usize>,
    /// linfa reports the probability of its own positive class, which may be
    /// either of our labels.
    linfa_positive: usize,
}

impl LogisticClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LogisticClassifier {
            params,
            fitted: None,
        }
    }

    fn fit_error(&self, reason: impl Into<String>) -> FlipperError {
        FlipperError::ModelFit {
            model: self.params.name.clone(),
            reason: reason.into(),
        }
    }
}

impl ClassifierModel for LogisticClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let ModelType::LogisticRegression {
            max_iterations,
            gradient_tolerance,
            alpha,
        } = self.params.model_type
        else {
            return Err(self.fit_error(format!(
                "expected LogisticRegression params, got {:?}",
                self.params.model_type
            )));
        };

        if x.nrows() != y.len() {
            return Err(self.fit_error(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        if y.iter().all(|&label| label == y[0]) {
            return Err(self.fit_error("fitting data contains a single class"));
        }

        let scaler = fit_scaler(x)?;
        let xs = transform_all(x, &scaler)?;
        let dataset = Dataset::new(xs, y.clone());

        let model = LogisticRegression::default()
            .max_iterations(max_iterations)
            .gradient_tolerance(gradient_tolerance)
            .alpha(alpha)
            .fit(&dataset)
            .map_err(|e| self.fit_error(e.to_string()))?;

        // predict() returns linfa's positive class exactly where the
        // probability reaches 0.5. Rows on either side of the boundary agree
        // with label 1 or with label 0 depending on the orientation.
        let probs = model.predict_probabilities(dataset.records());
        let classes: Array1<usize> = model.predict(dataset.records());
        let agree = probs
            .iter()
            .zip(classes.iter())
            .filter(|&(&p, &class)| (p >= 0.5) == (class == 1))
            .count();
        let linfa_positive = usize::from(2 * agree >= probs.len());

        log::debug!(
            "Fitted {} on {} rows, intercept {:.4}, linfa positive label {}",
            self.params.name,
            x.nrows(),
            model.intercept(),
            linfa_positive
        );

        self.fitted = Some(Fitted {
            scaler,
            model,
            linfa_positive,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| self.fit_error("model has not been fitted"))?;
        let xs = transform_all(x, &fitted.scaler)?;
        let probs = fitted.model.predict_probabilities(&xs);
        if fitted.linfa_positive == 1 {
            Ok(probs)
        } else {
            Ok(probs.mapv(|p| 1.0 - p))
        }
    }

    fn name(&self) -> &str {
        &self.params.name
    }
}
