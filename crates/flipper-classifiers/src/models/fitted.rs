use std::collections::BTreeSet;

use ndarray::Array1;

use crate::config::ModelConfig;
use crate::data_handling::{Column, Dataset, Record, Sex};
use crate::error::{FlipperError, Result};
use crate::models::classifier_trait::{ClassifierModel, DECISION_THRESHOLD};
use crate::models::factory::build_model;
use crate::preprocessing::FeatureEncoder;

/// Class and positive-class probability for one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class: Sex,
    pub probability: f64,
}

/// A model specification bound to parameters learned from one dataset.
pub struct FittedModel {
    spec: ModelConfig,
    positive: Sex,
    schema: Vec<Column>,
    encoder: FeatureEncoder,
    classifier: Box<dyn ClassifierModel>,
}

/// Fit `spec` on `dataset`, treating `positive` as the event class.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FlipperError::InvalidConfig`] | `spec` has out-of-range parameters |
/// | [`FlipperError::EmptyDataset`] | `dataset` has no rows |
/// | [`FlipperError::SchemaMismatch`] | the target column is missing |
/// | [`FlipperError::MissingValue`] | a target or feature value is null |
/// | [`FlipperError::ModelFit`] | a single target class, no features, or a failed fit |
pub fn fit_model(
    spec: &ModelConfig,
    dataset: &Dataset,
    positive: Sex,
    seed: u64,
) -> Result<FittedModel> {
    spec.validate()?;
    if dataset.is_empty() {
        return Err(FlipperError::EmptyDataset);
    }
    let labels = dataset.labels()?;
    let classes: BTreeSet<Sex> = labels.iter().copied().collect();
    if classes.len() < 2 {
        return Err(FlipperError::ModelFit {
            model: spec.name.clone(),
            reason: format!("training data contains a single class {:?}", classes),
        });
    }

    let encoder = FeatureEncoder::fit(dataset, Column::Sex)?;
    if encoder.n_features() == 0 {
        return Err(FlipperError::ModelFit {
            model: spec.name.clone(),
            reason: "no feature columns".to_string(),
        });
    }
    let x = encoder.transform(dataset)?;
    let y: Array1<usize> = labels.iter().map(|&s| usize::from(s == positive)).collect();

    let mut classifier = build_model(spec, seed);
    classifier.fit(&x, &y)?;

    Ok(FittedModel {
        spec: spec.clone(),
        positive,
        schema: dataset.columns().to_vec(),
        encoder,
        classifier,
    })
}

impl FittedModel {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ModelConfig {
        &self.spec
    }

    pub fn positive_class(&self) -> Sex {
        self.positive
    }

    pub fn feature_names(&self) -> &[String] {
        self.encoder.feature_names()
    }

    /// Positive-class probability for every record of `dataset`.
    pub fn predict_probabilities(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        let x = self.encoder.transform(dataset)?;
        self.classifier.predict_proba(&x)
    }

    /// Class predictions for every record of `dataset`.
    pub fn predict_classes(&self, dataset: &Dataset) -> Result<Vec<Sex>> {
        Ok(self
            .predict_probabilities(dataset)?
            .iter()
            .map(|&p| self.class_for(p))
            .collect())
    }

    /// Predict a single record, read through the schema the model was fit on.
    pub fn predict_record(&self, record: &Record) -> Result<Prediction> {
        let one = Dataset::new(self.schema.clone(), vec![record.clone()]);
        let probability = self.predict_probabilities(&one)?[0];
        Ok(Prediction {
            class: self.class_for(probability),
            probability,
        })
    }

    /// Class assigned to a positive-class probability.
    pub fn class_for(&self, probability: f64) -> Sex {
        if probability >= DECISION_THRESHOLD {
            self.positive
        } else {
            self.positive.other()
        }
    }
}

impl std::fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedModel")
            .field("spec", &self.spec)
            .field("positive", &self.positive)
            .field("features", &self.encoder.feature_names())
            .finish()
    }
}
