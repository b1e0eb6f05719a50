use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::RandomForestClassifier;
use crate::models::logistic::LogisticClassifier;

/// Build an unfitted classifier from a `ModelConfig`.
///
/// `seed` only affects models with a random component (the forest).
pub fn build_model(params: &ModelConfig, seed: u64) -> Box<dyn ClassifierModel> {
    log::trace!(
        "Building {} model '{}' with seed {}",
        params.model_type.short_name(),
        params.name,
        seed
    );
    match params.model_type {
        ModelType::LogisticRegression { .. } => Box::new(LogisticClassifier::new(params.clone())),
        ModelType::RandomForest { .. } => {
            Box::new(RandomForestClassifier::new(params.clone(), seed))
        }
    }
}
