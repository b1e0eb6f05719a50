use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data_handling::{Column, Sex};
use crate::error::{FlipperError, Result};

/// A named model specification.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: String,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    LogisticRegression {
        max_iterations: u64,
        gradient_tolerance: f64,
        alpha: f64,
    },
    RandomForest {
        n_trees: usize,
        /// Candidate features drawn at each split. `None` uses floor(sqrt(p)).
        max_features: Option<usize>,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
    },
}

impl ModelType {
    pub fn logistic_regression() -> Self {
        ModelType::LogisticRegression {
            max_iterations: 100,
            gradient_tolerance: 1e-4,
            alpha: 1.0,
        }
    }

    pub fn random_forest() -> Self {
        ModelType::RandomForest {
            n_trees: 500,
            max_features: None,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression { .. } => "logistic",
            ModelType::RandomForest { .. } => "random_forest",
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::logistic_regression()
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" | "logistic_regression" | "glm" => Ok(ModelType::logistic_regression()),
            "random_forest" | "rf" | "forest" => Ok(ModelType::random_forest()),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: logistic, random_forest",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            model_type,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(FlipperError::InvalidConfig { reason });
        match &self.model_type {
            ModelType::LogisticRegression { max_iterations, alpha, .. } => {
                if *max_iterations == 0 {
                    return invalid(format!(
                        "model '{}': max_iterations must be positive",
                        self.name
                    ));
                }
                if *alpha < 0.0 {
                    return invalid(format!("model '{}': alpha must be non-negative", self.name));
                }
            }
            ModelType::RandomForest {
                n_trees,
                max_features,
                min_samples_leaf,
                ..
            } => {
                if *n_trees == 0 {
                    return invalid(format!("model '{}': n_trees must be at least 1", self.name));
                }
                if *max_features == Some(0) {
                    return invalid(format!(
                        "model '{}': max_features must be at least 1",
                        self.name
                    ));
                }
                if *min_samples_leaf == 0 {
                    return invalid(format!(
                        "model '{}': min_samples_leaf must be at least 1",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Parameters for one run of the analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_path: Option<PathBuf>,
    pub report_path: PathBuf,
    /// Optional CSV of per-resample metrics.
    pub metrics_path: Option<PathBuf>,
    /// Seed shared by the split, the resampler and the random forest.
    pub seed: u64,
    pub n_bootstraps: usize,
    pub train_fraction: f64,
    pub positive_class: Sex,
    pub drop_columns: Vec<Column>,
    /// Keep per-row predictions so ROC curves can be drawn.
    pub keep_predictions: bool,
    pub models: Vec<ModelConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            report_path: PathBuf::from("flipper_report.html"),
            metrics_path: None,
            seed: 42,
            n_bootstraps: 25,
            train_fraction: 0.75,
            positive_class: Sex::Female,
            drop_columns: vec![Column::Year, Column::Island],
            keep_predictions: true,
            models: vec![
                ModelConfig::new("Logistic regression", ModelType::logistic_regression()),
                ModelConfig::new("Random forest", ModelType::random_forest()),
            ],
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(FlipperError::InvalidConfig {
                reason: format!("train_fraction must be in (0, 1), got {}", self.train_fraction),
            });
        }
        if self.n_bootstraps == 0 {
            return Err(FlipperError::InvalidConfig {
                reason: "n_bootstraps must be at least 1".to_string(),
            });
        }
        if self.drop_columns.contains(&Column::Sex) {
            return Err(FlipperError::InvalidConfig {
                reason: "the target column 'sex' cannot be dropped".to_string(),
            });
        }
        if self.models.is_empty() {
            return Err(FlipperError::InvalidConfig {
                reason: "at least one model must be configured".to_string(),
            });
        }
        for model in &self.models {
            model.validate()?;
        }
        Ok(())
    }
}

/// Load an analysis configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<AnalysisConfig> {
    use anyhow::Context;

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: AnalysisConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn dropping_target_is_rejected() {
        let config = AnalysisConfig {
            drop_columns: vec![Column::Sex],
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(FlipperError::InvalidConfig { .. })));
    }

    #[test]
    fn fraction_bounds_are_exclusive() {
        for fraction in [0.0, 1.0, -0.5, f64::NAN] {
            let config = AnalysisConfig {
                train_fraction: fraction,
                ..AnalysisConfig::default()
            };
            assert!(config.validate().is_err(), "fraction {} accepted", fraction);
        }
    }

    #[test]
    fn model_type_parses_aliases() {
        assert_eq!(
            "glm".parse::<ModelType>().unwrap(),
            ModelType::logistic_regression()
        );
        assert_eq!(
            "Random_Forest".parse::<ModelType>().unwrap().short_name(),
            "random_forest"
        );
        assert!("svm".parse::<ModelType>().is_err());
    }

    #[test]
    fn zero_trees_rejected() {
        let config = AnalysisConfig {
            models: vec![ModelConfig::new(
                "rf",
                ModelType::RandomForest {
                    n_trees: 0,
                    max_features: None,
                    max_depth: None,
                    min_samples_leaf: 1,
                },
            )],
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
