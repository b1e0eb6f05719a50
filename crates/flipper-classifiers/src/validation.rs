//! Resampled validation and the final train/test evaluation.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::config::ModelConfig;
use crate::data_handling::{Column, ColumnKind, Dataset, Sex};
use crate::error::{FlipperError, Result};
use crate::metrics::{self, ConfusionMatrix, Metric, MetricResult, MetricSummary, ScoredPrediction};
use crate::models::{fit_model, FittedModel};
use crate::resample::BootstrapSample;

/// Metrics of one fitted model on one evaluation set.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: MetricResult,
    pub confusion: ConfusionMatrix,
}

/// Score `model` on `dataset`.
///
/// `resample` tags the result with a bootstrap id. Per-row probabilities are
/// stored on the result when `keep_predictions` is set.
pub fn evaluate(
    model: &FittedModel,
    dataset: &Dataset,
    resample: Option<usize>,
    keep_predictions: bool,
) -> Result<Evaluation> {
    if dataset.is_empty() {
        return Err(FlipperError::EmptyDataset);
    }
    let positive = model.positive_class();
    let truth = dataset.labels()?;
    let probabilities = model.predict_probabilities(dataset)?;
    let predicted: Vec<Sex> = probabilities.iter().map(|&p| model.class_for(p)).collect();

    let scored: Vec<ScoredPrediction> = probabilities
        .iter()
        .zip(&truth)
        .map(|(&probability, &t)| ScoredPrediction {
            probability,
            truth: t == positive,
        })
        .collect();

    let metrics = MetricResult {
        model: model.name().to_string(),
        resample,
        n: dataset.len(),
        accuracy: metrics::accuracy(&truth, &predicted)?,
        roc_auc: metrics::roc_auc(&scored)?,
        predictions: keep_predictions.then_some(scored),
    };
    let confusion = ConfusionMatrix::from_predictions(&truth, &predicted, positive)?;
    Ok(Evaluation { metrics, confusion })
}

/// Resampled metrics of one model.
#[derive(Debug, Clone)]
pub struct ResampleResults {
    pub model: String,
    /// One entry per evaluated bootstrap, in sample id order.
    pub metrics: Vec<MetricResult>,
    pub summaries: Vec<MetricSummary>,
}

impl ResampleResults {
    pub fn summary(&self, metric: Metric) -> Option<&MetricSummary> {
        self.summaries.iter().find(|s| s.metric == metric)
    }
}

/// Output of the resampling stage.
#[derive(Debug, Clone)]
pub struct ResamplingOutcome {
    pub per_model: Vec<ResampleResults>,
    /// Ids of samples skipped as degenerate.
    pub skipped: Vec<usize>,
    pub n_samples: usize,
}

impl ResamplingOutcome {
    /// Model with the highest mean resampled ROC AUC.
    pub fn best_model(&self) -> Option<&ResampleResults> {
        self.per_model
            .iter()
            .filter_map(|r| r.summary(Metric::RocAuc).map(|s| (r, s.mean)))
            .filter(|(_, auc)| !auc.is_nan())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }
}

/// First categorical level of `eval_rows` that never occurs in `fit_rows`.
pub(crate) fn unseen_level(fit_rows: &Dataset, eval_rows: &Dataset) -> Option<(Column, String)> {
    eval_rows
        .feature_columns(Column::Sex)
        .into_iter()
        .filter(|column| column.kind() == ColumnKind::Categorical)
        .find_map(|column| {
            let seen: BTreeSet<String> = fit_rows
                .records()
                .iter()
                .filter_map(|r| r.category(column))
                .collect();
            eval_rows
                .records()
                .iter()
                .filter_map(|r| r.category(column))
                .find(|level| !seen.contains(level))
                .map(|level| (column, level))
        })
}

fn degenerate_reason(
    sample: &BootstrapSample,
    analysis: &Dataset,
    assessment: &Dataset,
) -> Option<String> {
    if analysis.class_counts().len() < 2 {
        return Some(format!("{} in-bag rows hold a single class", sample.label()));
    }
    if assessment.is_empty() {
        return Some(format!("{} has no out-of-bag rows", sample.label()));
    }
    if assessment.class_counts().len() < 2 {
        return Some(format!("{} out-of-bag rows hold a single class", sample.label()));
    }
    if let Some((column, level)) = unseen_level(analysis, assessment) {
        return Some(format!(
            "{} out-of-bag rows hold {} '{}', absent in bag",
            sample.label(),
            column,
            level
        ));
    }
    None
}

/// Fit every model on each sample's in-bag rows and score it on the out-of-bag rows.
///
/// Samples are processed in parallel. A sample is skipped for every model with
/// a warning when its in-bag rows hold one class, when its out-of-bag rows are
/// empty or hold one class, or when an out-of-bag row carries a categorical
/// level the in-bag rows lack. Each model is fit with `seed + sample id`.
///
/// # Errors
///
/// Returns [`FlipperError::DegenerateResample`] when every sample is skipped;
/// fit and metric errors of any evaluated sample are propagated.
pub fn fit_resamples(
    models: &[ModelConfig],
    train: &Dataset,
    samples: &[BootstrapSample],
    positive: Sex,
    seed: u64,
    keep_predictions: bool,
) -> Result<ResamplingOutcome> {
    let per_sample: Vec<Option<Vec<MetricResult>>> = samples
        .par_iter()
        .map(|sample| {
            let analysis = sample.analysis(train);
            let assessment = sample.assessment(train);
            if let Some(reason) = degenerate_reason(sample, &analysis, &assessment) {
                log::warn!("Skipping resample: {}", reason);
                return Ok(None);
            }
            let sample_seed = seed.wrapping_add(sample.id as u64);
            models
                .iter()
                .map(|spec| {
                    let fitted = fit_model(spec, &analysis, positive, sample_seed)?;
                    Ok(evaluate(&fitted, &assessment, Some(sample.id), keep_predictions)?.metrics)
                })
                .collect::<Result<Vec<_>>>()
                .map(Some)
        })
        .collect::<Result<Vec<_>>>()?;

    let skipped: Vec<usize> = samples
        .iter()
        .zip(&per_sample)
        .filter(|(_, r)| r.is_none())
        .map(|(s, _)| s.id)
        .collect();

    if skipped.len() == samples.len() {
        return Err(FlipperError::DegenerateResample {
            model: models
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            n_samples: samples.len(),
        });
    }

    let per_model = models
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let metrics: Vec<MetricResult> = per_sample
                .iter()
                .flatten()
                .map(|results| results[i].clone())
                .collect();
            let summaries = metrics::summarize(&metrics);
            if let Some(auc) = summaries.iter().find(|s| s.metric == Metric::RocAuc) {
                log::info!(
                    "{}: mean out-of-bag ROC AUC {:.3} (std err {:.3}) over {} resamples",
                    spec.name,
                    auc.mean,
                    auc.std_err,
                    auc.n
                );
            }
            ResampleResults {
                model: spec.name.clone(),
                metrics,
                summaries,
            }
        })
        .collect();

    if !skipped.is_empty() {
        log::warn!("{} of {} resamples skipped", skipped.len(), samples.len());
    }

    Ok(ResamplingOutcome {
        per_model,
        skipped,
        n_samples: samples.len(),
    })
}

/// Final evaluation of one model fit on the full training set.
#[derive(Debug)]
pub struct FinalEvaluation {
    pub fitted: FittedModel,
    pub evaluation: Evaluation,
}

/// Fit each model on `train` and evaluate it once on `test`.
pub fn last_fit(
    models: &[ModelConfig],
    train: &Dataset,
    test: &Dataset,
    positive: Sex,
    seed: u64,
    keep_predictions: bool,
) -> Result<Vec<FinalEvaluation>> {
    models
        .iter()
        .map(|spec| {
            let fitted = fit_model(spec, train, positive, seed)?;
            let evaluation = evaluate(&fitted, test, None, keep_predictions)?;
            log::info!(
                "{}: test accuracy {:.3}, ROC AUC {:.3} on {} records",
                spec.name,
                evaluation.metrics.accuracy,
                evaluation.metrics.roc_auc,
                test.len()
            );
            Ok(FinalEvaluation { fitted, evaluation })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;
    use crate::data_handling::Record;
    use crate::resample::bootstraps;

    fn record(i: usize) -> Record {
        let female = i % 2 == 0;
        let shift = if female { 0.0 } else { 20.0 };
        Record {
            species: "Adelie".to_string(),
            island: None,
            bill_length_mm: Some(35.0 + shift * 0.3 + (i % 5) as f64 * 0.2),
            bill_depth_mm: Some(17.0 + (i % 3) as f64 * 0.1),
            flipper_length_mm: Some(185.0 + shift + (i % 4) as f64),
            body_mass_g: Some(3400.0 + shift * 40.0 + (i % 7) as f64 * 10.0),
            sex: Some(if female { Sex::Female } else { Sex::Male }),
            year: None,
        }
    }

    fn dataset(n: usize) -> Dataset {
        Dataset::new(
            vec![
                Column::Species,
                Column::BillLengthMm,
                Column::BillDepthMm,
                Column::FlipperLengthMm,
                Column::BodyMassG,
                Column::Sex,
            ],
            (0..n).map(record).collect(),
        )
    }

    fn models() -> Vec<ModelConfig> {
        vec![
            ModelConfig::new("glm", ModelType::logistic_regression()),
            ModelConfig::new(
                "rf",
                ModelType::RandomForest {
                    n_trees: 20,
                    max_features: None,
                    max_depth: None,
                    min_samples_leaf: 1,
                },
            ),
        ]
    }

    #[test]
    fn resamples_produce_one_result_per_sample_and_model() {
        let train = dataset(60);
        let samples = bootstraps(&train, 4, 9).unwrap();
        let outcome = fit_resamples(&models(), &train, &samples, Sex::Female, 9, true).unwrap();
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.per_model.len(), 2);
        for results in &outcome.per_model {
            assert_eq!(results.metrics.len(), 4);
            let ids: Vec<Option<usize>> = results.metrics.iter().map(|m| m.resample).collect();
            assert_eq!(ids, vec![Some(0), Some(1), Some(2), Some(3)]);
            assert!(results.metrics.iter().all(|m| m.predictions.is_some()));
            assert_eq!(results.summary(Metric::Accuracy).unwrap().n, 4);
        }
        assert!(outcome.best_model().is_some());
    }

    #[test]
    fn single_class_samples_are_skipped() {
        let train = dataset(40);
        let mut samples = bootstraps(&train, 2, 1).unwrap();
        // Only female rows in bag.
        samples[0].in_bag = vec![0; train.len()];
        let outcome = fit_resamples(&models(), &train, &samples, Sex::Female, 1, false).unwrap();
        assert_eq!(outcome.skipped, vec![0]);
        assert_eq!(outcome.per_model[0].metrics.len(), 1);
    }

    #[test]
    fn samples_with_unseen_out_of_bag_levels_are_skipped() {
        let mut records: Vec<Record> = (0..40).map(record).collect();
        records.push(Record {
            species: "Chinstrap".to_string(),
            ..record(40)
        });
        let train = Dataset::new(dataset(0).columns().to_vec(), records);
        let samples = vec![
            BootstrapSample {
                id: 0,
                in_bag: (0..38).collect(),
                out_of_bag: vec![38, 39, 40],
            },
            BootstrapSample {
                id: 1,
                in_bag: (0..30).chain([40]).collect(),
                out_of_bag: (30..40).collect(),
            },
        ];
        let outcome = fit_resamples(&models(), &train, &samples, Sex::Female, 3, false).unwrap();
        assert_eq!(outcome.skipped, vec![0]);
        assert_eq!(outcome.per_model[0].metrics.len(), 1);
        assert_eq!(outcome.per_model[0].metrics[0].resample, Some(1));
    }

    #[test]
    fn unseen_level_names_the_column_and_level() {
        let fit_rows = dataset(10);
        let eval_rows = Dataset::new(
            fit_rows.columns().to_vec(),
            vec![Record {
                species: "Gentoo".to_string(),
                ..record(0)
            }],
        );
        assert_eq!(
            unseen_level(&fit_rows, &eval_rows),
            Some((Column::Species, "Gentoo".to_string()))
        );
        assert_eq!(unseen_level(&eval_rows, &eval_rows), None);
    }

    #[test]
    fn all_degenerate_samples_is_an_error() {
        let train = dataset(10);
        let samples = vec![BootstrapSample {
            id: 0,
            in_bag: (0..10).collect(),
            out_of_bag: Vec::new(),
        }];
        assert!(matches!(
            fit_resamples(&models(), &train, &samples, Sex::Female, 1, false),
            Err(FlipperError::DegenerateResample { n_samples: 1, .. })
        ));
    }

    #[test]
    fn last_fit_confusion_matrix_covers_test_set() {
        let data = dataset(80);
        let train = data.select_rows(&(0..60).collect::<Vec<_>>());
        let test = data.select_rows(&(60..80).collect::<Vec<_>>());
        let finals = last_fit(&models(), &train, &test, Sex::Female, 5, true).unwrap();
        assert_eq!(finals.len(), 2);
        for f in &finals {
            assert_eq!(f.evaluation.confusion.total(), 20);
            assert!(f.evaluation.metrics.resample.is_none());
            assert!(f.evaluation.metrics.accuracy >= 0.95);
        }
    }
}
