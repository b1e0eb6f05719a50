//! Classification metrics: accuracy, ROC curves and AUC, confusion matrices
//! and summaries across resamples.

use std::collections::BTreeMap;
use std::fmt;

use itertools_num::linspace;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::data_handling::Sex;
use crate::error::{FlipperError, Result};

/// Positive-class probability paired with whether the row truly is positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPrediction {
    pub probability: f64,
    pub truth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    RocAuc,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Accuracy => f.write_str("accuracy"),
            Metric::RocAuc => f.write_str("roc_auc"),
        }
    }
}

/// Metrics of one model on one assessment set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub model: String,
    /// Bootstrap id, or `None` for the held-out test set.
    pub resample: Option<usize>,
    pub n: usize,
    pub accuracy: f64,
    pub roc_auc: f64,
    #[serde(skip)]
    pub predictions: Option<Vec<ScoredPrediction>>,
}

impl MetricResult {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::RocAuc => self.roc_auc,
        }
    }

    /// ROC curve of the stored predictions, if they were kept.
    pub fn roc_curve(&self) -> Option<RocCurve> {
        self.predictions
            .as_ref()
            .and_then(|p| RocCurve::new(p.clone()).ok())
    }
}

/// Fraction of predictions matching the truth.
pub fn accuracy(truth: &[Sex], predicted: &[Sex]) -> Result<f64> {
    if truth.len() != predicted.len() {
        return Err(FlipperError::UndefinedMetric {
            reason: format!("{} truths but {} predictions", truth.len(), predicted.len()),
        });
    }
    if truth.is_empty() {
        return Err(FlipperError::UndefinedMetric {
            reason: "accuracy of an empty set".to_string(),
        });
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Area under the ROC curve by the trapezoidal rule over every threshold.
pub fn roc_auc(scores: &[ScoredPrediction]) -> Result<f64> {
    Ok(RocCurve::new(scores.to_vec())?.auc())
}

/// Area under the ROC curve as the Mann-Whitney statistic with mid-ranks.
///
/// Equal to [`roc_auc`]; used to cross-check the curve integration.
pub fn rank_auc(scores: &[ScoredPrediction]) -> Result<f64> {
    let (n_pos, n_neg) = class_sizes(scores)?;
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.probability.total_cmp(&b.probability));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start;
        while end < sorted.len() && sorted[end].probability == sorted[start].probability {
            end += 1;
        }
        // Ranks start..end (0-based) share the average 1-based rank.
        let mid_rank = (start + end + 1) as f64 / 2.0;
        let positives = sorted[start..end].iter().filter(|s| s.truth).count();
        rank_sum += mid_rank * positives as f64;
        start = end;
    }

    let n_pos_f = n_pos as f64;
    Ok((rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

fn class_sizes(scores: &[ScoredPrediction]) -> Result<(usize, usize)> {
    if let Some(bad) = scores.iter().position(|s| !s.probability.is_finite()) {
        return Err(FlipperError::UndefinedMetric {
            reason: format!(
                "ROC needs finite scores, row {} has probability {}",
                bad + 1,
                scores[bad].probability
            ),
        });
    }
    let n_pos = scores.iter().filter(|s| s.truth).count();
    let n_neg = scores.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(FlipperError::UndefinedMetric {
            reason: format!(
                "ROC needs both classes, got {} positive and {} negative rows",
                n_pos, n_neg
            ),
        });
    }
    Ok((n_pos, n_neg))
}

/// One point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    /// Rows with probability >= threshold are called positive.
    pub threshold: f64,
    /// 1 - specificity.
    pub false_positive_rate: f64,
    /// Sensitivity.
    pub true_positive_rate: f64,
}

/// Stored (probability, truth) pairs from which ROC points are generated.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    scores: Vec<ScoredPrediction>,
    n_pos: usize,
    n_neg: usize,
}

impl RocCurve {
    /// Fails with `UndefinedMetric` unless both classes are present and every
    /// probability is finite.
    pub fn new(scores: Vec<ScoredPrediction>) -> Result<Self> {
        let (n_pos, n_neg) = class_sizes(&scores)?;
        Ok(RocCurve {
            scores,
            n_pos,
            n_neg,
        })
    }

    /// A fresh iterator over the curve, from (1, 1) to (0, 0).
    ///
    /// The threshold sweeps upward through every distinct probability and
    /// ends at +inf. Each call sorts a copy of the stored pairs; nothing is
    /// cached.
    pub fn points(&self) -> RocPoints {
        let mut sorted = self.scores.clone();
        sorted.sort_by(|a, b| a.probability.total_cmp(&b.probability));
        RocPoints {
            sorted,
            cursor: 0,
            true_positives: self.n_pos,
            false_positives: self.n_neg,
            n_pos: self.n_pos as f64,
            n_neg: self.n_neg as f64,
            finished: false,
        }
    }

    /// Trapezoidal area under the curve.
    pub fn auc(&self) -> f64 {
        let mut area = 0.0;
        let mut prev: Option<RocPoint> = None;
        for point in self.points() {
            if let Some(p) = prev {
                area += (p.false_positive_rate - point.false_positive_rate)
                    * (p.true_positive_rate + point.true_positive_rate)
                    / 2.0;
            }
            prev = Some(point);
        }
        area
    }

    /// Highest sensitivity reachable at or below each false positive rate in `grid`.
    pub fn sensitivity_at(&self, grid: &[f64]) -> Vec<f64> {
        let points: Vec<RocPoint> = self.points().collect();
        grid.iter()
            .map(|&fpr| {
                points
                    .iter()
                    .filter(|p| p.false_positive_rate <= fpr + 1e-12)
                    .map(|p| p.true_positive_rate)
                    .fold(0.0, f64::max)
            })
            .collect()
    }
}

/// Lazy sequence of ROC points; see [`RocCurve::points`].
pub struct RocPoints {
    sorted: Vec<ScoredPrediction>,
    cursor: usize,
    true_positives: usize,
    false_positives: usize,
    n_pos: f64,
    n_neg: f64,
    finished: bool,
}

impl Iterator for RocPoints {
    type Item = RocPoint;

    fn next(&mut self) -> Option<RocPoint> {
        if self.finished {
            return None;
        }
        let point = |threshold| RocPoint {
            threshold,
            false_positive_rate: self.false_positives as f64 / self.n_neg,
            true_positive_rate: self.true_positives as f64 / self.n_pos,
        };

        if self.cursor >= self.sorted.len() {
            self.finished = true;
            return Some(point(f64::INFINITY));
        }

        let threshold = self.sorted[self.cursor].probability;
        let current = point(threshold);
        // Raising the threshold past this value drops every row tied at it.
        while self.cursor < self.sorted.len() && self.sorted[self.cursor].probability == threshold {
            if self.sorted[self.cursor].truth {
                self.true_positives -= 1;
            } else {
                self.false_positives -= 1;
            }
            self.cursor += 1;
        }
        Some(current)
    }
}

/// Mean sensitivity across curves on an evenly spaced false positive rate grid.
pub fn mean_roc_curve(curves: &[RocCurve], n_points: usize) -> Vec<(f64, f64)> {
    let grid: Vec<f64> = linspace(0.0, 1.0, n_points.max(2)).collect();
    if curves.is_empty() {
        return Vec::new();
    }
    let mut sums = vec![0.0; grid.len()];
    for curve in curves {
        for (sum, tpr) in sums.iter_mut().zip(curve.sensitivity_at(&grid)) {
            *sum += tpr;
        }
    }
    grid.into_iter()
        .zip(sums)
        .map(|(fpr, sum)| (fpr, sum / curves.len() as f64))
        .collect()
}

/// 2x2 table of truth against prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub positive: Sex,
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(truth: &[Sex], predicted: &[Sex], positive: Sex) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(FlipperError::UndefinedMetric {
                reason: format!("{} truths but {} predictions", truth.len(), predicted.len()),
            });
        }
        if truth.is_empty() {
            return Err(FlipperError::EmptyDataset);
        }
        let mut cm = ConfusionMatrix {
            positive,
            true_positive: 0,
            false_positive: 0,
            true_negative: 0,
            false_negative: 0,
        };
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == positive, p == positive) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        (self.true_positive + self.true_negative) as f64 / self.total() as f64
    }

    pub fn sensitivity(&self) -> Option<f64> {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> Option<f64> {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// Count for a (prediction, truth) cell.
    pub fn count(&self, predicted: Sex, truth: Sex) -> usize {
        match (predicted == self.positive, truth == self.positive) {
            (true, true) => self.true_positive,
            (true, false) => self.false_positive,
            (false, false) => self.true_negative,
            (false, true) => self.false_negative,
        }
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = [self.positive, self.positive.other()];
        writeln!(
            f,
            "{:>12} | {:>8} {:>8}",
            "Prediction",
            classes[0].as_str(),
            classes[1].as_str()
        )?;
        for predicted in classes {
            writeln!(
                f,
                "{:>12} | {:>8} {:>8}",
                predicted.as_str(),
                self.count(predicted, classes[0]),
                self.count(predicted, classes[1])
            )?;
        }
        Ok(())
    }
}

/// Aggregate of one metric of one model over resamples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub model: String,
    pub metric: Metric,
    pub mean: f64,
    /// Sample standard deviation; NaN with fewer than two values.
    pub std_dev: f64,
    pub std_err: f64,
    pub n: usize,
}

/// Summarize per-model accuracy and ROC AUC, in first-seen model order.
pub fn summarize(results: &[MetricResult]) -> Vec<MetricSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<&MetricResult>> = BTreeMap::new();
    for r in results {
        if !grouped.contains_key(r.model.as_str()) {
            order.push(r.model.as_str());
        }
        grouped.entry(r.model.as_str()).or_default().push(r);
    }

    let mut out = Vec::new();
    for model in order {
        let rows = &grouped[model];
        for metric in [Metric::Accuracy, Metric::RocAuc] {
            let values: Vec<f64> = rows.iter().map(|r| r.value(metric)).collect();
            let n = values.len();
            let mean = values.iter().mean();
            let std_dev = if n > 1 { values.iter().std_dev() } else { f64::NAN };
            out.push(MetricSummary {
                model: model.to_string(),
                metric,
                mean,
                std_dev,
                std_err: std_dev / (n as f64).sqrt(),
                n,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn scored(pairs: &[(f64, bool)]) -> Vec<ScoredPrediction> {
        pairs
            .iter()
            .map(|&(probability, truth)| ScoredPrediction { probability, truth })
            .collect()
    }

    #[test]
    fn perfectly_separated_auc_is_one() {
        let s = scored(&[(0.1, false), (0.2, false), (0.8, true), (0.9, true)]);
        assert!((roc_auc(&s).unwrap() - 1.0).abs() < 1e-12);
        assert!((rank_auc(&s).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_scores_auc_is_zero() {
        let s = scored(&[(0.9, false), (0.8, false), (0.2, true), (0.1, true)]);
        assert!(roc_auc(&s).unwrap().abs() < 1e-12);
    }

    #[test]
    fn ties_count_half() {
        let s = scored(&[(0.5, false), (0.5, true)]);
        assert!((roc_auc(&s).unwrap() - 0.5).abs() < 1e-12);
        assert!((rank_auc(&s).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn random_scores_auc_near_half() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let s: Vec<ScoredPrediction> = (0..20_000)
            .map(|_| ScoredPrediction {
                probability: rng.gen(),
                truth: rng.gen_bool(0.5),
            })
            .collect();
        let auc = roc_auc(&s).unwrap();
        assert!((auc - 0.5).abs() < 0.02, "auc {}", auc);
    }

    #[test]
    fn trapezoid_matches_rank_statistic() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let s: Vec<ScoredPrediction> = (0..300)
            .map(|_| {
                let truth = rng.gen_bool(0.4);
                // Coarse scores force many ties.
                let shift = if truth { 0.3 } else { 0.0 };
                let probability = ((rng.gen::<f64>() + shift) * 10.0).round() / 13.0;
                ScoredPrediction { probability, truth }
            })
            .collect();
        let a = roc_auc(&s).unwrap();
        let b = rank_auc(&s).unwrap();
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }

    #[test]
    fn single_class_auc_is_undefined() {
        let s = scored(&[(0.3, true), (0.7, true)]);
        assert!(matches!(roc_auc(&s), Err(FlipperError::UndefinedMetric { .. })));
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let s = scored(&[(0.2, false), (f64::NAN, true), (0.9, true)]);
        assert!(matches!(roc_auc(&s), Err(FlipperError::UndefinedMetric { .. })));
        assert!(matches!(rank_auc(&s), Err(FlipperError::UndefinedMetric { .. })));
        let s = scored(&[(0.2, false), (f64::INFINITY, true)]);
        assert!(RocCurve::new(s).is_err());
    }

    #[test]
    fn roc_points_run_from_corner_to_corner_and_restart() {
        let pairs = [(0.2, false), (0.4, true), (0.6, false), (0.8, true)];
        let curve = RocCurve::new(scored(&pairs)).unwrap();
        let first: Vec<RocPoint> = curve.points().collect();
        let second: Vec<RocPoint> = curve.points().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(
            (first[0].false_positive_rate, first[0].true_positive_rate),
            (1.0, 1.0)
        );
        let last = first.last().unwrap();
        assert_eq!((last.false_positive_rate, last.true_positive_rate), (0.0, 0.0));
        assert!(last.threshold.is_infinite());
        assert!(first.windows(2).all(|w| w[0].threshold < w[1].threshold));
    }

    #[test]
    fn confusion_matrix_cells_sum_to_total() {
        let truth = [Sex::Female, Sex::Female, Sex::Male, Sex::Male, Sex::Male];
        let predicted = [Sex::Female, Sex::Male, Sex::Male, Sex::Female, Sex::Male];
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted, Sex::Female).unwrap();
        assert_eq!(cm.total(), 5);
        assert_eq!(cm.true_positive, 1);
        assert_eq!(cm.false_negative, 1);
        assert_eq!(cm.false_positive, 1);
        assert_eq!(cm.true_negative, 2);
        assert!((cm.accuracy() - accuracy(&truth, &predicted).unwrap()).abs() < 1e-12);
        assert_eq!(cm.sensitivity(), Some(0.5));
        assert_eq!(cm.count(Sex::Male, Sex::Male), 2);
    }

    #[test]
    fn summarize_groups_by_model() {
        let result = |model: &str, id, accuracy, roc_auc| MetricResult {
            model: model.to_string(),
            resample: Some(id),
            n: 10,
            accuracy,
            roc_auc,
            predictions: None,
        };
        let results = vec![
            result("b", 0, 0.8, 0.9),
            result("a", 0, 0.6, 0.7),
            result("b", 1, 0.9, 0.95),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].model, "b");
        assert_eq!(summary[0].metric, Metric::Accuracy);
        assert!((summary[0].mean - 0.85).abs() < 1e-12);
        assert_eq!(summary[0].n, 2);
        assert!(summary[2].std_dev.is_nan());
    }

    #[test]
    fn mean_curve_of_perfect_classifier_is_flat_at_one() {
        let curve = RocCurve::new(scored(&[(0.1, false), (0.9, true)])).unwrap();
        let mean = mean_roc_curve(&[curve.clone(), curve], 11);
        assert_eq!(mean.len(), 11);
        assert!(mean.iter().all(|&(_, tpr)| (tpr - 1.0).abs() < 1e-12));
    }
}
