//! The full analysis: preprocess, split, resample, validate, final fit.

use std::fs::File;
use std::path::Path;

use crate::config::AnalysisConfig;
use crate::data_handling::{Column, Dataset};
use crate::error::{FlipperError, Result};
use crate::preprocessing::preprocess;
use crate::resample::bootstraps;
use crate::split::{stratified_split, Split};
use crate::validation::{
    fit_resamples, last_fit, unseen_level, FinalEvaluation, ResamplingOutcome,
};

/// Everything the report needs from one run.
#[derive(Debug)]
pub struct AnalysisResult {
    pub config: AnalysisConfig,
    /// Labeled records after column drops.
    pub data: Dataset,
    pub split: Split,
    pub resampling: ResamplingOutcome,
    pub finals: Vec<FinalEvaluation>,
}

impl AnalysisResult {
    pub fn training(&self) -> Dataset {
        self.split.training(&self.data)
    }

    pub fn testing(&self) -> Dataset {
        self.split.testing(&self.data)
    }
}

/// Run every stage on `raw` with the seeds and parameters of `config`.
pub fn run_analysis(config: &AnalysisConfig, raw: &Dataset) -> Result<AnalysisResult> {
    config.validate()?;
    raw.log_summary("Loaded");

    let data = preprocess(raw, &config.drop_columns)?;
    data.log_summary("Preprocessed");
    if data.is_empty() {
        return Err(FlipperError::EmptyDataset);
    }

    let split = stratified_split(&data, Column::Sex, config.train_fraction, config.seed)?;
    let train = split.training(&data);
    let test = split.testing(&data);
    if let Some((column, level)) = unseen_level(&train, &test) {
        return Err(FlipperError::DegenerateSplit {
            reason: format!("test rows hold {} '{}' unseen in training", column, level),
        });
    }

    let samples = bootstraps(&train, config.n_bootstraps, config.seed)?;
    log::info!(
        "Resampling {} model(s) over {} bootstrap samples",
        config.models.len(),
        samples.len()
    );
    let resampling = fit_resamples(
        &config.models,
        &train,
        &samples,
        config.positive_class,
        config.seed,
        config.keep_predictions,
    )?;
    if let Some(best) = resampling.best_model() {
        log::info!("Preferred model by resampled ROC AUC: {}", best.model);
    }

    let finals = last_fit(
        &config.models,
        &train,
        &test,
        config.positive_class,
        config.seed,
        config.keep_predictions,
    )?;

    Ok(AnalysisResult {
        config: config.clone(),
        data,
        split,
        resampling,
        finals,
    })
}

/// Write one CSV row per (model, resample) with accuracy and ROC AUC.
pub fn write_resample_metrics<P: AsRef<Path>>(outcome: &ResamplingOutcome, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_error = |source: std::io::Error| FlipperError::Report {
        path: path.to_path_buf(),
        source,
    };
    let csv_error = |e: csv::Error| io_error(std::io::Error::new(std::io::ErrorKind::Other, e));

    let file = File::create(path).map_err(io_error)?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(["model", "resample", "n", "accuracy", "roc_auc"])
        .map_err(csv_error)?;
    for results in &outcome.per_model {
        for m in &results.metrics {
            let resample = m
                .resample
                .map(|id| format!("Bootstrap{:02}", id + 1))
                .unwrap_or_default();
            writer
                .write_record([
                    m.model.as_str(),
                    resample.as_str(),
                    &m.n.to_string(),
                    &format!("{:.6}", m.accuracy),
                    &format!("{:.6}", m.roc_auc),
                ])
                .map_err(csv_error)?;
        }
    }
    writer.flush().map_err(io_error)?;
    log::info!("Wrote resample metrics to {}", path.display());
    Ok(())
}
