//! CLI helpers for the `report` subcommand.
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use flipper_classifiers::config::{load_config, AnalysisConfig};
use flipper_classifiers::io::read_penguins;
use flipper_classifiers::pipeline::{run_analysis, write_resample_metrics, AnalysisResult};
use flipper_classifiers::report::build_report;

/// Command line overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ReportOverrides {
    pub data_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub n_bootstraps: Option<usize>,
}

impl ReportOverrides {
    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(path) = &self.data_path {
            config.data_path = Some(path.clone());
        }
        if let Some(path) = &self.report_path {
            config.report_path = path.clone();
        }
        if let Some(path) = &self.metrics_path {
            config.metrics_path = Some(path.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.n_bootstraps {
            config.n_bootstraps = n;
        }
    }
}

/// Load `config_path` (or the defaults) and apply `overrides`.
pub fn resolve_config(
    config_path: Option<&PathBuf>,
    overrides: &ReportOverrides,
) -> Result<AnalysisConfig> {
    let mut config = match config_path {
        Some(path) => {
            log::info!("[flipper] Using config: {:?}", path);
            load_config(path)?
        }
        None => AnalysisConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load the data, run every stage and write the report and optional metrics CSV.
pub fn run_report(config: &AnalysisConfig) -> Result<AnalysisResult> {
    let data_path = config
        .data_path
        .as_ref()
        .ok_or_else(|| anyhow!("No data file given; pass --data or set data_path in the config"))?;

    let raw = read_penguins(data_path)
        .with_context(|| format!("Failed to load penguins from {}", data_path.display()))?;
    let result = run_analysis(config, &raw).context("Analysis failed")?;

    let report = build_report(&result, env!("CARGO_PKG_VERSION"))?;
    report.save_to_file(&config.report_path)?;

    if let Some(metrics_path) = &config.metrics_path {
        write_resample_metrics(&result.resampling, metrics_path)?;
    }
    Ok(result)
}
