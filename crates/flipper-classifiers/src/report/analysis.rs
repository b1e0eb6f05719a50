//! Assembles the analysis report from an [`AnalysisResult`].

use std::collections::{BTreeMap, BTreeSet};

use maud::{html, Markup};

use crate::data_handling::{Column, Dataset, Sex};
use crate::error::{FlipperError, Result};
use crate::metrics::{ConfusionMatrix, Metric, MetricSummary};
use crate::pipeline::AnalysisResult;
use crate::report::plots::{
    plot_bill_length_histogram, plot_flipper_vs_mass, plot_resample_auc, plot_resample_roc,
    plot_test_roc,
};
use crate::report::report::{Report, ReportSection};

const NUMERIC_COLUMNS: [Column; 4] = [
    Column::BillLengthMm,
    Column::BillDepthMm,
    Column::FlipperLengthMm,
    Column::BodyMassG,
];

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.3}", v)
    }
}

fn species_by_sex(data: &Dataset) -> Markup {
    let mut counts: BTreeMap<&str, BTreeMap<Sex, usize>> = BTreeMap::new();
    for r in data.records() {
        if let Some(sex) = r.sex {
            *counts.entry(r.species.as_str()).or_default().entry(sex).or_insert(0) += 1;
        }
    }
    html! {
        table {
            tr { th { "Species" } th { "female" } th { "male" } }
            @for (species, by_sex) in &counts {
                tr {
                    td { (species) }
                    td { (by_sex.get(&Sex::Female).copied().unwrap_or(0)) }
                    td { (by_sex.get(&Sex::Male).copied().unwrap_or(0)) }
                }
            }
        }
    }
}

fn means_by_sex(data: &Dataset) -> Markup {
    let mean_of = |column: Column, sex: Sex| {
        let subset = data.filter(|r| r.sex == Some(sex));
        let values = subset.numeric_values(column);
        if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };
    html! {
        table {
            tr {
                th { "Sex" }
                @for column in NUMERIC_COLUMNS { th { (column.header()) } }
            }
            @for sex in [Sex::Female, Sex::Male] {
                tr {
                    td { (sex.as_str()) }
                    @for column in NUMERIC_COLUMNS { td { (fmt_value(mean_of(column, sex))) } }
                }
            }
        }
    }
}

fn summary_table(summaries: &[&MetricSummary]) -> Markup {
    html! {
        table {
            tr { th { "Model" } th { "Metric" } th { "Mean" } th { "Std. dev." } th { "Std. err." } th { "n" } }
            @for s in summaries {
                tr {
                    td { (s.model) }
                    td { (s.metric.to_string()) }
                    td { (fmt_value(s.mean)) }
                    td { (fmt_value(s.std_dev)) }
                    td { (fmt_value(s.std_err)) }
                    td { (s.n) }
                }
            }
        }
    }
}

fn confusion_table(cm: &ConfusionMatrix) -> Markup {
    let classes = [cm.positive, cm.positive.other()];
    html! {
        table {
            tr { th { "Prediction \\ Truth" } @for t in classes { th { (t.as_str()) } } }
            @for p in classes {
                tr {
                    td { (p.as_str()) }
                    @for t in classes { td { (cm.count(p, t)) } }
                }
            }
        }
        p {
            "Sensitivity " (cm.sensitivity().map(fmt_value).unwrap_or_else(|| "NA".to_string()))
            ", specificity " (cm.specificity().map(fmt_value).unwrap_or_else(|| "NA".to_string()))
            ", precision " (cm.precision().map(fmt_value).unwrap_or_else(|| "NA".to_string()))
            " (positive class: " (cm.positive.as_str()) ")."
        }
    }
}

fn comparison_text(result: &AnalysisResult) -> Markup {
    let resampling = &result.resampling;
    let Some(best) = resampling.best_model() else {
        return html! { p { "No model produced a defined resampled ROC AUC." } };
    };
    let auc = best.summary(Metric::RocAuc).map(|s| s.mean).unwrap_or(f64::NAN);
    let others: Vec<String> = resampling
        .per_model
        .iter()
        .filter(|r| r.model != best.model)
        .filter_map(|r| {
            r.summary(Metric::RocAuc)
                .map(|s| format!("{} ({})", r.model, fmt_value(s.mean)))
        })
        .collect();
    html! {
        p {
            "Across " (resampling.n_samples - resampling.skipped.len()) " bootstrap resamples, "
            strong { (best.model) } " has the highest mean out-of-bag ROC AUC (" (fmt_value(auc)) ")"
            @if others.is_empty() { "." } @else { ", compared with " (others.join(", ")) "." }
            " Each model is then fit on the whole training set and scored once on the held-out test set."
        }
    }
}

/// Build the full HTML report for one analysis run.
pub fn build_report(result: &AnalysisResult, version: &str) -> Result<Report> {
    let config = &result.config;
    let train = result.training();
    let test = result.testing();

    let mut report = Report::new("flipper", version, None, "Penguin sex classification");

    let mut overview = ReportSection::new("Overview");
    overview.add_content(html! {
        p {
            "Classifiers (" (config.models.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", "))
            ") predict penguin sex from morphological measurements. Models are compared on " (config.n_bootstraps)
            " bootstrap resamples of the training set and evaluated once on a stratified test split."
        }
        p {
            (result.data.len()) " labeled records were used: " (train.len()) " for training and "
            (test.len()) " for testing. Features: "
            (result.data.feature_columns(Column::Sex).iter().map(|c| c.header()).collect::<Vec<_>>().join(", "))
            "."
        }
    });
    report.add_section(overview);

    let mut data_section = ReportSection::new("Data");
    data_section.add_content(html! {
        h3 { "Records by species and sex" }
        (species_by_sex(&result.data))
        h3 { "Mean measurements by sex" }
        (means_by_sex(&result.data))
    });
    data_section.add_plot(plot_flipper_vs_mass(&result.data));
    data_section.add_plot(plot_bill_length_histogram(&result.data));
    report.add_section(data_section);

    let mut resample_section = ReportSection::new("Resampling");
    let summaries: Vec<&MetricSummary> = result
        .resampling
        .per_model
        .iter()
        .flat_map(|r| r.summaries.iter())
        .collect();
    let skipped: BTreeSet<usize> = result.resampling.skipped.iter().copied().collect();
    let skipped_labels = skipped
        .iter()
        .map(|id| format!("Bootstrap{:02}", id + 1))
        .collect::<Vec<_>>()
        .join(", ");
    resample_section.add_content(html! {
        (summary_table(&summaries))
        @if !skipped.is_empty() {
            p {
                "Skipped resamples (degenerate in-bag or out-of-bag rows): "
                (skipped_labels)
            }
        }
    });
    resample_section.add_plot(plot_resample_auc(&result.resampling));
    if config.keep_predictions {
        for results in &result.resampling.per_model {
            resample_section.add_plot(plot_resample_roc(results));
        }
    }
    report.add_section(resample_section);

    let mut comparison = ReportSection::new("Model comparison");
    comparison.add_content(comparison_text(result));
    report.add_section(comparison);

    let mut final_section = ReportSection::new("Test set");
    final_section.add_content(html! {
        table {
            tr { th { "Model" } th { "Accuracy" } th { "ROC AUC" } th { "n" } }
            @for f in &result.finals {
                tr {
                    td { (f.fitted.name()) }
                    td { (fmt_value(f.evaluation.metrics.accuracy)) }
                    td { (fmt_value(f.evaluation.metrics.roc_auc)) }
                    td { (f.evaluation.metrics.n) }
                }
            }
        }
        h3 { "Fitted models" }
        table {
            tr { th { "Model" } th { "Type" } th { "Features" } }
            @for f in &result.finals {
                tr {
                    td { (f.fitted.name()) }
                    td { (f.fitted.spec().model_type.short_name()) }
                    td { (f.fitted.feature_names().join(", ")) }
                }
            }
        }
        @for f in &result.finals {
            h3 { (f.fitted.name()) " confusion matrix" }
            (confusion_table(&f.evaluation.confusion))
        }
    });
    if config.keep_predictions {
        final_section.add_plot(plot_test_roc(&result.finals));
    }
    report.add_section(final_section);

    let config_json = serde_json::to_string_pretty(config).map_err(|e| FlipperError::InvalidConfig {
        reason: e.to_string(),
    })?;
    let mut config_section = ReportSection::new("Configuration");
    config_section.add_content(html! {
        div class="code-container" {
            pre { code { (config_json) } }
        }
    });
    report.add_section(config_section);

    Ok(report)
}
