use plotly::common::{DashType, Line, Marker, Mode};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{BoxPlot, Histogram, Plot, Scatter};

use crate::data_handling::{Dataset, Sex};
use crate::metrics::{mean_roc_curve, RocCurve};
use crate::validation::{FinalEvaluation, ResampleResults, ResamplingOutcome};

const SEXES: [Sex; 2] = [Sex::Female, Sex::Male];

fn sex_color(sex: Sex) -> &'static str {
    match sex {
        Sex::Female => "rgba(214, 39, 40, 0.7)",
        Sex::Male => "rgba(31, 119, 180, 0.7)",
    }
}

fn chance_line() -> Box<Scatter<f64, f64>> {
    Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("grey").dash(DashType::Dash))
}

fn roc_layout(title: &str) -> Layout {
    Layout::new()
        .title(title)
        .x_axis(Axis::new().title("1 - specificity").range(vec![0.0, 1.0]))
        .y_axis(Axis::new().title("Sensitivity").range(vec![0.0, 1.0]))
}

fn curve_xy(curve: &RocCurve) -> (Vec<f64>, Vec<f64>) {
    curve
        .points()
        .map(|p| (p.false_positive_rate, p.true_positive_rate))
        .unzip()
}

/// Flipper length against body mass, coloured by sex.
pub fn plot_flipper_vs_mass(data: &Dataset) -> Plot {
    let mut plot = Plot::new();
    for sex in SEXES {
        let (x, y): (Vec<f64>, Vec<f64>) = data
            .records()
            .iter()
            .filter(|r| r.sex == Some(sex))
            .filter_map(|r| Some((r.flipper_length_mm?, r.body_mass_g?)))
            .unzip();
        plot.add_trace(
            Scatter::new(x, y)
                .mode(Mode::Markers)
                .name(sex.as_str())
                .marker(Marker::new().color(sex_color(sex)).size(7)),
        );
    }
    plot.set_layout(
        Layout::new()
            .title("Flipper length and body mass by sex")
            .x_axis(Axis::new().title("Flipper length (mm)"))
            .y_axis(Axis::new().title("Body mass (g)")),
    );
    plot
}

/// Overlaid histograms of bill length per sex.
pub fn plot_bill_length_histogram(data: &Dataset) -> Plot {
    let mut plot = Plot::new();
    for sex in SEXES {
        let values: Vec<f64> = data
            .records()
            .iter()
            .filter(|r| r.sex == Some(sex))
            .filter_map(|r| r.bill_length_mm)
            .collect();
        plot.add_trace(
            Histogram::new(values)
                .name(sex.as_str())
                .opacity(0.6)
                .marker(Marker::new().color(sex_color(sex))),
        );
    }
    plot.set_layout(
        Layout::new()
            .title("Bill length by sex")
            .bar_mode(BarMode::Overlay)
            .x_axis(Axis::new().title("Bill length (mm)"))
            .y_axis(Axis::new().title("Count")),
    );
    plot
}

/// One box of out-of-bag ROC AUC values per model.
pub fn plot_resample_auc(outcome: &ResamplingOutcome) -> Plot {
    let mut plot = Plot::new();
    for results in &outcome.per_model {
        let aucs: Vec<f64> = results.metrics.iter().map(|m| m.roc_auc).collect();
        plot.add_trace(BoxPlot::<f64, f64>::new(aucs).name(&results.model));
    }
    plot.set_layout(
        Layout::new()
            .title("Out-of-bag ROC AUC across bootstrap resamples")
            .y_axis(Axis::new().title("ROC AUC")),
    );
    plot
}

/// Every resample's ROC curve for one model, with their mean.
pub fn plot_resample_roc(results: &ResampleResults) -> Plot {
    let mut plot = Plot::new();
    let mut curves = Vec::new();
    for m in &results.metrics {
        let Some(curve) = m.roc_curve() else {
            continue;
        };
        let (x, y) = curve_xy(&curve);
        let name = m
            .resample
            .map(|id| format!("Bootstrap{:02}", id + 1))
            .unwrap_or_default();
        plot.add_trace(
            Scatter::new(x, y)
                .mode(Mode::Lines)
                .name(&name)
                .show_legend(false)
                .line(Line::new().color("rgba(120, 120, 120, 0.3)").width(1.0)),
        );
        curves.push(curve);
    }
    let (x, y): (Vec<f64>, Vec<f64>) = mean_roc_curve(&curves, 101).into_iter().unzip();
    plot.add_trace(
        Scatter::new(x, y)
            .mode(Mode::Lines)
            .name("Mean")
            .line(Line::new().color("rgba(214, 39, 40, 1.0)").width(3.0)),
    );
    plot.add_trace(chance_line());
    plot.set_layout(roc_layout(&format!("{}: out-of-bag ROC curves", results.model)));
    plot
}

/// Test-set ROC curve of each finally fitted model.
pub fn plot_test_roc(finals: &[FinalEvaluation]) -> Plot {
    let mut plot = Plot::new();
    for f in finals {
        if let Some(curve) = f.evaluation.metrics.roc_curve() {
            let (x, y) = curve_xy(&curve);
            plot.add_trace(
                Scatter::new(x, y)
                    .mode(Mode::Lines)
                    .name(&format!(
                        "{} (AUC {:.3})",
                        f.fitted.name(),
                        f.evaluation.metrics.roc_auc
                    )),
            );
        }
    }
    plot.add_trace(chance_line());
    plot.set_layout(roc_layout("Test set ROC curves"));
    plot
}
