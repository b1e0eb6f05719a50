use flipper_classifiers::config::{AnalysisConfig, ModelConfig, ModelType};
use flipper_classifiers::data_handling::{Column, Dataset, Record, Sex};
use flipper_classifiers::pipeline::{run_analysis, write_resample_metrics};
use flipper_classifiers::report::build_report;
use flipper_classifiers::FlipperError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SPECIES: [(&str, &str); 3] = [
    ("Adelie", "Torgersen"),
    ("Chinstrap", "Dream"),
    ("Gentoo", "Biscoe"),
];

/// Penguins whose sex is cleanly separated by size, plus a few unlabeled rows.
fn separable_penguins(n: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n + 5);
    for i in 0..n {
        let (species, island) = SPECIES[i % 3];
        let male = i % 2 == 1;
        let size = if male { 1.0 } else { 0.0 };
        records.push(Record {
            species: species.to_string(),
            island: Some(island.to_string()),
            bill_length_mm: Some(38.0 + 10.0 * size + rng.gen_range(0.0..3.0)),
            bill_depth_mm: Some(16.0 + 3.0 * size + rng.gen_range(0.0..1.0)),
            flipper_length_mm: Some(185.0 + 20.0 * size + rng.gen_range(0.0..8.0)),
            body_mass_g: Some(3400.0 + 1500.0 * size + rng.gen_range(0.0..400.0)),
            sex: Some(if male { Sex::Male } else { Sex::Female }),
            year: Some(2007 + (i % 3) as i32),
        });
    }
    for i in 0..5 {
        records.push(Record {
            species: SPECIES[i % 3].0.to_string(),
            island: None,
            bill_length_mm: None,
            bill_depth_mm: None,
            flipper_length_mm: None,
            body_mass_g: None,
            sex: None,
            year: Some(2009),
        });
    }
    Dataset::new(Column::ALL.to_vec(), records)
}

fn fast_config() -> AnalysisConfig {
    AnalysisConfig {
        n_bootstraps: 5,
        models: vec![
            ModelConfig::new("Logistic regression", ModelType::logistic_regression()),
            ModelConfig::new(
                "Random forest",
                ModelType::RandomForest {
                    n_trees: 50,
                    max_features: None,
                    max_depth: None,
                    min_samples_leaf: 1,
                },
            ),
        ],
        ..AnalysisConfig::default()
    }
}

#[test]
fn separable_data_is_classified_by_both_models() {
    let _ = env_logger::builder().is_test(true).try_init();
    let raw = separable_penguins(160, 3);
    let result = run_analysis(&fast_config(), &raw).unwrap();

    assert_eq!(result.data.len(), 160);
    assert!(!result.data.has_column(Column::Year));
    assert!(!result.data.has_column(Column::Island));
    assert_eq!(result.split.train.len() + result.split.test.len(), 160);
    assert_eq!(result.split.train.len(), 120);

    assert_eq!(result.finals.len(), 2);
    for f in &result.finals {
        let m = &f.evaluation.metrics;
        assert!(m.accuracy >= 0.95, "{} accuracy {}", m.model, m.accuracy);
        assert!(m.roc_auc >= 0.95, "{} auc {}", m.model, m.roc_auc);
        assert_eq!(f.evaluation.confusion.total(), result.split.test.len());
    }

    for per_model in &result.resampling.per_model {
        assert_eq!(per_model.metrics.len() + result.resampling.skipped.len(), 5);
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let raw = separable_penguins(90, 11);
    let config = AnalysisConfig {
        seed: 2024,
        ..fast_config()
    };
    let a = run_analysis(&config, &raw).unwrap();
    let b = run_analysis(&config, &raw).unwrap();
    assert_eq!(a.split, b.split);
    for (x, y) in a.resampling.per_model.iter().zip(&b.resampling.per_model) {
        assert_eq!(x.metrics, y.metrics);
    }
}

#[test]
fn single_class_target_fails_the_split() {
    let raw = separable_penguins(40, 1);
    let females = raw.filter(|r| r.sex != Some(Sex::Male));
    assert!(matches!(
        run_analysis(&fast_config(), &females),
        Err(FlipperError::DegenerateSplit { .. })
    ));
}

#[test]
fn unlabeled_only_data_is_empty() {
    let raw = separable_penguins(30, 1).filter(|r| r.sex.is_none());
    assert!(matches!(
        run_analysis(&fast_config(), &raw),
        Err(FlipperError::EmptyDataset)
    ));
}

#[test]
fn report_and_metrics_are_written() {
    let raw = separable_penguins(90, 5);
    let result = run_analysis(&fast_config(), &raw).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let report_path = dir.path().join("report.html");
    let report = build_report(&result, "test").unwrap();
    report.save_to_file(&report_path).unwrap();
    let html = std::fs::read_to_string(&report_path).unwrap();
    assert!(html.contains("Penguin sex classification"));
    assert!(html.contains("Random forest"));
    assert!(html.contains("Test set"));
    assert!(html.contains("Fitted models"));
    for f in &result.finals {
        assert!(html.contains(f.fitted.spec().model_type.short_name()));
        assert!(html.contains(&f.fitted.feature_names().join(", ")));
    }
    let features = result.finals[0].fitted.feature_names();
    assert!(features.contains(&"species_Gentoo".to_string()), "{:?}", features);
    assert!(!features.iter().any(|name| name.starts_with("island")));

    let metrics_path = dir.path().join("metrics.csv");
    write_resample_metrics(&result.resampling, &metrics_path).unwrap();
    let mut reader = csv::Reader::from_path(&metrics_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["model", "resample", "n", "accuracy", "roc_auc"]
    );
    let rows = reader.records().count();
    let expected: usize = result.resampling.per_model.iter().map(|r| r.metrics.len()).sum();
    assert_eq!(rows, expected);
}
