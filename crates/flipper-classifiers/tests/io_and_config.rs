use std::io::Write;

use flipper_classifiers::config::{load_config, AnalysisConfig, ModelConfig, ModelType};
use flipper_classifiers::data_handling::{Column, Sex};
use flipper_classifiers::io::read_penguins;
use flipper_classifiers::preprocessing::preprocess;
use flipper_classifiers::FlipperError;

const PENGUINS: &str = "\
\"\",\"species\",\"island\",\"bill_length_mm\",\"bill_depth_mm\",\"flipper_length_mm\",\"body_mass_g\",\"sex\",\"year\"
\"1\",\"Adelie\",\"Torgersen\",39.1,18.7,181,3750,\"male\",2007
\"2\",\"Adelie\",\"Torgersen\",39.5,17.4,186,3800,\"female\",2007
\"3\",\"Adelie\",\"Torgersen\",40.3,18,195,3250,\"female\",2007
\"4\",\"Adelie\",\"Torgersen\",NA,NA,NA,NA,NA,2007
\"5\",\"Gentoo\",\"Biscoe\",46.1,13.2,211,4500,\"female\",2007
\"6\",\"Gentoo\",\"Biscoe\",50,16.3,230,5700,\"male\",2007
";

fn write_temp(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn reads_the_published_csv_layout() {
    let file = write_temp(PENGUINS, ".csv");
    let ds = read_penguins(file.path()).unwrap();
    assert_eq!(ds.len(), 6);
    assert_eq!(ds.columns(), &Column::ALL[..]);

    let first = &ds.records()[0];
    assert_eq!(first.species, "Adelie");
    assert_eq!(first.bill_length_mm, Some(39.1));
    assert_eq!(first.sex, Some(Sex::Male));
    assert_eq!(first.year, Some(2007));

    let unlabeled = &ds.records()[3];
    assert_eq!(unlabeled.sex, None);
    assert_eq!(unlabeled.body_mass_g, None);

    let clean = preprocess(&ds, &[Column::Year, Column::Island]).unwrap();
    assert_eq!(clean.len(), 5);
    assert!(clean.records().iter().all(|r| r.sex.is_some()));
    assert_eq!(
        clean.columns(),
        &[
            Column::Species,
            Column::BillLengthMm,
            Column::BillDepthMm,
            Column::FlipperLengthMm,
            Column::BodyMassG,
            Column::Sex
        ][..]
    );
}

#[test]
fn missing_required_column_is_reported() {
    let file = write_temp("species,bill_length_mm,sex\nAdelie,39.1,male\n", ".csv");
    match read_penguins(file.path()) {
        Err(FlipperError::MissingColumn { column }) => assert_eq!(column, "bill_depth_mm"),
        other => panic!("expected MissingColumn, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn unreadable_path_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_penguins(dir.path().join("absent.csv")),
        Err(FlipperError::DataUnavailable { .. })
    ));
}

#[test]
fn config_survives_a_json_round_trip() {
    let config = AnalysisConfig {
        seed: 7,
        n_bootstraps: 10,
        positive_class: Sex::Male,
        models: vec![ModelConfig::new(
            "forest",
            ModelType::RandomForest {
                n_trees: 100,
                max_features: Some(2),
                max_depth: Some(6),
                min_samples_leaf: 2,
            },
        )],
        ..AnalysisConfig::default()
    };
    let json = serde_json::to_string_pretty(&config).unwrap();
    let file = write_temp(&json, ".json");
    assert_eq!(load_config(file.path()).unwrap(), config);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let file = write_temp(r#"{ "seed": 99, "drop_columns": ["year"] }"#, ".json");
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.seed, 99);
    assert_eq!(config.drop_columns, vec![Column::Year]);
    assert_eq!(config.n_bootstraps, 25);
    assert_eq!(config.models, AnalysisConfig::default().models);
}
