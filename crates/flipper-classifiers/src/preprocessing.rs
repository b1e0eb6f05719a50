//! Preprocessing shared by the pipeline and the models.
//!
//! `preprocess` removes unlabeled rows and drops columns from the schema.
//! `FeatureEncoder` turns a dataset into a numeric design matrix and `Scaler`
//! provides per-column mean/std standardization for the linear model.

use std::collections::BTreeSet;

use ndarray::Array2;

use crate::data_handling::{Column, ColumnKind, Dataset, Value};
use crate::error::{FlipperError, Result};

/// Remove records with a null target and drop `drop_columns` from the schema.
///
/// The target column itself must be present and is never dropped.
pub fn preprocess(dataset: &Dataset, drop_columns: &[Column]) -> Result<Dataset> {
    dataset.require_column(Column::Sex)?;
    if drop_columns.contains(&Column::Sex) {
        return Err(FlipperError::InvalidConfig {
            reason: "the target column 'sex' cannot be dropped".to_string(),
        });
    }

    let mut out = dataset.filter(|r| r.sex.is_some());
    log::debug!(
        "Removed {} records without a label",
        dataset.len() - out.len()
    );

    for &column in drop_columns {
        if out.has_column(column) {
            out = out.without_column(column);
        } else {
            log::debug!("Column '{}' not in schema, nothing to drop", column);
        }
    }

    Ok(out)
}

/// How one schema column maps onto design-matrix columns.
#[derive(Debug, Clone, PartialEq)]
enum Encoding {
    Numeric,
    /// Dummy coding; the first level is the baseline and gets no column.
    Dummy { levels: Vec<String> },
}

/// Numeric encoding of the feature columns of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    columns: Vec<(Column, Encoding)>,
    names: Vec<String>,
}

impl FeatureEncoder {
    /// Learn the feature layout (and categorical levels) from `dataset`.
    pub fn fit(dataset: &Dataset, target: Column) -> Result<Self> {
        dataset.require_column(target)?;
        let mut columns = Vec::new();
        let mut names = Vec::new();

        for column in dataset.feature_columns(target) {
            match column.kind() {
                ColumnKind::Numeric => {
                    names.push(column.header().to_string());
                    columns.push((column, Encoding::Numeric));
                }
                ColumnKind::Categorical => {
                    let levels: BTreeSet<String> = dataset
                        .records()
                        .iter()
                        .filter_map(|r| r.category(column))
                        .collect();
                    let levels: Vec<String> = levels.into_iter().collect();
                    for level in levels.iter().skip(1) {
                        names.push(format!("{}_{}", column.header(), level));
                    }
                    columns.push((column, Encoding::Dummy { levels }));
                }
            }
        }

        Ok(FeatureEncoder { columns, names })
    }

    /// Names of the design-matrix columns.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Encode every row of `dataset` into a `(rows, n_features)` matrix.
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        for (column, _) in &self.columns {
            dataset.require_column(*column)?;
        }

        let mut data = Vec::with_capacity(dataset.len() * self.n_features());
        for (row, record) in dataset.records().iter().enumerate() {
            for (column, encoding) in &self.columns {
                match (encoding, record.value(*column)) {
                    (Encoding::Numeric, Value::Numeric(Some(v))) => data.push(v),
                    (Encoding::Dummy { levels }, Value::Categorical(Some(level))) => {
                        let idx = levels.iter().position(|l| l == level).ok_or_else(|| {
                            FlipperError::UnknownLevel {
                                column: *column,
                                level: level.to_string(),
                            }
                        })?;
                        data.extend((1..levels.len()).map(|i| if i == idx { 1.0 } else { 0.0 }));
                    }
                    _ => {
                        return Err(FlipperError::MissingValue {
                            row,
                            column: *column,
                        })
                    }
                }
            }
        }

        Array2::from_shape_vec((dataset.len(), self.n_features()), data).map_err(|e| {
            FlipperError::InvalidConfig {
                reason: format!("feature matrix shape: {}", e),
            }
        })
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-9;
}

/// Fit a `Scaler` from a matrix where rows are samples and columns are features.
pub fn fit_scaler(x: &Array2<f64>) -> Result<Scaler> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 {
        return Err(FlipperError::EmptyDataset);
    }

    let mut mean = vec![0.0f64; ncols];
    let mut std = vec![0.0f64; ncols];
    for (c, col) in x.columns().into_iter().enumerate() {
        let m = col.sum() / nrows as f64;
        let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / nrows as f64;
        mean[c] = m;
        std[c] = var.sqrt().max(Scaler::MIN_STD);
    }

    Ok(Scaler { mean, std })
}

/// Transform all rows using the provided `Scaler` and return a new matrix.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Result<Array2<f64>> {
    if x.ncols() != sc.mean.len() {
        return Err(FlipperError::InvalidConfig {
            reason: format!(
                "scaler fitted on {} columns, got {}",
                sc.mean.len(),
                x.ncols()
            ),
        });
    }
    let mut out = x.clone();
    for (c, mut col) in out.columns_mut().into_iter().enumerate() {
        col.mapv_inplace(|v| (v - sc.mean[c]) / sc.std[c]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::{Record, Sex};
    use ndarray::array;

    fn record(species: &str, bill: Option<f64>, sex: Option<Sex>) -> Record {
        Record {
            species: species.to_string(),
            island: Some("Dream".to_string()),
            bill_length_mm: bill,
            bill_depth_mm: Some(17.0),
            flipper_length_mm: Some(200.0),
            body_mass_g: Some(4000.0),
            sex,
            year: Some(2009),
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(
            Column::ALL.to_vec(),
            vec![
                record("Adelie", Some(38.0), Some(Sex::Female)),
                record("Gentoo", Some(47.0), None),
                record("Chinstrap", Some(49.0), Some(Sex::Male)),
                record("Gentoo", Some(46.0), Some(Sex::Male)),
            ],
        )
    }

    #[test]
    fn preprocess_drops_unlabeled_rows_and_columns() {
        let out = preprocess(&dataset(), &[Column::Year, Column::Island]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.records().iter().all(|r| r.sex.is_some()));
        assert_eq!(
            out.columns(),
            &[
                Column::Species,
                Column::BillLengthMm,
                Column::BillDepthMm,
                Column::FlipperLengthMm,
                Column::BodyMassG,
                Column::Sex
            ]
        );
    }

    #[test]
    fn preprocess_refuses_to_drop_target() {
        assert!(preprocess(&dataset(), &[Column::Sex]).is_err());
    }

    #[test]
    fn encoder_dummy_codes_species() {
        let ds = preprocess(&dataset(), &[Column::Year, Column::Island]).unwrap();
        let enc = FeatureEncoder::fit(&ds, Column::Sex).unwrap();
        assert_eq!(
            enc.feature_names(),
            &[
                "species_Chinstrap".to_string(),
                "species_Gentoo".to_string(),
                "bill_length_mm".to_string(),
                "bill_depth_mm".to_string(),
                "flipper_length_mm".to_string(),
                "body_mass_g".to_string(),
            ]
        );
        let x = enc.transform(&ds).unwrap();
        assert_eq!(x.dim(), (3, 6));
        // Adelie is the baseline level.
        assert_eq!(x.row(0).to_vec()[..2].to_vec(), vec![0.0, 0.0]);
        assert_eq!(x.row(1).to_vec()[..2].to_vec(), vec![1.0, 0.0]);
        assert_eq!(x.row(2).to_vec()[..2].to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn encoder_rejects_unknown_level_and_missing_value() {
        let ds = preprocess(&dataset(), &[Column::Year, Column::Island]).unwrap();
        let enc = FeatureEncoder::fit(&ds, Column::Sex).unwrap();

        let unseen = Dataset::new(
            ds.columns().to_vec(),
            vec![record("Emperor", Some(40.0), Some(Sex::Male))],
        );
        assert!(matches!(
            enc.transform(&unseen),
            Err(FlipperError::UnknownLevel { .. })
        ));

        let missing = Dataset::new(
            ds.columns().to_vec(),
            vec![record("Adelie", None, Some(Sex::Male))],
        );
        assert!(matches!(
            enc.transform(&missing),
            Err(FlipperError::MissingValue { row: 0, column: Column::BillLengthMm })
        ));
    }

    #[test]
    fn encoder_requires_fitted_columns() {
        let ds = preprocess(&dataset(), &[Column::Year, Column::Island]).unwrap();
        let enc = FeatureEncoder::fit(&ds, Column::Sex).unwrap();
        let narrowed = ds.without_column(Column::BodyMassG);
        assert!(matches!(
            enc.transform(&narrowed),
            Err(FlipperError::SchemaMismatch { expected: Column::BodyMassG, .. })
        ));
    }

    #[test]
    fn scaler_centers_columns() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let sc = fit_scaler(&x).unwrap();
        assert!((sc.mean[0] - 2.5).abs() < 1e-12);
        assert!((sc.mean[1] - 25.0).abs() < 1e-12);

        let t = transform_all(&x, &sc).unwrap();
        for col in t.columns() {
            assert!(col.sum().abs() < 1e-9);
        }
    }

    #[test]
    fn scaler_handles_constant_column() {
        let x = array![[5.0], [5.0], [5.0]];
        let sc = fit_scaler(&x).unwrap();
        let t = transform_all(&x, &sc).unwrap();
        assert!(t.iter().all(|v| v.is_finite() && v.abs() < 1e-9));
    }
}
