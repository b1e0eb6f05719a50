//! Data structures for penguin observations.
//!
//! This module defines `Record`, the `Column` schema enumeration and
//! `Dataset`, the ordered collection every pipeline stage consumes. Row
//! selection helpers are used by the splitter and resampler to build
//! train/test and in-bag/out-of-bag views.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlipperError, Result};

/// Columns of the penguins table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Species,
    Island,
    BillLengthMm,
    BillDepthMm,
    FlipperLengthMm,
    BodyMassG,
    Sex,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

impl Column {
    /// All columns in source file order.
    pub const ALL: [Column; 8] = [
        Column::Species,
        Column::Island,
        Column::BillLengthMm,
        Column::BillDepthMm,
        Column::FlipperLengthMm,
        Column::BodyMassG,
        Column::Sex,
        Column::Year,
    ];

    /// Header name used in the source CSV.
    pub fn header(&self) -> &'static str {
        match self {
            Column::Species => "species",
            Column::Island => "island",
            Column::BillLengthMm => "bill_length_mm",
            Column::BillDepthMm => "bill_depth_mm",
            Column::FlipperLengthMm => "flipper_length_mm",
            Column::BodyMassG => "body_mass_g",
            Column::Sex => "sex",
            Column::Year => "year",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Species | Column::Island | Column::Sex => ColumnKind::Categorical,
            _ => ColumnKind::Numeric,
        }
    }

    /// Whether the loader rejects a file without this column.
    pub fn is_required(&self) -> bool {
        !matches!(self, Column::Island | Column::Year)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.header().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown column: {}", s))
    }
}

/// Target label. Ordering follows the alphabetical factor levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn other(&self) -> Sex {
        match self {
            Sex::Female => Sex::Male,
            Sex::Male => Sex::Female,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "female" | "f" => Ok(Sex::Female),
            "male" | "m" => Ok(Sex::Male),
            _ => Err(format!("Unknown sex: {}", s)),
        }
    }
}

/// A single column value borrowed from a `Record`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Numeric(Option<f64>),
    Categorical(Option<&'a str>),
}

/// One penguin observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub species: String,
    pub island: Option<String>,
    pub bill_length_mm: Option<f64>,
    pub bill_depth_mm: Option<f64>,
    pub flipper_length_mm: Option<f64>,
    pub body_mass_g: Option<f64>,
    pub sex: Option<Sex>,
    pub year: Option<i32>,
}

impl Record {
    pub fn value(&self, column: Column) -> Value<'_> {
        match column {
            Column::Species => Value::Categorical(Some(self.species.as_str())),
            Column::Island => Value::Categorical(self.island.as_deref()),
            Column::BillLengthMm => Value::Numeric(self.bill_length_mm),
            Column::BillDepthMm => Value::Numeric(self.bill_depth_mm),
            Column::FlipperLengthMm => Value::Numeric(self.flipper_length_mm),
            Column::BodyMassG => Value::Numeric(self.body_mass_g),
            Column::Sex => Value::Categorical(self.sex.map(|s| s.as_str())),
            Column::Year => Value::Numeric(self.year.map(f64::from)),
        }
    }

    /// Stratum key for a categorical column; `None` when the value is missing.
    pub fn category(&self, column: Column) -> Option<String> {
        match self.value(column) {
            Value::Categorical(v) => v.map(str::to_string),
            Value::Numeric(v) => v.map(|x| x.to_string()),
        }
    }
}

/// Ordered records plus the schema they are viewed through.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, records: Vec<Record>) -> Self {
        Dataset { columns, records }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn require_column(&self, column: Column) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(FlipperError::SchemaMismatch {
                expected: column,
                found: self.columns.clone(),
            })
        }
    }

    /// Columns other than `target`, in schema order.
    pub fn feature_columns(&self, target: Column) -> Vec<Column> {
        self.columns.iter().copied().filter(|&c| c != target).collect()
    }

    /// Build a new dataset from the given row indices. Indices may repeat.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Same records viewed without `column`.
    pub fn without_column(&self, column: Column) -> Dataset {
        Dataset {
            columns: self.columns.iter().copied().filter(|&c| c != column).collect(),
            records: self.records.clone(),
        }
    }

    /// Target labels for every row.
    ///
    /// Fails with `MissingValue` on the first row with a null target, so it
    /// should only be called on preprocessed data.
    pub fn labels(&self) -> Result<Vec<Sex>> {
        self.require_column(Column::Sex)?;
        self.records
            .iter()
            .enumerate()
            .map(|(row, r)| {
                r.sex.ok_or(FlipperError::MissingValue {
                    row,
                    column: Column::Sex,
                })
            })
            .collect()
    }

    /// Row counts per observed target class. Rows with a null target are skipped.
    pub fn class_counts(&self) -> BTreeMap<Sex, usize> {
        let mut counts = BTreeMap::new();
        for sex in self.records.iter().filter_map(|r| r.sex) {
            *counts.entry(sex).or_insert(0) += 1;
        }
        counts
    }

    /// Numeric values of `column`, skipping missing entries.
    pub fn numeric_values(&self, column: Column) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| match r.value(column) {
                Value::Numeric(v) => v,
                Value::Categorical(_) => None,
            })
            .collect()
    }

    pub fn log_summary(&self, stage: &str) {
        let counts = self.class_counts();
        let missing = self.records.iter().filter(|r| r.sex.is_none()).count();
        log::info!(
            "{}: {} records, {} female, {} male, {} without a label, {} columns",
            stage,
            self.len(),
            counts.get(&Sex::Female).copied().unwrap_or(0),
            counts.get(&Sex::Male).copied().unwrap_or(0),
            missing,
            self.columns.len()
        );
    }
}
