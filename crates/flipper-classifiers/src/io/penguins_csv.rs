//! Palmer penguins CSV/TSV reader.
use std::path::Path;

use csv::StringRecord;

use crate::data_handling::{Column, Dataset, Record, Sex};
use crate::error::{FlipperError, Result};

/// Configuration for reading penguin tables.
#[derive(Debug, Clone)]
pub struct PenguinReaderConfig {
    /// Field delimiter. `None` picks tab for `.tsv` files and comma otherwise.
    pub delimiter: Option<u8>,
    /// Tokens treated as missing values (compared case-insensitively).
    pub na_values: Vec<String>,
}

impl Default for PenguinReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            na_values: vec!["NA".to_string(), "".to_string(), ".".to_string()],
        }
    }
}

/// Read a penguins table with default settings.
pub fn read_penguins<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_penguins_with_config(path, &PenguinReaderConfig::default())
}

/// Read a penguins table into a `Dataset`.
///
/// The schema of the returned dataset lists every known column found in the
/// header, in source file order. No validation beyond column presence and
/// value parsing is performed.
pub fn read_penguins_with_config<P: AsRef<Path>>(
    path: P,
    config: &PenguinReaderConfig,
) -> Result<Dataset> {
    let path = path.as_ref();
    let delimiter = config.delimiter.unwrap_or_else(|| delimiter_for(path));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| FlipperError::DataUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    let headers = reader
        .headers()
        .map_err(|source| FlipperError::DataUnavailable {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let mut layout: Vec<(Column, usize)> = Vec::new();
    for column in Column::ALL {
        match find_column(&headers, column.header()) {
            Some(idx) => layout.push((column, idx)),
            None if column.is_required() => {
                return Err(FlipperError::MissingColumn {
                    column: column.header().to_string(),
                })
            }
            None => log::debug!("Optional column '{}' not present", column),
        }
    }
    layout.sort_by_key(|&(_, idx)| idx);

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let fields = result.map_err(|e| FlipperError::MalformedRecord {
            row,
            reason: e.to_string(),
        })?;
        records.push(parse_record(&fields, &layout, &config.na_values, row)?);
    }

    let columns: Vec<Column> = layout.iter().map(|&(c, _)| c).collect();
    log::info!(
        "Loaded {} records with columns {:?} from {}",
        records.len(),
        columns,
        path.display()
    );

    Ok(Dataset::new(columns, records))
}

fn delimiter_for(path: &Path) -> u8 {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn parse_record(
    fields: &StringRecord,
    layout: &[(Column, usize)],
    na_values: &[String],
    row: usize,
) -> Result<Record> {
    let mut record = Record {
        species: String::new(),
        island: None,
        bill_length_mm: None,
        bill_depth_mm: None,
        flipper_length_mm: None,
        body_mass_g: None,
        sex: None,
        year: None,
    };

    for &(column, idx) in layout {
        let raw = fields.get(idx).ok_or_else(|| FlipperError::MalformedRecord {
            row,
            reason: format!("missing field for '{}'", column),
        })?;
        let value = if na_values.iter().any(|na| na.eq_ignore_ascii_case(raw)) {
            None
        } else {
            Some(raw)
        };

        match column {
            Column::Species => {
                record.species = value
                    .ok_or_else(|| FlipperError::MalformedRecord {
                        row,
                        reason: "species is missing".to_string(),
                    })?
                    .to_string();
            }
            Column::Island => record.island = value.map(str::to_string),
            Column::BillLengthMm => record.bill_length_mm = parse_number(value, column, row)?,
            Column::BillDepthMm => record.bill_depth_mm = parse_number(value, column, row)?,
            Column::FlipperLengthMm => {
                record.flipper_length_mm = parse_number(value, column, row)?
            }
            Column::BodyMassG => record.body_mass_g = parse_number(value, column, row)?,
            Column::Sex => {
                record.sex = value
                    .map(|v| v.parse::<Sex>())
                    .transpose()
                    .map_err(|reason| FlipperError::MalformedRecord { row, reason })?;
            }
            Column::Year => record.year = parse_year(value, row)?,
        }
    }

    Ok(record)
}

fn parse_number(value: Option<&str>, column: Column, row: usize) -> Result<Option<f64>> {
    value
        .map(|v| {
            v.parse::<f64>()
                .map_err(|e| FlipperError::MalformedRecord {
                    row,
                    reason: format!("invalid {} '{}': {}", column, v, e),
                })
        })
        .transpose()
}

fn parse_year(value: Option<&str>, row: usize) -> Result<Option<i32>> {
    value
        .map(|v| {
            v.parse::<i32>().map_err(|e| FlipperError::MalformedRecord {
                row,
                reason: format!("invalid {} '{}': {}", Column::Year, v, e),
            })
        })
        .transpose()
}
