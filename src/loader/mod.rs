//! Sales table loading.
//!
//! This module reads a sales workbook (first sheet) or a delimited export,
//! trims and renames the header, and parses each row into a
//! [`SalesRecord`]. Malformed cells become missing values; no other
//! correction is attempted.

use crate::models::{Column, SalesRecord, Table};
use calamine::{open_workbook_auto, Reader};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that prevent a table from being loaded at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read header: {0}")]
    Header(#[source] csv::Error),

    #[error("failed to read workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {} has no sheets", .0.display())]
    NoSheets(PathBuf),
}

/// File extensions read as spreadsheets rather than delimited text.
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Options for loading a sales table.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Path to the delimited file.
    pub path: PathBuf,
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Raw (trimmed) column name to canonical name.
    pub rename: BTreeMap<String, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sales_data.csv"),
            delimiter: b',',
            rename: BTreeMap::new(),
        }
    }
}

impl From<&crate::config::LoaderConfig> for LoadOptions {
    fn from(config: &crate::config::LoaderConfig) -> Self {
        Self {
            path: PathBuf::from(&config.input),
            delimiter: config.delimiter.as_bytes().first().copied().unwrap_or(b','),
            rename: config.rename.clone(),
        }
    }
}

/// Load the sales table described by `options`.
pub fn load_table(options: &LoadOptions) -> Result<Table, LoadError> {
    let path = &options.path;
    if !path.exists() {
        return Err(LoadError::NotFound(path.clone()));
    }

    info!("Loading sales data from {}", path.display());
    let table = if is_workbook(path) {
        read_workbook(path, options)?
    } else {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.clone(),
            source,
        })?;
        read_table(file, options)?
    };
    info!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.header().len(),
        display_name(path)
    );
    Ok(table)
}

/// Parse a sales table from any reader.
pub fn read_table<R: Read>(reader: R, options: &LoadOptions) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(reader);

    let raw_header = reader.headers().map_err(LoadError::Header)?.clone();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                // +2: records start after the header, lines are 1-based
                warn!("Skipping unreadable row at line {}: {}", idx + 2, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unreadable rows", skipped);
    }

    Ok(build_table(&raw_header, &records, options))
}

/// Parse the first sheet of a workbook; its first row is the header.
pub fn read_workbook(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let workbook_error = |source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::NoSheets(path.to_path_buf()))?
        .map_err(workbook_error)?;

    let mut rows = range
        .rows()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect::<Vec<String>>());
    let Some(raw_header) = rows.next() else {
        warn!("First sheet of {} is empty", display_name(path));
        return Ok(Table::from_header(Vec::new(), Vec::new()));
    };

    let raw_header = StringRecord::from(raw_header);
    let records: Vec<StringRecord> = rows.map(StringRecord::from).collect();
    Ok(build_table(&raw_header, &records, options))
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn build_table(raw_header: &StringRecord, records: &[StringRecord], options: &LoadOptions) -> Table {
    let header = normalize_column_names(raw_header, &options.rename);
    debug!("Normalized columns: {:?}", header);

    let slots: Vec<Option<Column>> = header.iter().map(|h| Column::from_name(h)).collect();
    let rows = records
        .iter()
        .map(|record| parse_record(record, &header, &slots))
        .collect();

    Table::from_header(header, rows)
}

/// Trim column names, then apply the rename map.
pub fn normalize_column_names(
    raw: &StringRecord,
    rename: &BTreeMap<String, String>,
) -> Vec<String> {
    raw.iter()
        .map(|name| {
            let trimmed = name.trim();
            rename
                .get(trimmed)
                .cloned()
                .unwrap_or_else(|| trimmed.to_string())
        })
        .collect()
}

fn parse_record(record: &StringRecord, header: &[String], slots: &[Option<Column>]) -> SalesRecord {
    let mut row = SalesRecord::default();

    for (i, raw) in record.iter().enumerate() {
        let cell = raw.trim();
        if cell.is_empty() {
            continue;
        }

        match slots.get(i).copied().flatten() {
            Some(Column::Year) => row.year = parse_year(cell),
            Some(Column::Model) => row.model = Some(cell.to_string()),
            Some(Column::Region) => row.region = Some(cell.to_string()),
            Some(Column::SalesVolume) => row.sales_volume = parse_number(cell),
            Some(Column::PriceUsd) => row.price_usd = parse_number(cell),
            Some(Column::EngineSizeL) => row.engine_size_l = parse_number(cell),
            Some(Column::MileageKm) => row.mileage_km = parse_number(cell),
            None => {
                if let Some(name) = header.get(i) {
                    row.extras.insert(name.clone(), cell.to_string());
                }
            }
        }
    }

    row
}

/// Parse a finite number; anything else is missing.
fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar year, accepting spreadsheet exports like `2021.0`.
fn parse_year(cell: &str) -> Option<i32> {
    if let Ok(year) = cell.parse::<i32>() {
        return Some(year);
    }
    let value = parse_number(cell)?;
    (value.fract() == 0.0 && value.abs() <= i32::MAX as f64).then_some(value as i32)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FIXTURE: &str = include_str!("../../fixtures/sales_sample.csv");

    fn read(text: &str, options: &LoadOptions) -> Table {
        read_table(text.as_bytes(), options).unwrap()
    }

    #[test]
    fn test_header_is_trimmed() {
        let text = " Year ,Model,  Sales_Volume\n2020,X1,100\n";
        let table = read(text, &LoadOptions::default());

        assert_eq!(table.header(), &["Year", "Model", "Sales_Volume"]);
        assert!(table.has(Column::Year));
        assert!(table.has(Column::SalesVolume));
        assert_eq!(table.rows()[0].sales_volume, Some(100.0));
    }

    #[test]
    fn test_rename_map_applies_after_trim() {
        let mut options = LoadOptions::default();
        options
            .rename
            .insert("units".to_string(), "Sales_Volume".to_string());

        let table = read("Year, units \n2021,7\n", &options);
        assert!(table.has(Column::SalesVolume));
        assert_eq!(table.rows()[0].sales_volume, Some(7.0));
    }

    #[test]
    fn test_bad_cells_become_missing() {
        let text = "Year,Price_USD,Color\n2020.0,n/a,Red\nabc,,\n2022\n";
        let table = read(text, &LoadOptions::default());

        let rows = table.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].year, Some(2020));
        assert_eq!(rows[0].price_usd, None);
        assert_eq!(rows[0].extras.get("Color").map(String::as_str), Some("Red"));
        assert_eq!(rows[1].year, None);
        assert!(rows[1].extras.is_empty());
        assert_eq!(rows[2].year, Some(2022));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let options = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let table = read("Region;Sales_Volume\nAsia;12\n", &options);
        assert_eq!(table.rows()[0].region.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_fixture_loads_every_column() {
        let table = read(FIXTURE, &LoadOptions::default());
        for column in Column::ALL {
            assert!(table.has(column), "fixture lacks {}", column);
        }
        assert!(table.len() >= 20);
    }

    #[test]
    fn test_load_table_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Year,Sales_Volume\n2020,5\n").unwrap();

        let options = LoadOptions {
            path: file.path().to_path_buf(),
            ..LoadOptions::default()
        };
        let table = load_table(&options).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_workbook_extension_detection() {
        assert!(is_workbook(Path::new("BMW sales data (2020-2024).xlsx")));
        assert!(is_workbook(Path::new("legacy.XLS")));
        assert!(!is_workbook(Path::new("sales.csv")));
        assert!(!is_workbook(Path::new("sales")));
    }

    #[test]
    fn test_load_workbook_first_sheet() {
        let options = LoadOptions {
            path: PathBuf::from(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/fixtures/sales_sample.xlsx"
            )),
            ..LoadOptions::default()
        };
        let table = load_table(&options).unwrap();

        assert_eq!(
            table.header(),
            &[
                "Model",
                "Year",
                "Region",
                "Engine_Size_L",
                "Mileage_KM",
                "Price_USD",
                "Sales_Volume"
            ]
        );
        assert_eq!(table.len(), 4);

        let rows = table.rows();
        assert_eq!(rows[0].model.as_deref(), Some("X1"));
        assert_eq!(rows[0].year, Some(2020));
        assert_eq!(rows[0].sales_volume, Some(120.0));
        assert_eq!(rows[1].price_usd, Some(98_000.0));
        assert_eq!(rows[2].year, Some(2021));
        assert_eq!(rows[2].mileage_km, None);
        assert_eq!(rows[3].year, None);
        assert_eq!(rows[3].region.as_deref(), Some("Middle East"));
    }

    #[test]
    fn test_unreadable_workbook_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"Year,Sales_Volume\n2020,5\n").unwrap();

        let options = LoadOptions {
            path: file.path().to_path_buf(),
            ..LoadOptions::default()
        };
        let err = load_table(&options).unwrap_err();
        assert!(matches!(err, LoadError::Workbook { .. }));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let options = LoadOptions {
            path: PathBuf::from("/definitely/not/here.csv"),
            ..LoadOptions::default()
        };
        let err = load_table(&options).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
    }
}
