//! Export of the characteristic table and run summaries.
//!
//! Supports CSV and JSON. File exports go through a temporary sibling file
//! that is renamed into place once fully written.

use rvar_data::{ResidualVarianceRecord, SecurityId};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default name of the output value column.
pub const DEFAULT_CHARACTERISTIC: &str = "rvar_ff3";

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// The content is written to `<path>.tmp` and renamed to `path` only after
    /// the write succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let staging = staging_path(path);

        let written = File::create(&staging)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&staging, path));

        if let Err(e) = written {
            fs::remove_file(&staging).ok();
            return Err(e.into());
        }
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn csv_to_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

/// The per-security, per-day characteristic table.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicTable {
    name: String,
    records: Vec<ResidualVarianceRecord>,
}

impl CharacteristicTable {
    /// Create a table whose value column is called `name`.
    pub fn new(name: impl Into<String>, records: Vec<ResidualVarianceRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Name of the value column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rows of the table.
    pub fn records(&self) -> &[ResidualVarianceRecord] {
        &self.records
    }

    /// Consume the table, yielding its rows.
    pub fn into_records(self) -> Vec<ResidualVarianceRecord> {
        self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct securities present in the table.
    pub fn security_count(&self) -> usize {
        let mut ids: Vec<SecurityId> = self.records.iter().map(|r| r.security_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Sort rows by `(security_id, date)`.
    pub fn sort(&mut self) {
        self.records
            .sort_by(|a, b| a.security_id.cmp(&b.security_id).then(a.date.cmp(&b.date)));
    }

    fn to_json_rows(&self) -> Vec<Value> {
        self.records
            .iter()
            .map(|r| {
                let mut row = Map::new();
                row.insert("security_id".to_string(), Value::from(r.security_id));
                row.insert("date".to_string(), Value::from(r.date.to_string()));
                row.insert(self.name.clone(), Value::from(r.residual_variance));
                Value::Object(row)
            })
            .collect()
    }
}

impl Exporter for CharacteristicTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                wtr.write_record(["security_id", "date", self.name.as_str()])?;
                for record in &self.records {
                    wtr.write_record([
                        record.security_id.to_string(),
                        record.date.format("%Y-%m-%d").to_string(),
                        record.residual_variance.to_string(),
                    ])?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(&self.to_json_rows())?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.to_json_rows())?),
        }
    }
}
