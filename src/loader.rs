// Record loader: column selection, renaming, type coercion and missing values

use crate::data::{RecordTable, Value};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Target type of a loaded column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    /// Parsed as a number and truncated toward zero
    Integer,
    Float,
    Date,
}

/// What to do with a row whose cell is missing or fails to coerce
#[derive(Debug, Clone, PartialEq)]
pub enum MissingPolicy {
    Drop,
    Fill(Value),
}

/// One required column of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Name in the loaded table
    pub name: String,
    /// Name in the source data
    pub source: String,
    pub ty: ColumnType,
    pub missing: MissingPolicy,
}

impl ColumnSpec {
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            source: name.to_string(),
            ty,
            missing: MissingPolicy::Drop,
        }
    }

    /// Read the column from a differently named source column
    pub fn from_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn fill(mut self, value: impl Into<Value>) -> Self {
        self.missing = MissingPolicy::Fill(value.into());
        self
    }
}

/// The fixed column schema a pipeline expects from its input
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Project a raw table onto this schema.
    ///
    /// Fails if any source column is absent; no partial table is returned.
    pub fn apply(&self, raw: &RecordTable) -> Result<RecordTable> {
        let missing: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !raw.has_column(&c.source))
            .map(|c| c.source.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Schema(format!(
                "required column(s) not found: {}",
                missing.join(", ")
            )));
        }

        let indices = self
            .columns
            .iter()
            .map(|c| raw.column_index(&c.source))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        let mut dropped = 0usize;

        'rows: for raw_row in &raw.rows {
            let mut row = Vec::with_capacity(self.columns.len());
            for (spec, &idx) in self.columns.iter().zip(&indices) {
                let value = match coerce(&raw_row[idx], spec.ty) {
                    Value::Missing => match &spec.missing {
                        MissingPolicy::Drop => {
                            dropped += 1;
                            continue 'rows;
                        }
                        MissingPolicy::Fill(v) => v.clone(),
                    },
                    v => v,
                };
                row.push(value);
            }
            rows.push(row);
        }

        if dropped > 0 {
            log::debug!("dropped {} of {} rows with missing values", dropped, raw.len());
        }

        RecordTable::new(self.names().iter().map(|s| s.to_string()).collect(), rows)
    }
}

/// Input encoding of a data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// Guess from a file extension; anything that is not `.json` is read as CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Csv,
        }
    }
}

/// Read and clean a table from any reader
pub fn load_reader<R: Read>(reader: R, format: SourceFormat, schema: &Schema) -> Result<RecordTable> {
    let raw = match format {
        SourceFormat::Csv => RecordTable::from_csv_reader(reader)?,
        SourceFormat::Json => {
            let value: serde_json::Value = serde_json::from_reader(reader)?;
            RecordTable::from_json(&value)?
        }
    };
    let table = schema.apply(&raw)?;
    log::info!("loaded {} rows ({} raw)", table.len(), raw.len());
    Ok(table)
}

/// Read and clean a table from a file path; `-` reads stdin
pub fn load_path(path: &Path, format: Option<SourceFormat>, schema: &Schema) -> Result<RecordTable> {
    let format = format.unwrap_or_else(|| SourceFormat::from_path(path));
    if path == Path::new("-") {
        let stdin = io::stdin();
        return load_reader(stdin.lock(), format, schema);
    }
    let file = File::open(path)?;
    load_reader(BufReader::new(file), format, schema)
}

fn coerce(value: &Value, ty: ColumnType) -> Value {
    match (value, ty) {
        (Value::Missing, _) => Value::Missing,
        (Value::Text(s), ColumnType::Text) => Value::Text(s.clone()),
        (other, ColumnType::Text) => Value::Text(other.to_string()),
        (v, ColumnType::Integer) => match number_of(v) {
            Some(n) => Value::Number(n.trunc()),
            None => Value::Missing,
        },
        (v, ColumnType::Float) => number_of(v).map(Value::Number).unwrap_or(Value::Missing),
        (Value::Date(d), ColumnType::Date) => Value::Date(*d),
        (Value::Text(s), ColumnType::Date) => parse_date(s).map(Value::Date).unwrap_or(Value::Missing),
        (_, ColumnType::Date) => Value::Missing,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if n.is_finite() => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}
