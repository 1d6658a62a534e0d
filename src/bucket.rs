//! Bucketizer: continuous values to range labels, free text to canonical labels.
//!
//! Breakpoint buckets are left-closed everywhere in the crate: bucket `i`
//! covers `[edges[i], edges[i + 1])`, so a value sitting exactly on a
//! breakpoint belongs to the bucket that starts there.

use crate::data::{RecordTable, Value};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered breakpoints with one label per interval and an optional overflow label
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoints {
    edges: Vec<f64>,
    labels: Vec<String>,
    overflow: Option<String>,
}

impl Breakpoints {
    /// `edges` holds N+1 finite, strictly increasing values and `labels` N labels.
    /// Values at or beyond the last edge take `overflow`, if given.
    pub fn new(edges: Vec<f64>, labels: Vec<String>, overflow: Option<String>) -> Result<Self> {
        if edges.len() < 2 && !(edges.len() == 1 && overflow.is_some()) {
            return Err(Error::Parse(
                "breakpoints need at least two edges, or one edge and an overflow label".to_string(),
            ));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::Parse("breakpoint edges must be finite".to_string()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Parse(format!("breakpoints must be strictly increasing: {:?}", edges)));
        }
        if labels.len() != edges.len() - 1 {
            return Err(Error::Parse(format!(
                "{} edges need {} labels, got {}",
                edges.len(),
                edges.len() - 1,
                labels.len()
            )));
        }
        Ok(Self { edges, labels, overflow })
    }

    /// The floor-range scheme: `1-10` .. `41-50` and `51+`
    pub fn floor_ranges() -> Self {
        Self {
            edges: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
            labels: ["1-10", "11-20", "21-30", "31-40", "41-50"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            overflow: Some("51+".to_string()),
        }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Every label this definition can produce, in bucket order
    pub fn all_labels(&self) -> Vec<String> {
        let mut labels = self.labels.clone();
        if let Some(o) = &self.overflow {
            labels.push(o.clone());
        }
        labels
    }

    /// Label for a single value
    pub fn label(&self, value: f64) -> Result<&str> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];

        if value.is_nan() || value < first {
            return Err(self.out_of_range(value));
        }
        if value >= last {
            return self.overflow.as_deref().ok_or_else(|| self.out_of_range(value));
        }

        // Index of the last edge <= value; `value < last` guarantees it is a bucket.
        let idx = self.edges.partition_point(|&e| e <= value) - 1;
        Ok(&self.labels[idx])
    }

    fn out_of_range(&self, value: f64) -> Error {
        let last = self.edges[self.edges.len() - 1];
        let upper = if self.overflow.is_some() {
            "inf".to_string()
        } else {
            last.to_string()
        };
        Error::OutOfRange {
            value,
            range: format!("[{}, {})", self.edges[0], upper),
        }
    }

    /// Add a label column derived from a numeric column.
    ///
    /// Rows whose value is missing or out of range are dropped (and counted in the log),
    /// so every remaining row carries exactly one label.
    pub fn apply(&self, table: &RecordTable, source: &str, target: &str) -> Result<RecordTable> {
        let idx = table.column_index(source)?;
        let kept = table.filter(|row| row[idx].as_f64().map(|v| self.label(v).is_ok()).unwrap_or(false));

        let dropped = table.len() - kept.len();
        if dropped > 0 {
            log::debug!("{}: {} rows outside {:?} dropped", source, dropped, self.edges);
        }

        Ok(kept.with_column(target, |row| {
            row[idx]
                .as_f64()
                .and_then(|v| self.label(v).ok())
                .map(Value::text)
                .unwrap_or(Value::Missing)
        }))
    }
}

/// Decade of a year, `floor(year / 10) * 10`
pub fn decade(year: f64) -> f64 {
    (year / 10.0).floor() * 10.0
}

/// Add a decade column derived from a year column
pub fn apply_decade(table: &RecordTable, source: &str, target: &str) -> Result<RecordTable> {
    let idx = table.column_index(source)?;
    Ok(table.with_column(target, |row| match row[idx].as_f64() {
        Some(year) => Value::Number(decade(year)),
        None => Value::Missing,
    }))
}

/// What a rename table does with a value that has no entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
    /// Keep the value unchanged and report it
    #[default]
    PassThrough,
    /// Fail with [`Error::UnmappedLabel`]
    Reject,
}

/// A declarative old-label → new-label mapping consulted once per value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenameTable {
    name: String,
    entries: BTreeMap<String, String>,
    policy: UnmappedPolicy,
}

/// Result of applying a rename table to a column
#[derive(Debug, Clone)]
pub struct Renamed {
    pub table: RecordTable,
    /// Distinct values that had no entry and were passed through
    pub unmapped: BTreeSet<String>,
}

impl RenameTable {
    pub fn new(name: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            policy: UnmappedPolicy::PassThrough,
        }
    }

    pub fn with_policy(mut self, policy: UnmappedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical label, or `None` when the value has no entry
    pub fn lookup(&self, value: &str) -> Option<&str> {
        self.entries.get(value).map(|s| s.as_str())
    }

    /// Map one value according to the table's policy
    pub fn map(&self, value: &str) -> Result<String> {
        match (self.lookup(value), self.policy) {
            (Some(to), _) => Ok(to.to_string()),
            (None, UnmappedPolicy::PassThrough) => Ok(value.to_string()),
            (None, UnmappedPolicy::Reject) => Err(Error::UnmappedLabel {
                table: self.name.clone(),
                label: value.to_string(),
            }),
        }
    }

    /// Values of a known input domain that have no entry
    pub fn check_exhaustive<'a, I>(&self, domain: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        domain
            .into_iter()
            .filter(|v| !self.entries.contains_key(*v))
            .map(|v| v.to_string())
            .collect()
    }

    /// Rewrite a text column in place of itself, returning the new table
    pub fn apply(&self, table: &RecordTable, column: &str) -> Result<Renamed> {
        let idx = table.column_index(column)?;
        let mut unmapped = BTreeSet::new();
        let mut rows = Vec::with_capacity(table.len());

        for row in &table.rows {
            let mut row = row.clone();
            if let Value::Text(s) = &row[idx] {
                if self.lookup(s).is_none() {
                    unmapped.insert(s.clone());
                }
                row[idx] = Value::Text(self.map(s)?);
            }
            rows.push(row);
        }

        if !unmapped.is_empty() {
            log::warn!(
                "rename table '{}': {} value(s) in '{}' passed through unmapped: {:?}",
                self.name,
                unmapped.len(),
                column,
                unmapped
            );
        }

        Ok(Renamed {
            table: RecordTable::new(table.headers.clone(), rows)?,
            unmapped,
        })
    }

    /// Add a new column holding the mapped value of `source`
    pub fn derive(&self, table: &RecordTable, source: &str, target: &str) -> Result<Renamed> {
        let copied = {
            let idx = table.column_index(source)?;
            table.with_column(target, |row| row[idx].clone())
        };
        self.apply(&copied, target)
    }
}
