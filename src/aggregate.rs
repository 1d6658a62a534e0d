// Group-by aggregation: counts, category-wise counts and means

use crate::data::{RecordTable, Value};
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// What each contributing row adds to its group
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Measure {
    /// One per row
    #[default]
    Rows,
    /// The row's value in a pre-aggregated count column
    Weight(String),
}

/// One group and its count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<Value>,
    pub count: u64,
}

/// One group broken out by category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub key: Vec<Value>,
    pub counts: Vec<(String, u64)>,
    pub total: u64,
}

impl CategoryCounts {
    pub fn get(&self, category: &str) -> Option<u64> {
        self.counts.iter().find(|(c, _)| c == category).map(|(_, n)| *n)
    }
}

/// Mean of a numeric column within one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanRow {
    pub key: Vec<Value>,
    pub mean: f64,
    pub rows: usize,
}

fn group_indices(table: &RecordTable, group_by: &[&str]) -> Result<Vec<usize>> {
    if group_by.is_empty() || group_by.len() > 3 {
        return Err(Error::Schema(format!(
            "grouping takes 1 to 3 columns, got {}",
            group_by.len()
        )));
    }
    group_by.iter().map(|c| table.column_index(c)).collect()
}

fn weight_index(table: &RecordTable, measure: &Measure) -> Result<Option<usize>> {
    match measure {
        Measure::Rows => Ok(None),
        Measure::Weight(col) => table.column_index(col).map(Some),
    }
}

fn row_weight(row: &[Value], weight_idx: Option<usize>, row_idx: usize, table: &RecordTable) -> Result<u64> {
    let Some(idx) = weight_idx else {
        return Ok(1);
    };
    let parsed = match &row[idx] {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
        _ => Err(Error::Schema(format!(
            "Failed to read '{}' as a count in column '{}' at row {}",
            row[idx],
            table.headers[idx],
            row_idx + 1
        ))),
    }
}

/// Count rows per distinct combination of the grouping columns.
///
/// Output is sorted by group key.
pub fn count_by(table: &RecordTable, group_by: &[&str], measure: &Measure) -> Result<Vec<AggregateRow>> {
    let indices = group_indices(table, group_by)?;
    let weight_idx = weight_index(table, measure)?;

    let mut groups: BTreeMap<Vec<Value>, u64> = BTreeMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
        *groups.entry(key).or_insert(0) += row_weight(row, weight_idx, row_idx, table)?;
    }

    Ok(groups
        .into_iter()
        .map(|(key, count)| AggregateRow { key, count })
        .collect())
}

/// Count rows per group and per category within the group.
///
/// With a known `domain`, categories are listed in domain order and the ones absent
/// from a group are reported as 0; categories seen in the data but not in the domain
/// follow in sorted order. Without a domain only the categories present are listed.
pub fn count_by_category(
    table: &RecordTable,
    group_by: &[&str],
    category: &str,
    domain: Option<&[String]>,
    measure: &Measure,
) -> Result<Vec<CategoryCounts>> {
    let indices = group_indices(table, group_by)?;
    let cat_idx = table.column_index(category)?;
    let weight_idx = weight_index(table, measure)?;

    let mut groups: BTreeMap<Vec<Value>, BTreeMap<String, u64>> = BTreeMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
        let weight = row_weight(row, weight_idx, row_idx, table)?;
        *groups
            .entry(key)
            .or_default()
            .entry(row[cat_idx].to_string())
            .or_insert(0) += weight;
    }

    Ok(groups
        .into_iter()
        .map(|(key, mut by_cat)| {
            let total = by_cat.values().sum();
            let mut counts = Vec::with_capacity(by_cat.len());
            if let Some(domain) = domain {
                for cat in domain {
                    counts.push((cat.clone(), by_cat.remove(cat).unwrap_or(0)));
                }
            }
            counts.extend(by_cat);
            CategoryCounts { key, counts, total }
        })
        .collect())
}

/// Mean of `value` per group, rounded to 2 decimals
pub fn mean_by(table: &RecordTable, group_by: &[&str], value: &str) -> Result<Vec<MeanRow>> {
    let indices = group_indices(table, group_by)?;
    let value_idx = table.column_index(value)?;

    let mut groups: BTreeMap<Vec<Value>, (f64, usize)> = BTreeMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        let v = row[value_idx].as_f64().ok_or_else(|| {
            Error::Schema(format!(
                "Failed to read '{}' as a number in column '{}' at row {}",
                row[value_idx],
                value,
                row_idx + 1
            ))
        })?;
        let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    Ok(groups
        .into_iter()
        .map(|(key, (sum, rows))| MeanRow {
            key,
            mean: (sum / rows as f64 * 100.0).round() / 100.0,
            rows,
        })
        .collect())
}
