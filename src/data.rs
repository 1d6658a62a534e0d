use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;

/// A single scalar cell
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this cell equals a selection string, compared on its display form
    pub fn matches(&self, selected: &str) -> bool {
        match self {
            Value::Text(s) => s == selected,
            Value::Missing => false,
            other => other.to_string() == selected,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Missing => 0,
            Value::Number(_) => 1,
            Value::Date(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Group keys rely on this being a total order.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// An ordered, row-oriented table of records.
///
/// Stages never mutate a table they are given; every transform returns a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(Error::Schema(format!(
                "row {} has {} cells but the table has {} columns",
                idx + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Read a CSV stream; every cell is kept as text, empty cells become `Missing`
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(Error::Schema("CSV input has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<Value> = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Missing
                    } else {
                        Value::text(cell)
                    }
                })
                .collect();
            // Short records are padded rather than rejected; the loader's
            // missing-value policy decides what happens to them.
            row.resize(headers.len(), Value::Missing);
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Create a table from a JSON array of objects, the shape a query endpoint returns.
    ///
    /// Objects may omit keys (null fields are often dropped by the endpoint), so the
    /// header list is the union of keys in order of first appearance.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| Error::Schema("Input data must be a JSON array of objects".to_string()))?;

        let mut headers: Vec<String> = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::Schema("Items in array must be objects".to_string()))?;
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::Schema("Items in array must be objects".to_string()))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let val = match obj.get(header) {
                    Some(JsonValue::String(s)) if s.is_empty() => Value::Missing,
                    Some(JsonValue::String(s)) => Value::text(s.clone()),
                    Some(JsonValue::Number(n)) => n.as_f64().map(Value::Number).unwrap_or(Value::Missing),
                    Some(JsonValue::Bool(b)) => Value::text(b.to_string()),
                    Some(JsonValue::Null) | None => Value::Missing,
                    _ => {
                        return Err(Error::Schema(format!(
                            "Unsupported value type for field '{}'",
                            header
                        )))
                    }
                };
                row.push(val);
            }
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_ok()
    }

    /// Find a column by name (exact match first, then ASCII case-insensitive)
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| Error::Schema(format!("Column '{}' not found", name)))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Sorted distinct non-missing values of a column
    pub fn distinct(&self, name: &str) -> Result<Vec<Value>> {
        let idx = self.column_index(name)?;
        let mut values: Vec<Value> = self
            .rows
            .iter()
            .map(|r| r[idx].clone())
            .filter(|v| !v.is_missing())
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// Rows for which `keep` returns true, as a new table
    pub fn filter<F>(&self, mut keep: F) -> RecordTable
    where
        F: FnMut(&[Value]) -> bool,
    {
        RecordTable {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Derive a column from each row. An existing column of the same name is replaced.
    pub fn with_column<F>(&self, name: &str, mut derive: F) -> RecordTable
    where
        F: FnMut(&[Value]) -> Value,
    {
        let existing = self.headers.iter().position(|h| h == name);
        let mut headers = self.headers.clone();
        if existing.is_none() {
            headers.push(name.to_string());
        }

        let rows = self
            .rows
            .iter()
            .map(|r| {
                let derived = derive(r);
                let mut row = r.clone();
                match existing {
                    Some(idx) => row[idx] = derived,
                    None => row.push(derived),
                }
                row
            })
            .collect();

        RecordTable { headers, rows }
    }

    /// Append the rows of a table with the same headers
    pub fn concat(&self, other: &RecordTable) -> Result<RecordTable> {
        if self.headers != other.headers {
            return Err(Error::Schema(format!(
                "cannot concatenate tables with headers {:?} and {:?}",
                self.headers, other.headers
            )));
        }
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Ok(RecordTable {
            headers: self.headers.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_ordering_numbers_before_text() {
        let mut values = vec![Value::text("b"), Value::Number(10.0), Value::Number(2.0), Value::Missing];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Missing, Value::Number(2.0), Value::Number(10.0), Value::text("b")]
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(1950.0).to_string(), "1950");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Missing.to_string(), "");
        assert!(Value::Number(1950.0).matches("1950"));
    }

    #[test]
    fn test_from_csv_reader_marks_empty_cells_missing() {
        let csv = "borough,numfloors\nMN,5\nBX,\n";
        let table = RecordTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["borough", "numfloors"]);
        assert_eq!(table.len(), 2);
        assert!(table.rows[1][1].is_missing());
    }

    #[test]
    fn test_from_json_unions_keys() {
        let value = json!([
            {"boroname": "Bronx", "health": "Good", "count_spc_common": "3"},
            {"boroname": "Queens", "count_spc_common": "1"}
        ]);
        let table = RecordTable::from_json(&value).unwrap();
        assert_eq!(table.headers.len(), 3);
        let health = table.column_index("health").unwrap();
        assert!(table.rows[1][health].is_missing());
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        let result = RecordTable::from_json(&json!({"a": 1}));
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let table = RecordTable::new(vec!["YearBuilt".to_string()], vec![vec![Value::from(1950.0)]]).unwrap();
        assert_eq!(table.column_index("yearbuilt").unwrap(), 0);
        assert!(table.column_index("numfloors").is_err());
    }

    #[test]
    fn test_with_column_does_not_touch_source() {
        let table = RecordTable::new(vec!["x".to_string()], vec![vec![Value::from(1.0)]]).unwrap();
        let derived = table.with_column("double", |r| Value::Number(r[0].as_f64().unwrap() * 2.0));
        assert_eq!(table.headers.len(), 1);
        assert_eq!(derived.headers, vec!["x", "double"]);
        assert_eq!(derived.rows[0][1], Value::Number(2.0));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = RecordTable::new(vec!["a".to_string(), "b".to_string()], vec![vec![Value::from(1.0)]]);
        assert!(result.is_err());
    }
}
