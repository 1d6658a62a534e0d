use crate::data::RecordTable;
use crate::error::{Error, Result};
use serde::Deserialize;

/// Inclusive numeric range of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(Error::Parse(format!("invalid axis range ({}, {})", min, max)));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Min and max of the numeric values of a column, ignoring non-numeric cells.
///
/// A constant column yields a range widened by 1 on each side.
pub fn extent(table: &RecordTable, column: &str) -> Result<AxisRange> {
    let idx = table.column_index(column)?;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in &table.rows {
        if let Some(v) = row[idx].as_f64().filter(|v| v.is_finite()) {
            if v < min { min = v; }
            if v > max { max = v; }
        }
    }

    if min == f64::INFINITY {
        return Err(Error::EmptyResult);
    }
    if min == max {
        return AxisRange::new(min - 1.0, max + 1.0);
    }
    AxisRange::new(min, max)
}

pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// How accumulated counts are mapped onto `[0, 1]` before coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum How {
    Linear,
    #[default]
    Log,
}

impl How {
    /// Position of `count` between the smallest and largest non-zero counts.
    /// When every non-zero cell holds the same count the result is 1.
    pub fn normalize(&self, count: u32, min: u32, max: u32) -> f64 {
        let f = |c: u32| match self {
            How::Linear => c as f64,
            How::Log => (c as f64).ln_1p(),
        };
        let (lo, hi) = (f(min), f(max));
        if hi <= lo {
            return 1.0;
        }
        ((f(count) - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}

impl std::str::FromStr for How {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(How::Linear),
            "log" => Ok(How::Log),
            other => Err(Error::Parse(format!("unknown transfer scale '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn column(values: &[f64]) -> RecordTable {
        RecordTable::new(
            vec!["v".to_string()],
            values.iter().map(|&v| vec![Value::Number(v)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_extent() {
        let r = extent(&column(&[1851.0, 2019.0, 1900.0]), "v").unwrap();
        assert_eq!((r.min, r.max), (1851.0, 2019.0));
    }

    #[test]
    fn test_extent_single_point() {
        let r = extent(&column(&[5.0]), "v").unwrap();
        assert_eq!((r.min, r.max), (4.0, 6.0));
    }

    #[test]
    fn test_extent_empty_column() {
        assert!(matches!(extent(&column(&[]), "v"), Err(Error::EmptyResult)));
    }

    #[test]
    fn test_axis_range_validation() {
        assert!(AxisRange::new(1.0, 1.0).is_err());
        assert!(AxisRange::new(2.0, 1.0).is_err());
        let r = AxisRange::new(0.0, 10.0).unwrap();
        assert!(r.contains(0.0) && r.contains(10.0) && !r.contains(10.5));
        assert_eq!(pad_range(r.min, r.max), (-0.5, 10.5));
    }

    #[test]
    fn test_normalize_linear_and_log() {
        assert_eq!(How::Linear.normalize(5, 1, 9), 0.5);
        assert_eq!(How::Log.normalize(1, 1, 1000), 0.0);
        assert_eq!(How::Log.normalize(1000, 1, 1000), 1.0);
        // Log lifts low counts above their linear position.
        assert!(How::Log.normalize(10, 1, 1000) > How::Linear.normalize(10, 1, 1000));
        assert_eq!(How::Linear.normalize(3, 3, 3), 1.0);
    }
}
