//! Selection-driven filtering for the interactive dashboards.
//!
//! A [`FilterController`] owns a read-only snapshot of a cleaned table and the
//! current selection. Each selection event filters the snapshot (logical AND of
//! exact matches, one per selected dimension) and aggregates the surviving rows
//! into a [`ChartPayload`]. Empty and invalid selections become payloads rather
//! than errors so a session never dies on user input.
//!
//! Events carry a sequence number. When computation happens off the event loop,
//! [`FilterController::deliver`] only accepts the payload of the most recently
//! issued event, so a slow stale result can never replace a newer one.

use crate::aggregate::{count_by, count_by_category, mean_by, Measure};
use crate::data::{RecordTable, Value};
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Dimension name → chosen value
pub type Selection = BTreeMap<String, String>;

/// Build a selection from literal pairs
pub fn selection(pairs: &[(&str, &str)]) -> Selection {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One selectable input and the column it filters
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub column: String,
    /// Allowed values; `None` accepts anything
    pub domain: Option<BTreeSet<String>>,
    /// Values always kept alongside the selected one
    pub companions: Vec<String>,
    /// Message shown when a value is rejected
    pub hint: Option<String>,
}

impl Dimension {
    pub fn new<I, S>(name: &str, column: &str, domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            domain: Some(domain.into_iter().map(Into::into).collect()),
            companions: Vec::new(),
            hint: None,
        }
    }

    /// A dimension accepting any value
    pub fn open(name: &str, column: &str) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            domain: None,
            companions: Vec::new(),
            hint: None,
        }
    }

    /// A dimension whose domain is every value present in `column`
    pub fn from_data(name: &str, table: &RecordTable, column: &str) -> Result<Self> {
        let values = table.distinct(column)?;
        Ok(Self::new(name, column, values.iter().map(|v| v.to_string())))
    }

    pub fn with_companions(mut self, companions: &[&str]) -> Self {
        self.companions = companions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.domain.as_ref().map_or(true, |d| d.contains(value))
    }

    fn validate(&self, value: &str) -> Result<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(Error::InvalidSelection {
                dimension: self.name.clone(),
                value: value.to_string(),
            })
        }
    }
}

/// How filtered rows become chart data
#[derive(Debug, Clone, PartialEq)]
pub enum ChartView {
    /// One bar per category value
    CategoryCounts {
        category: String,
        domain: Vec<String>,
        measure: Measure,
    },
    /// Category counts, one series per value of `split`
    SplitCounts {
        split: String,
        splits: Vec<String>,
        category: String,
        domain: Vec<String>,
        measure: Measure,
    },
    /// `y` against `x`, one series per value of `series`.
    /// X values are ordered by the smallest `order_by` value seen with them.
    Series {
        x: String,
        y: String,
        series: String,
        order_by: Option<String>,
    },
    /// Mean of `value` per `group`
    GroupMean { group: String, value: String },
}

impl ChartView {
    fn columns(&self) -> Vec<&str> {
        let mut columns = match self {
            ChartView::CategoryCounts { category, .. } => vec![category.as_str()],
            ChartView::SplitCounts { split, category, .. } => vec![split.as_str(), category.as_str()],
            ChartView::Series { x, y, series, order_by } => {
                let mut c = vec![x.as_str(), y.as_str(), series.as_str()];
                c.extend(order_by.as_deref());
                c
            }
            ChartView::GroupMean { group, value } => vec![group.as_str(), value.as_str()],
        };
        match self {
            ChartView::CategoryCounts { measure: Measure::Weight(w), .. }
            | ChartView::SplitCounts { measure: Measure::Weight(w), .. } => columns.push(w.as_str()),
            _ => {}
        }
        columns
    }

    fn payload(&self, rows: &RecordTable) -> Result<ChartPayload> {
        match self {
            ChartView::CategoryCounts { category, domain, measure } => {
                let counts = count_by(rows, &[category.as_str()], measure)?;
                let mut by_cat: BTreeMap<String, u64> = counts
                    .into_iter()
                    .map(|r| (r.key[0].to_string(), r.count))
                    .collect();
                let mut x = Vec::new();
                let mut y = Vec::new();
                for cat in domain {
                    y.push(Some(by_cat.remove(cat).unwrap_or(0) as f64));
                    x.push(cat.clone());
                }
                for (cat, n) in by_cat {
                    x.push(cat);
                    y.push(Some(n as f64));
                }
                Ok(ChartPayload::Chart {
                    x,
                    y: vec![y],
                    series: vec![measure_label(measure)],
                })
            }
            ChartView::SplitCounts { split, splits, category, domain, measure } => {
                let groups = count_by_category(rows, &[split.as_str()], category, Some(domain.as_slice()), measure)?;

                let mut x = domain.clone();
                let extra: BTreeSet<&String> = groups
                    .iter()
                    .flat_map(|g| g.counts.iter().map(|(c, _)| c))
                    .filter(|c| !domain.contains(*c))
                    .collect();
                x.extend(extra.into_iter().cloned());

                let mut series = splits.clone();
                let present: BTreeSet<String> = groups.iter().map(|g| g.key[0].to_string()).collect();
                series.extend(present.into_iter().filter(|s| !splits.contains(s)));

                let y = series
                    .iter()
                    .map(|s| {
                        let group = groups.iter().find(|g| g.key[0].matches(s));
                        x.iter()
                            .map(|cat| Some(group.and_then(|g| g.get(cat)).unwrap_or(0) as f64))
                            .collect()
                    })
                    .collect();
                Ok(ChartPayload::Chart { x, y, series })
            }
            ChartView::Series { x, y, series, order_by } => {
                let xi = rows.column_index(x)?;
                let oi = order_by.as_deref().map(|c| rows.column_index(c)).transpose()?;

                let mut first_seen: BTreeMap<Value, Value> = BTreeMap::new();
                for row in &rows.rows {
                    let key = oi.map_or_else(|| row[xi].clone(), |i| row[i].clone());
                    first_seen
                        .entry(row[xi].clone())
                        .and_modify(|k| {
                            if key < *k {
                                *k = key.clone();
                            }
                        })
                        .or_insert(key);
                }
                let mut xs: Vec<(Value, Value)> = first_seen.into_iter().collect();
                xs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

                let labels: Vec<Value> = rows.distinct(series)?;
                let means: BTreeMap<Vec<Value>, f64> = mean_by(rows, &[series.as_str(), x.as_str()], y)?
                    .into_iter()
                    .map(|m| (m.key, m.mean))
                    .collect();

                let y = labels
                    .iter()
                    .map(|s| {
                        xs.iter()
                            .map(|(xv, _)| means.get(&vec![s.clone(), xv.clone()]).copied())
                            .collect()
                    })
                    .collect();
                Ok(ChartPayload::Chart {
                    x: xs.iter().map(|(xv, _)| xv.to_string()).collect(),
                    y,
                    series: labels.iter().map(|s| s.to_string()).collect(),
                })
            }
            ChartView::GroupMean { group, value } => {
                let means = mean_by(rows, &[group.as_str()], value)?;
                Ok(ChartPayload::Chart {
                    x: means.iter().map(|m| m.key[0].to_string()).collect(),
                    y: vec![means.iter().map(|m| Some(m.mean)).collect()],
                    series: vec![value.clone()],
                })
            }
        }
    }
}

fn measure_label(measure: &Measure) -> String {
    match measure {
        Measure::Rows => "rows".to_string(),
        Measure::Weight(col) => col.clone(),
    }
}

/// What the chart surface receives after each selection event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartPayload {
    /// `y[i][j]` is series `i` at `x[j]`; `None` where a series has no value
    Chart {
        x: Vec<String>,
        y: Vec<Vec<Option<f64>>>,
        series: Vec<String>,
    },
    /// The selection is valid but matches no rows
    Empty { selection: Selection },
    /// A selected value is not in its dimension's domain
    Invalid {
        dimension: String,
        value: String,
        message: String,
    },
    Failed { message: String },
}

impl ChartPayload {
    pub fn is_chart(&self) -> bool {
        matches!(self, ChartPayload::Chart { .. })
    }

    /// Value of `series` at `x`, for chart payloads
    pub fn value(&self, series: &str, x: &str) -> Option<f64> {
        let ChartPayload::Chart { x: xs, y, series: names } = self else {
            return None;
        };
        let si = names.iter().position(|s| s == series)?;
        let xi = xs.iter().position(|v| v == x)?;
        y[si][xi]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// An issued event has not been delivered yet
    Computing,
}

/// A selection tagged with its issue order
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    pub seq: u64,
    pub selection: Selection,
}

/// Per-session filter state over a shared table snapshot
#[derive(Debug, Clone)]
pub struct FilterController {
    table: Arc<RecordTable>,
    dimensions: Vec<Dimension>,
    view: ChartView,
    selection: Selection,
    state: ControllerState,
    issued: u64,
    displayed: Option<ChartPayload>,
}

impl FilterController {
    /// Fails with a schema error if a dimension or the view names a missing column
    pub fn new(table: Arc<RecordTable>, dimensions: Vec<Dimension>, view: ChartView) -> Result<Self> {
        for dim in &dimensions {
            table.column_index(&dim.column)?;
        }
        for column in view.columns() {
            table.column_index(column)?;
        }
        Ok(Self {
            table,
            dimensions,
            view,
            selection: Selection::new(),
            state: ControllerState::Idle,
            issued: 0,
            displayed: None,
        })
    }

    /// Apply an initial selection
    pub fn with_default(mut self, selection: Selection) -> Self {
        self.on_selection_changed(selection);
        self
    }

    pub fn table(&self) -> &Arc<RecordTable> {
        &self.table
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn view(&self) -> &ChartView {
        &self.view
    }

    /// The last selection that produced a delivered, valid payload
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn displayed(&self) -> Option<&ChartPayload> {
        self.displayed.as_ref()
    }

    /// Replace the selection and return the resulting payload
    pub fn on_selection_changed(&mut self, selection: Selection) -> ChartPayload {
        let event = self.issue(selection);
        let payload = self.compute(&event);
        self.deliver(&event, payload.clone());
        payload
    }

    /// Change one dimension, keeping the others
    pub fn select(&mut self, dimension: &str, value: &str) -> ChartPayload {
        let mut next = self.selection.clone();
        next.insert(dimension.to_string(), value.to_string());
        self.on_selection_changed(next)
    }

    /// Register a new event; any earlier undelivered event becomes stale
    pub fn issue(&mut self, selection: Selection) -> SelectionEvent {
        self.issued += 1;
        self.state = ControllerState::Computing;
        SelectionEvent {
            seq: self.issued,
            selection,
        }
    }

    /// Filter and aggregate for an event. Reads only the snapshot.
    pub fn compute(&self, event: &SelectionEvent) -> ChartPayload {
        match self.evaluate(&event.selection) {
            Ok(payload) => payload,
            Err(Error::EmptyResult) => ChartPayload::Empty {
                selection: event.selection.clone(),
            },
            Err(Error::InvalidSelection { dimension, value }) => {
                let message = match self.dimension(&dimension) {
                    Some(d) => d
                        .hint
                        .clone()
                        .unwrap_or_else(|| format!("'{}' is not a known {}", value, d.name)),
                    None => format!("unknown selection '{}'", dimension),
                };
                ChartPayload::Invalid { dimension, value, message }
            }
            Err(e) => {
                log::error!("selection {:?} failed: {}", event.selection, e);
                ChartPayload::Failed {
                    message: format!("{}: {}", e.title(), e),
                }
            }
        }
    }

    /// Display a computed payload if its event is still the latest one.
    ///
    /// Returns `false` and leaves the display untouched for a stale event.
    pub fn deliver(&mut self, event: &SelectionEvent, payload: ChartPayload) -> bool {
        if event.seq != self.issued {
            log::debug!("dropping payload of event {} (latest is {})", event.seq, self.issued);
            return false;
        }
        if !matches!(payload, ChartPayload::Invalid { .. }) {
            self.selection = event.selection.clone();
        }
        self.displayed = Some(payload);
        self.state = ControllerState::Idle;
        true
    }

    fn evaluate(&self, selection: &Selection) -> Result<ChartPayload> {
        let mut filters: Vec<(usize, Vec<&str>)> = Vec::with_capacity(selection.len());
        for (name, value) in selection {
            let dim = self.dimension(name).ok_or_else(|| Error::InvalidSelection {
                dimension: name.clone(),
                value: value.clone(),
            })?;
            dim.validate(value)?;
            let mut accepted = vec![value.as_str()];
            accepted.extend(dim.companions.iter().map(|c| c.as_str()));
            filters.push((self.table.column_index(&dim.column)?, accepted));
        }

        let rows = self
            .table
            .filter(|row| filters.iter().all(|(i, accepted)| accepted.iter().any(|a| row[*i].matches(a))));
        if rows.is_empty() {
            return Err(Error::EmptyResult);
        }
        log::debug!("selection {:?} matched {} rows", selection, rows.len());
        self.view.payload(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trees() -> Arc<RecordTable> {
        let rows = vec![
            ("Bronx", "Oak", "Good", "yes", 1.0),
            ("Bronx", "Oak", "Poor", "no", 1.0),
            ("Queens", "Oak", "Fair", "no", 3.0),
            ("Queens", "Ginkgo", "Good", "yes", 2.0),
            ("Queens", "Ginkgo", "Good", "no", 5.0),
        ];
        Arc::new(
            RecordTable::new(
                ["borough", "species", "health", "steward", "count"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                rows.into_iter()
                    .map(|(b, s, h, st, c)| {
                        vec![Value::from(b), Value::from(s), Value::from(h), Value::from(st), Value::Number(c)]
                    })
                    .collect(),
            )
            .unwrap(),
        )
    }

    fn health_domain() -> Vec<String> {
        vec!["Poor".to_string(), "Fair".to_string(), "Good".to_string()]
    }

    fn health_controller(domain: Vec<String>) -> FilterController {
        let table = trees();
        let dims = vec![
            Dimension::new("borough", "borough", ["Bronx", "Queens"]),
            Dimension::from_data("species", &table, "species").unwrap(),
        ];
        let view = ChartView::CategoryCounts {
            category: "health".to_string(),
            domain,
            measure: Measure::Rows,
        };
        FilterController::new(table, dims, view).unwrap()
    }

    #[test]
    fn test_counts_for_matching_rows() {
        let mut c = health_controller(Vec::new());
        let payload = c.on_selection_changed(selection(&[("borough", "Bronx"), ("species", "Oak")]));
        assert_eq!(
            payload,
            ChartPayload::Chart {
                x: vec!["Good".to_string(), "Poor".to_string()],
                y: vec![vec![Some(1.0), Some(1.0)]],
                series: vec!["rows".to_string()],
            }
        );
    }

    #[test]
    fn test_known_domain_reports_zero() {
        let mut c = health_controller(health_domain());
        let payload = c.on_selection_changed(selection(&[("borough", "Bronx"), ("species", "Oak")]));
        assert_eq!(payload.value("rows", "Poor"), Some(1.0));
        assert_eq!(payload.value("rows", "Fair"), Some(0.0));
        assert_eq!(payload.value("rows", "Good"), Some(1.0));
    }

    #[test]
    fn test_no_matching_rows_is_empty_payload() {
        let mut c = health_controller(health_domain());
        let sel = selection(&[("borough", "Bronx"), ("species", "Ginkgo")]);
        assert_eq!(c.on_selection_changed(sel.clone()), ChartPayload::Empty { selection: sel.clone() });
        assert_eq!(c.selection(), &sel);
        assert_eq!(c.state(), ControllerState::Idle);
    }

    #[test]
    fn test_open_dimension_unknown_value_is_empty() {
        let table = trees();
        let view = ChartView::CategoryCounts {
            category: "health".to_string(),
            domain: health_domain(),
            measure: Measure::Rows,
        };
        let mut c = FilterController::new(table, vec![Dimension::open("species", "species")], view).unwrap();
        let payload = c.on_selection_changed(selection(&[("species", "Baobab")]));
        assert!(matches!(payload, ChartPayload::Empty { .. }));
    }

    #[test]
    fn test_invalid_value_keeps_previous_selection() {
        let mut c = health_controller(health_domain());
        let good = selection(&[("borough", "Bronx"), ("species", "Oak")]);
        c.on_selection_changed(good.clone());

        let payload = c.select("borough", "Atlantis");
        match &payload {
            ChartPayload::Invalid { dimension, value, message } => {
                assert_eq!(dimension, "borough");
                assert_eq!(value, "Atlantis");
                assert!(message.contains("Atlantis"));
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
        assert_eq!(c.selection(), &good);
        assert_eq!(c.displayed(), Some(&payload));
    }

    #[test]
    fn test_unknown_dimension_is_invalid() {
        let mut c = health_controller(health_domain());
        let payload = c.on_selection_changed(selection(&[("colour", "red")]));
        assert!(matches!(payload, ChartPayload::Invalid { ref dimension, .. } if dimension == "colour"));
    }

    #[test]
    fn test_hint_and_companions() {
        let table = trees();
        let dims = vec![Dimension::new("borough", "borough", ["Bronx", "Queens"])
            .with_companions(&["Queens"])
            .with_hint("Improper entry, please try again (ie. Bronx).")];
        let view = ChartView::GroupMean {
            group: "borough".to_string(),
            value: "count".to_string(),
        };
        let mut c = FilterController::new(table, dims, view).unwrap();

        let payload = c.on_selection_changed(selection(&[("borough", "Bronx")]));
        assert_eq!(payload.value("count", "Bronx"), Some(1.0));
        assert_eq!(payload.value("count", "Queens"), Some(3.33));

        match c.on_selection_changed(selection(&[("borough", "bronx")])) {
            ChartPayload::Invalid { message, .. } => {
                assert_eq!(message, "Improper entry, please try again (ie. Bronx).")
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
    }

    #[test]
    fn test_weighted_split_counts() {
        let view = ChartView::SplitCounts {
            split: "steward".to_string(),
            splits: vec!["yes".to_string(), "no".to_string()],
            category: "health".to_string(),
            domain: health_domain(),
            measure: Measure::Weight("count".to_string()),
        };
        let dims = vec![Dimension::new("borough", "borough", ["Bronx", "Queens"])];
        let mut c = FilterController::new(trees(), dims, view).unwrap();

        let payload = c.on_selection_changed(selection(&[("borough", "Queens")]));
        assert_eq!(payload.value("yes", "Good"), Some(2.0));
        assert_eq!(payload.value("no", "Good"), Some(5.0));
        assert_eq!(payload.value("no", "Fair"), Some(3.0));
        assert_eq!(payload.value("yes", "Poor"), Some(0.0));
    }

    #[test]
    fn test_series_ordered_by_column() {
        let rows = vec![
            ("Apr 23 - May 5", 1.0, "Male", 30.0),
            ("May 7 - May 12", 2.0, "Male", 31.0),
            ("Apr 23 - May 5", 1.0, "Female", 35.0),
        ];
        let table = RecordTable::new(
            ["IntervalRange", "Interval", "Subgroup", "Rate"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows.into_iter()
                .map(|(r, i, s, v)| vec![Value::from(r), Value::Number(i), Value::from(s), Value::Number(v)])
                .collect(),
        )
        .unwrap();
        let view = ChartView::Series {
            x: "IntervalRange".to_string(),
            y: "Rate".to_string(),
            series: "Subgroup".to_string(),
            order_by: Some("Interval".to_string()),
        };
        let mut c = FilterController::new(Arc::new(table), Vec::new(), view).unwrap();
        match c.on_selection_changed(Selection::new()) {
            ChartPayload::Chart { x, y, series } => {
                assert_eq!(x, vec!["Apr 23 - May 5", "May 7 - May 12"]);
                assert_eq!(series, vec!["Female", "Male"]);
                assert_eq!(y[0], vec![Some(35.0), None]);
                assert_eq!(y[1], vec![Some(30.0), Some(31.0)]);
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_same_selection_same_payload() {
        let mut c = health_controller(health_domain());
        let sel = selection(&[("borough", "Queens"), ("species", "Ginkgo")]);
        let first = c.on_selection_changed(sel.clone());
        let second = c.on_selection_changed(sel);
        assert_eq!(first, second);
        assert_eq!(c.table().len(), 5);
    }

    #[test]
    fn test_stale_delivery_is_dropped() {
        let mut c = health_controller(health_domain());
        let older = c.issue(selection(&[("borough", "Bronx"), ("species", "Oak")]));
        let newer = c.issue(selection(&[("borough", "Queens"), ("species", "Ginkgo")]));
        assert_eq!(c.state(), ControllerState::Computing);

        let (old_payload, new_payload) = std::thread::scope(|s| {
            let shared = &c;
            let a = s.spawn(|| shared.compute(&older));
            let b = s.spawn(|| shared.compute(&newer));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(c.deliver(&newer, new_payload.clone()));
        assert!(!c.deliver(&older, old_payload));
        assert_eq!(c.displayed(), Some(&new_payload));
        assert_eq!(c.selection(), &newer.selection);
        assert_eq!(c.state(), ControllerState::Idle);
    }

    #[test]
    fn test_missing_column_rejected_at_construction() {
        let view = ChartView::GroupMean {
            group: "borough".to_string(),
            value: "height".to_string(),
        };
        assert!(matches!(
            FilterController::new(trees(), Vec::new(), view),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_payload_serializes_with_status_tag() {
        let payload = ChartPayload::Empty {
            selection: selection(&[("borough", "Bronx")]),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "empty");
        assert_eq!(json["selection"]["borough"], "Bronx");
    }
}
