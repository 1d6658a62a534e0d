//! 2015 NYC Street Tree Census: health by species and borough.
//!
//! Input is the JSON returned by the city's open-data endpoint for one of the
//! grouped queries below, e.g.
//! `curl "$HEALTH_QUERY&\$limit=5000" | tallyshade select trees - ...`.

use crate::aggregate::Measure;
use crate::bucket::{RenameTable, UnmappedPolicy};
use crate::controller::{selection, ChartView, Dimension, FilterController};
use crate::data::RecordTable;
use crate::error::{Error, Result};
use crate::loader::{ColumnSpec, ColumnType, Schema};
use std::sync::Arc;

pub const HEALTH_QUERY: &str = "https://data.cityofnewyork.us/resource/nwxe-4ae8.json?\
$select=spc_common,boroname,health,count(spc_common)&$group=spc_common,boroname,health";

pub const STEWARD_QUERY: &str = "https://data.cityofnewyork.us/resource/nwxe-4ae8.json?\
$select=spc_common,boroname,health,steward,count(spc_common)&$group=spc_common,boroname,health,steward";

pub const BOROUGHS: [&str; 5] = ["Bronx", "Brooklyn", "Manhattan", "Queens", "Staten Island"];

pub const HEALTH: [&str; 3] = ["Poor", "Fair", "Good"];

fn base_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("species", ColumnType::Text).from_source("spc_common"),
        ColumnSpec::new("borough", ColumnType::Text).from_source("boroname"),
        ColumnSpec::new("health", ColumnType::Text),
    ]
}

/// Rows of the health query
pub fn health_schema() -> Schema {
    let mut columns = base_columns();
    columns.push(ColumnSpec::new("count", ColumnType::Integer).from_source("count_spc_common"));
    Schema::new(columns)
}

/// Rows of the steward query
pub fn steward_schema() -> Schema {
    let mut columns = base_columns();
    columns.push(ColumnSpec::new("steward", ColumnType::Text));
    columns.push(ColumnSpec::new("count", ColumnType::Integer).from_source("count_spc_common"));
    Schema::new(columns)
}

/// Steward counts collapse to whether the tree has any steward at all
pub fn steward_labels() -> RenameTable {
    RenameTable::new(
        "steward",
        &[("None", "no"), ("1or2", "yes"), ("3or4", "yes"), ("4orMore", "yes")],
    )
    .with_policy(UnmappedPolicy::Reject)
}

/// Normalize the steward column to `yes` / `no`
pub fn clean_steward(table: &RecordTable) -> Result<RecordTable> {
    Ok(steward_labels().apply(table, "steward")?.table)
}

fn health_domain() -> Vec<String> {
    HEALTH.iter().map(|s| s.to_string()).collect()
}

fn dimensions(table: &RecordTable) -> Result<Vec<Dimension>> {
    Ok(vec![
        Dimension::new("borough", "borough", BOROUGHS),
        Dimension::from_data("species", table, "species")?,
    ])
}

/// Default selection: borough and species of the first row
fn first_row_selection(table: &RecordTable) -> Result<crate::controller::Selection> {
    let row = table.rows.first().ok_or(Error::EmptyResult)?;
    let (b, s) = (table.column_index("borough")?, table.column_index("species")?);
    Ok(selection(&[
        ("borough", &row[b].to_string()),
        ("species", &row[s].to_string()),
    ]))
}

/// Tree counts per health rating for one borough and species
pub fn health_controller(table: Arc<RecordTable>) -> Result<FilterController> {
    let view = ChartView::CategoryCounts {
        category: "health".to_string(),
        domain: health_domain(),
        measure: Measure::Weight("count".to_string()),
    };
    let default = first_row_selection(&table)?;
    Ok(FilterController::new(table.clone(), dimensions(&table)?, view)?.with_default(default))
}

/// Health counts with and without a steward for one borough and species
pub fn steward_controller(table: Arc<RecordTable>) -> Result<FilterController> {
    let view = ChartView::SplitCounts {
        split: "steward".to_string(),
        splits: vec!["yes".to_string(), "no".to_string()],
        category: "health".to_string(),
        domain: health_domain(),
        measure: Measure::Weight("count".to_string()),
    };
    let default = first_row_selection(&table)?;
    Ok(FilterController::new(table.clone(), dimensions(&table)?, view)?.with_default(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ChartPayload;
    use crate::loader::{load_reader, SourceFormat};

    const STEWARD_JSON: &str = r#"[
        {"spc_common": "American beech", "boroname": "Bronx", "health": "Good", "steward": "None", "count_spc_common": "7"},
        {"spc_common": "American beech", "boroname": "Bronx", "health": "Good", "steward": "1or2", "count_spc_common": "3"},
        {"spc_common": "American beech", "boroname": "Bronx", "health": "Poor", "steward": "3or4", "count_spc_common": "1"},
        {"spc_common": "London planetree", "boroname": "Queens", "health": "Fair", "steward": "4orMore", "count_spc_common": "12"},
        {"boroname": "Queens", "health": "Good", "steward": "None", "count_spc_common": "40"}
    ]"#;

    fn steward_table() -> RecordTable {
        let raw = load_reader(STEWARD_JSON.as_bytes(), SourceFormat::Json, &steward_schema()).unwrap();
        clean_steward(&raw).unwrap()
    }

    #[test]
    fn test_rows_without_species_dropped() {
        assert_eq!(steward_table().len(), 4);
    }

    #[test]
    fn test_steward_labels_cover_census_values() {
        let labels = steward_labels();
        assert!(labels.check_exhaustive(["None", "1or2", "3or4", "4orMore"]).is_empty());
        let stewards: Vec<String> = steward_table().distinct("steward").unwrap().iter().map(|v| v.to_string()).collect();
        assert_eq!(stewards, vec!["no", "yes"]);
    }

    #[test]
    fn test_unknown_steward_value_rejected() {
        let table = RecordTable::new(
            vec!["steward".to_string()],
            vec![vec![crate::data::Value::from("lots")]],
        )
        .unwrap();
        assert!(matches!(clean_steward(&table), Err(Error::UnmappedLabel { .. })));
    }

    #[test]
    fn test_health_controller_defaults_to_first_row() {
        let c = health_controller(Arc::new(steward_table())).unwrap();
        assert_eq!(c.selection()["borough"], "Bronx");
        assert_eq!(c.selection()["species"], "American beech");
        let payload = c.displayed().unwrap();
        assert_eq!(payload.value("count", "Good"), Some(10.0));
        assert_eq!(payload.value("count", "Poor"), Some(1.0));
        assert_eq!(payload.value("count", "Fair"), Some(0.0));
    }

    #[test]
    fn test_steward_split() {
        let mut c = steward_controller(Arc::new(steward_table())).unwrap();
        let payload = c.on_selection_changed(selection(&[("borough", "Bronx"), ("species", "American beech")]));
        assert_eq!(payload.value("yes", "Good"), Some(3.0));
        assert_eq!(payload.value("yes", "Poor"), Some(1.0));
        assert_eq!(payload.value("no", "Good"), Some(7.0));

        let payload = c.select("species", "London planetree");
        assert!(matches!(payload, ChartPayload::Empty { .. }));
    }
}
