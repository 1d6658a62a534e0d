//! Household Pulse Survey: rate of anxiety or depressive disorder symptoms.

use crate::bucket::RenameTable;
use crate::controller::{selection, ChartView, Dimension, FilterController};
use crate::data::RecordTable;
use crate::error::Result;
use crate::loader::{ColumnSpec, ColumnType, Schema};
use std::sync::Arc;

pub const INDICATOR: &str = "Symptoms of Anxiety Disorder or Depressive Disorder";

/// Survey intervals after this one fall outside April-December 2020
pub const LAST_INTERVAL: f64 = 21.0;

pub const GROUPS: [&str; 4] = ["Age", "Education", "Race", "Sex"];

pub const NATIONAL_AVERAGE: &str = "National Average";

pub const STATE_HINT: &str = "Improper entry, please try again (ie. New York).";

pub const STATES: [&str; 52] = [
    "Alaska", "Alabama", "Arkansas", "Arizona", "California", "Colorado", "Connecticut",
    "District of Columbia", "Delaware", "Florida", "Georgia", "Hawaii", "Iowa", "Idaho",
    "Illinois", "Indiana", "Kansas", "Kentucky", "Louisiana", "Massachusetts", "Maryland",
    "Maine", "Michigan", "Minnesota", "Missouri", "Mississippi", "Montana", "North Carolina",
    "North Dakota", "Nebraska", "New Hampshire", "New Jersey", "New Mexico", "Nevada",
    "New York", "Ohio", "Oklahoma", "Oregon", "Pennsylvania", "Puerto Rico", "Rhode Island",
    "South Carolina", "South Dakota", "Tennessee", "Texas", "Utah", "Virginia", "Vermont",
    "Washington", "Wisconsin", "West Virginia", "Wyoming",
];

pub const REGIONS: [(&str, &[&str]); 5] = [
    (
        "Midwest",
        &[
            "Illinois", "Indiana", "Iowa", "Kansas", "Michigan", "Minnesota", "Missouri",
            "Nebraska", "North Dakota", "Ohio", "South Dakota", "Wisconsin",
        ],
    ),
    (
        "Northeast",
        &[
            "Connecticut", "Delaware", "Maine", "Maryland", "Massachusetts", "New Hampshire",
            "New Jersey", "New York", "Pennsylvania", "Rhode Island", "Vermont",
        ],
    ),
    (
        "Southeast",
        &[
            "Alabama", "Arkansas", "Florida", "Georgia", "Kentucky", "Louisiana", "Mississippi",
            "North Carolina", "South Carolina", "Tennessee", "Virginia", "West Virginia",
        ],
    ),
    ("Southwest", &["Arizona", "New Mexico", "Oklahoma", "Texas"]),
    (
        "West",
        &[
            "Alaska", "California", "Colorado", "Hawaii", "Idaho", "Montana", "Nevada", "Oregon",
            "Utah", "Washington", "Wyoming",
        ],
    ),
];

pub fn schema() -> Schema {
    Schema::new(vec![
        ColumnSpec::new("Indicator", ColumnType::Text),
        ColumnSpec::new("Group", ColumnType::Text),
        ColumnSpec::new("State", ColumnType::Text),
        ColumnSpec::new("Subgroup", ColumnType::Text),
        ColumnSpec::new("Interval", ColumnType::Integer).from_source("Time Period"),
        ColumnSpec::new("IntervalRange", ColumnType::Text).from_source("Time Period Label"),
        ColumnSpec::new("Rate", ColumnType::Float).from_source("Value"),
    ])
}

pub fn group_labels() -> RenameTable {
    RenameTable::new(
        "group",
        &[
            ("By Race/Hispanic ethnicity", "Race"),
            ("By Age", "Age"),
            ("By Education", "Education"),
            ("By Sex", "Sex"),
        ],
    )
}

pub fn subgroup_labels() -> RenameTable {
    RenameTable::new(
        "subgroup",
        &[
            ("Hispanic or Latino", "Hispanic"),
            ("Non-Hispanic white, single race", "White"),
            ("Non-Hispanic black, single race", "Black"),
            ("Non-Hispanic Asian, single race", "Asian"),
            ("Non-Hispanic, other races and multiple races", "Other/Mixed"),
            ("Less than a high school diploma", "Less than High School"),
            ("High school diploma or GED", "High School"),
            ("Some college/Associate's degree", "Some College"),
            ("Bachelor's degree or higher", "Bachelor's or Higher"),
        ],
    )
}

pub fn state_labels() -> RenameTable {
    RenameTable::new("state", &[("United States", NATIONAL_AVERAGE)])
}

/// State name → region name
pub fn region_labels() -> RenameTable {
    let entries: Vec<(&str, &str)> = REGIONS
        .iter()
        .flat_map(|(region, states)| states.iter().map(move |s| (*s, *region)))
        .collect();
    RenameTable::new("region", &entries)
}

/// Keep the combined indicator for 2020 and shorten group, subgroup and state labels
pub fn clean(table: &RecordTable) -> Result<RecordTable> {
    let (ind, interval) = (table.column_index("Indicator")?, table.column_index("Interval")?);
    let kept = table.filter(|row| {
        row[ind].matches(INDICATOR) && row[interval].as_f64().map_or(false, |i| i <= LAST_INTERVAL)
    });
    log::info!("anxiety: kept {} of {} rows", kept.len(), table.len());

    let kept = group_labels().apply(&kept, "Group")?.table;
    let kept = subgroup_labels().apply(&kept, "Subgroup")?.table;
    Ok(state_labels().apply(&kept, "State")?.table)
}

fn rate_by_interval(series: &str) -> ChartView {
    ChartView::Series {
        x: "IntervalRange".to_string(),
        y: "Rate".to_string(),
        series: series.to_string(),
        order_by: Some("Interval".to_string()),
    }
}

/// Rate per interval for each subgroup of the chosen demographic group
pub fn group_controller(table: &RecordTable) -> Result<FilterController> {
    let idx = table.column_index("Group")?;
    let rows = table.filter(|row| GROUPS.iter().any(|g| row[idx].matches(g)));
    let dims = vec![Dimension::new("group", "Group", GROUPS)];
    Ok(FilterController::new(Arc::new(rows), dims, rate_by_interval("Subgroup"))?
        .with_default(selection(&[("group", "Age")])))
}

/// Rate per interval for a typed-in state next to the national average
pub fn state_controller(table: &RecordTable) -> Result<FilterController> {
    let idx = table.column_index("Group")?;
    let rows = table.filter(|row| row[idx].matches("National Estimate") || row[idx].matches("By State"));
    let dims = vec![Dimension::new("state", "State", STATES)
        .with_companions(&[NATIONAL_AVERAGE])
        .with_hint(STATE_HINT)];
    Ok(FilterController::new(Arc::new(rows), dims, rate_by_interval("State"))?
        .with_default(selection(&[("state", "New York")])))
}

/// Average rate of each state in the chosen region
pub fn region_controller(table: &RecordTable) -> Result<FilterController> {
    let idx = table.column_index("Group")?;
    let by_state = table.filter(|row| row[idx].matches("By State"));
    let with_region = region_labels().derive(&by_state, "State", "Region")?.table;

    let region = with_region.column_index("Region")?;
    let rows = with_region.filter(|row| REGIONS.iter().any(|(r, _)| row[region].matches(r)));
    let dims = vec![Dimension::new("region", "Region", REGIONS.iter().map(|(r, _)| *r))];
    let view = ChartView::GroupMean {
        group: "State".to_string(),
        value: "Rate".to_string(),
    };
    Ok(FilterController::new(Arc::new(rows), dims, view)?.with_default(selection(&[("region", "Midwest")])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ChartPayload;
    use crate::loader::{load_reader, SourceFormat};

    const CSV: &str = "\
Indicator,Group,State,Subgroup,Phase,Time Period,Time Period Label,Time Period Start Date,Time Period End Date,Value,Low CI,High CI,Confidence Interval,Quartile Range
Symptoms of Anxiety Disorder or Depressive Disorder,National Estimate,United States,United States,1,1,Apr 23 - May 5,,,35.9,35.0,36.8,35.0 - 36.8,
Symptoms of Anxiety Disorder or Depressive Disorder,National Estimate,United States,United States,1,2,May 7 - May 12,,,34.1,33.2,35.0,33.2 - 35.0,
Symptoms of Anxiety Disorder or Depressive Disorder,By Age,United States,18 - 29 years,1,1,Apr 23 - May 5,,,46.8,44.3,49.3,44.3 - 49.3,
Symptoms of Anxiety Disorder or Depressive Disorder,By Age,United States,18 - 29 years,1,2,May 7 - May 12,,,44.0,41.9,46.1,41.9 - 46.1,
Symptoms of Anxiety Disorder or Depressive Disorder,By Race/Hispanic ethnicity,United States,\"Non-Hispanic white, single race\",1,1,Apr 23 - May 5,,,33.8,32.8,34.8,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,New York,New York,1,1,Apr 23 - May 5,,,37.0,33.4,40.6,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,New York,New York,1,2,May 7 - May 12,,,35.0,31.0,39.0,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,Ohio,Ohio,1,1,Apr 23 - May 5,,,33.0,29.0,37.0,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,Ohio,Ohio,1,2,May 7 - May 12,,,34.0,30.0,38.0,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,Iowa,Iowa,1,1,Apr 23 - May 5,,,30.1,27.0,33.0,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,Iowa,Iowa,1,2,May 7 - May 12,,,,,,,
Symptoms of Anxiety Disorder or Depressive Disorder,By State,Ohio,Ohio,3,22,Dec 9 - Dec 21,,,40.0,36.0,44.0,,
Symptoms of Depressive Disorder,By State,Ohio,Ohio,1,1,Apr 23 - May 5,,,20.0,18.0,22.0,,
";

    fn cleaned() -> RecordTable {
        clean(&load_reader(CSV.as_bytes(), SourceFormat::Csv, &schema()).unwrap()).unwrap()
    }

    #[test]
    fn test_clean() {
        let table = cleaned();
        // Missing rate, late interval and other indicator rows are gone.
        assert_eq!(table.len(), 10);
        let groups: Vec<String> = table.distinct("Group").unwrap().iter().map(|v| v.to_string()).collect();
        assert_eq!(groups, vec!["Age", "By State", "National Estimate", "Race"]);
        assert!(table.distinct("Subgroup").unwrap().iter().any(|v| v.matches("White")));
        assert!(table.distinct("State").unwrap().iter().any(|v| v.matches(NATIONAL_AVERAGE)));
    }

    #[test]
    fn test_regions_cover_states() {
        let regions = region_labels();
        let unmapped = regions.check_exhaustive(STATES);
        let expected: std::collections::BTreeSet<String> =
            ["District of Columbia", "Puerto Rico"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unmapped, expected);
    }

    #[test]
    fn test_group_controller_default_is_age() {
        let c = group_controller(&cleaned()).unwrap();
        let payload = c.displayed().unwrap();
        assert_eq!(payload.value("18 - 29 years", "Apr 23 - May 5"), Some(46.8));
        assert_eq!(payload.value("18 - 29 years", "May 7 - May 12"), Some(44.0));
    }

    #[test]
    fn test_group_with_no_rows_is_empty() {
        let mut c = group_controller(&cleaned()).unwrap();
        assert!(matches!(c.select("group", "Education"), ChartPayload::Empty { .. }));
        assert!(c.select("group", "Race").is_chart());
    }

    #[test]
    fn test_state_with_national_average() {
        let mut c = state_controller(&cleaned()).unwrap();
        let payload = c.select("state", "Ohio");
        assert_eq!(payload.value("Ohio", "May 7 - May 12"), Some(34.0));
        assert_eq!(payload.value(NATIONAL_AVERAGE, "May 7 - May 12"), Some(34.1));
        assert_eq!(payload.value("New York", "May 7 - May 12"), None);
    }

    #[test]
    fn test_improper_state_entry() {
        let mut c = state_controller(&cleaned()).unwrap();
        match c.select("state", "Gotham") {
            ChartPayload::Invalid { dimension, message, .. } => {
                assert_eq!(dimension, "state");
                assert_eq!(message, STATE_HINT);
            }
            other => panic!("expected invalid payload, got {:?}", other),
        }
        assert_eq!(c.selection()["state"], "New York");
    }

    #[test]
    fn test_region_average_rate() {
        let c = region_controller(&cleaned()).unwrap();
        let payload = c.displayed().unwrap();
        assert_eq!(payload.value("Rate", "Ohio"), Some(33.5));
        assert_eq!(payload.value("Rate", "Iowa"), Some(30.1));
        assert_eq!(payload.value("Rate", "New York"), None);
    }
}
