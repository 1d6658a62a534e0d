// Fixed schemas, cleaning rules and dashboard wiring for the bundled datasets

pub mod anxiety;
pub mod pluto;
pub mod trees;

use crate::controller::FilterController;
use crate::data::RecordTable;
use crate::error::{Error, Result};
use crate::loader::{Schema, SourceFormat};
use std::sync::Arc;

/// A dashboard chart that can be driven from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    TreeHealth,
    TreeSteward,
    AnxietyGroup,
    AnxietyState,
    AnxietyRegion,
}

impl Dashboard {
    /// Resolve `<dataset>` and an optional `--view` name
    pub fn lookup(dataset: &str, view: Option<&str>) -> Result<Self> {
        let view = view.map(|v| v.to_ascii_lowercase());
        match (dataset.to_ascii_lowercase().as_str(), view.as_deref()) {
            ("trees", None | Some("health")) => Ok(Dashboard::TreeHealth),
            ("trees", Some("steward")) => Ok(Dashboard::TreeSteward),
            ("anxiety", None | Some("group")) => Ok(Dashboard::AnxietyGroup),
            ("anxiety", Some("state")) => Ok(Dashboard::AnxietyState),
            ("anxiety", Some("region")) => Ok(Dashboard::AnxietyRegion),
            (d, v) => Err(Error::Parse(format!(
                "unknown dashboard '{}'{} (trees: health, steward; anxiety: group, state, region)",
                d,
                v.map(|v| format!(" view '{}'", v)).unwrap_or_default()
            ))),
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            Dashboard::TreeHealth => trees::health_schema(),
            Dashboard::TreeSteward => trees::steward_schema(),
            _ => anxiety::schema(),
        }
    }

    /// Encoding the dataset is published in; used when reading stdin
    pub fn source_format(&self) -> SourceFormat {
        match self {
            Dashboard::TreeHealth | Dashboard::TreeSteward => SourceFormat::Json,
            _ => SourceFormat::Csv,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dashboard::TreeHealth => "Tree health",
            Dashboard::TreeSteward => "Impact of stewardship on tree health",
            Dashboard::AnxietyGroup => "Rate of anxiety and depressive disorder by group",
            Dashboard::AnxietyState => "Rate of anxiety and depressive disorder by state",
            Dashboard::AnxietyRegion => "Average rate of anxiety and depressive disorder by region",
        }
    }

    /// Clean a table loaded with [`Dashboard::schema`] and build its controller
    pub fn controller(&self, table: &RecordTable) -> Result<FilterController> {
        match self {
            Dashboard::TreeHealth => trees::health_controller(Arc::new(table.clone())),
            Dashboard::TreeSteward => trees::steward_controller(Arc::new(trees::clean_steward(table)?)),
            Dashboard::AnxietyGroup => anxiety::group_controller(&anxiety::clean(table)?),
            Dashboard::AnxietyState => anxiety::state_controller(&anxiety::clean(table)?),
            Dashboard::AnxietyRegion => anxiety::region_controller(&anxiety::clean(table)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Dashboard::lookup("trees", None).unwrap(), Dashboard::TreeHealth);
        assert_eq!(Dashboard::lookup("Anxiety", Some("Region")).unwrap(), Dashboard::AnxietyRegion);
        assert!(Dashboard::lookup("trees", Some("region")).is_err());
        assert!(Dashboard::lookup("pluto", None).is_err());
        assert_eq!(Dashboard::TreeSteward.source_format(), SourceFormat::Json);
    }
}
