//! NYC PLUTO tax lots: construction-era binning and density images.

use crate::aggregate::{count_by, count_by_category, AggregateRow, CategoryCounts, Measure};
use crate::bucket::{apply_decade, Breakpoints};
use crate::data::{RecordTable, Value};
use crate::density::{self, DensityCanvas};
use crate::error::{Error, Result};
use crate::loader::{ColumnSpec, ColumnType, Schema};
use crate::palette::{parse_color, ColorKey, ColorRamp};
use crate::scale::{extent, How};
use crate::DensityOptions;
use image::{RgbImage, Rgba};

/// Years outside this open interval are treated as unknown or bad data
pub const YEAR_BOUNDS: (f64, f64) = (1850.0, 2020.0);

pub fn schema() -> Schema {
    Schema::new(vec![
        ColumnSpec::new("borough", ColumnType::Text),
        ColumnSpec::new("bbl", ColumnType::Integer).fill(0i64),
        ColumnSpec::new("yearbuilt", ColumnType::Integer).fill(0i64),
        ColumnSpec::new("numfloors", ColumnType::Integer).fill(0i64),
        ColumnSpec::new("xcoord", ColumnType::Integer).fill(0i64),
        ColumnSpec::new("ycoord", ColumnType::Integer).fill(0i64),
        ColumnSpec::new("assessland", ColumnType::Float).fill(0.0),
        ColumnSpec::new("assesstot", ColumnType::Float).fill(0.0),
    ])
}

/// Keep lots with a plausible build year and at least one floor, and add `decade`
pub fn clean(table: &RecordTable) -> Result<RecordTable> {
    let year = table.column_index("yearbuilt")?;
    let floors = table.column_index("numfloors")?;
    let (lo, hi) = YEAR_BOUNDS;

    let kept = table.filter(|row| {
        let y = row[year].as_f64().unwrap_or(0.0);
        let f = row[floors].as_f64().unwrap_or(0.0);
        y > lo && y < hi && f != 0.0
    });
    log::info!("pluto: kept {} of {} lots", kept.len(), table.len());
    apply_decade(&kept, "yearbuilt", "decade")
}

pub fn lots_per_year(table: &RecordTable) -> Result<Vec<AggregateRow>> {
    count_by(table, &["yearbuilt"], &Measure::Rows)
}

pub fn lots_per_decade(table: &RecordTable) -> Result<Vec<AggregateRow>> {
    count_by(table, &["decade"], &Measure::Rows)
}

/// Lots per decade split by floor range, keeping only the ranges named in `domain`
pub fn floors_per_decade(table: &RecordTable, ranges: &Breakpoints, domain: &[String]) -> Result<Vec<CategoryCounts>> {
    let labelled = ranges.apply(table, "numfloors", "floors")?;
    let idx = labelled.column_index("floors")?;
    let kept = labelled.filter(|row| domain.iter().any(|d| row[idx].matches(d)));
    count_by_category(&kept, &["decade"], "floors", Some(domain), &Measure::Rows)
}

/// Lots of more than ten floors per decade, by floor range
pub fn tall_lots_per_decade(table: &RecordTable) -> Result<Vec<CategoryCounts>> {
    let ranges = Breakpoints::floor_ranges();
    let domain: Vec<String> = ranges.all_labels().into_iter().skip(1).collect();
    floors_per_decade(table, &ranges, &domain)
}

/// Lots of 1-10 floors per decade
pub fn low_lots_per_decade(table: &RecordTable) -> Result<Vec<CategoryCounts>> {
    let ranges = Breakpoints::floor_ranges();
    let domain: Vec<String> = ranges.all_labels().into_iter().take(1).collect();
    floors_per_decade(table, &ranges, &domain)
}

/// Land-value classes `A`..`C`
pub fn land_classes() -> Result<Breakpoints> {
    Breakpoints::new(
        vec![0.0, 11580.0, 18120.0],
        vec!["A".to_string(), "B".to_string()],
        Some("C".to_string()),
    )
}

/// Building-value classes `1`..`3`
pub fn building_classes() -> Result<Breakpoints> {
    Breakpoints::new(
        vec![0.0, 29220.0, 55560.0],
        vec!["1".to_string(), "2".to_string()],
        Some("3".to_string()),
    )
}

/// Add `land_class`, `building_class` and their combination `bi_class` (e.g. `B3`).
///
/// Building value is total assessment minus land assessment. Lots where it comes
/// out negative fall outside the classes and are dropped.
pub fn bivariate(table: &RecordTable) -> Result<RecordTable> {
    let land = table.column_index("assessland")?;
    let total = table.column_index("assesstot")?;
    let with_building = table.with_column("assessbldg", |row| match (row[total].as_f64(), row[land].as_f64()) {
        (Some(t), Some(l)) => Value::Number(t - l),
        _ => Value::Missing,
    });

    let classed = land_classes()?.apply(&with_building, "assessland", "land_class")?;
    let classed = building_classes()?.apply(&classed, "assessbldg", "building_class")?;
    let (li, bi) = (classed.column_index("land_class")?, classed.column_index("building_class")?);
    Ok(classed.with_column("bi_class", |row| Value::text(format!("{}{}", row[li], row[bi]))))
}

/// The density images drawn from lot data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityView {
    /// Build year against floor count over the data extent
    YearFloors,
    /// Lot positions over the city
    Lots,
    /// Lot positions colored by bivariate value class
    Bivariate,
}

impl std::str::FromStr for DensityView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "year-floors" => Ok(DensityView::YearFloors),
            "lots" => Ok(DensityView::Lots),
            "bivariate" => Ok(DensityView::Bivariate),
            other => Err(Error::Parse(format!(
                "unknown density view '{}' (expected year-floors, lots or bivariate)",
                other
            ))),
        }
    }
}

impl DensityView {
    fn default_size(&self) -> (u32, u32) {
        match self {
            DensityView::YearFloors => (800, 500),
            DensityView::Lots | DensityView::Bivariate => (700, 700),
        }
    }

    fn default_spread(&self) -> u32 {
        match self {
            DensityView::Bivariate => 1,
            _ => 2,
        }
    }

    fn default_ramp(&self) -> ColorRamp {
        match self {
            DensityView::YearFloors => ColorRamp::greys9(),
            _ => ColorRamp::inferno(),
        }
    }
}

/// Render a cleaned lot table to an RGB image
pub fn density_image(table: &RecordTable, view: DensityView, options: &DensityOptions) -> Result<RgbImage> {
    let (dw, dh) = view.default_size();
    let (width, height) = (options.width.unwrap_or(dw), options.height.unwrap_or(dh));
    let spread = options.spread.unwrap_or_else(|| view.default_spread());
    let how = options.how.unwrap_or(How::Log);
    let ramp = match &options.ramp {
        Some(name) => ColorRamp::from_name(name)?,
        None => view.default_ramp(),
    };
    let background = parse_color(&options.background)?;
    // Ramps run dark to bright; dense cells must contrast with a light background.
    let ramp = if background == Rgba([0, 0, 0, 255]) { ramp } else { ramp.reversed() };

    let shaded = match view {
        DensityView::YearFloors => {
            let canvas = DensityCanvas::new(width, height, extent(table, "yearbuilt")?, extent(table, "numfloors")?)?;
            density::shade(&canvas.points(table, "yearbuilt", "numfloors")?, &ramp, how)
        }
        DensityView::Lots => {
            let canvas = DensityCanvas::new_york_city(width, height)?;
            density::shade(&canvas.points(table, "xcoord", "ycoord")?, &ramp, how)
        }
        DensityView::Bivariate => {
            let classed = bivariate(table)?;
            let key = ColorKey::bivariate();
            let canvas = DensityCanvas::new_york_city(width, height)?;
            let grid = canvas.points_by_category(&classed, "xcoord", "ycoord", "bi_class", &key.categories())?;
            density::shade_categorical(&grid, &key)?
        }
    };

    log::info!("pluto: rendered {:?} at {}x{}, spread {}", view, width, height, spread);
    Ok(density::composite(&density::spread(&shaded, spread), background))
}
