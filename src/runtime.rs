// Runtime executor: load → clean → bucket → aggregate → render

use crate::bucket::Breakpoints;
use crate::chart::{self, ChartData, ChartKind};
use crate::controller::{ChartPayload, Selection};
use crate::data::RecordTable;
use crate::datasets::pluto::{self, DensityView};
use crate::datasets::Dashboard;
use crate::density;
use crate::{DensityOptions, OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use serde::Serialize;

/// Which static PLUTO chart to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinsChart {
    Year,
    Decade,
    /// More than ten floors, or the `--breaks` ranges when given
    Floors,
    /// 1-10 floors
    FloorsLow,
}

impl std::str::FromStr for BinsChart {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "year" => Ok(BinsChart::Year),
            "decade" => Ok(BinsChart::Decade),
            "floors" => Ok(BinsChart::Floors),
            "floors-low" => Ok(BinsChart::FloorsLow),
            other => Err(crate::Error::Parse(format!(
                "unknown chart '{}' (expected year, decade, floors or floors-low)",
                other
            ))),
        }
    }
}

/// How aggregate results leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    Chart(OutputFormat),
    Json,
}

impl std::str::FromStr for Export {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("json") {
            Ok(Export::Json)
        } else {
            s.parse().map(Export::Chart)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value).context("Failed to serialize output")?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn with_format(options: &RenderOptions, format: OutputFormat) -> RenderOptions {
    RenderOptions {
        format,
        ..options.clone()
    }
}

/// Bin cleaned lot data and export the aggregate rows as a chart or JSON.
///
/// `breaks` replaces the standard floor ranges for the floors chart; all of its
/// ranges are kept. Other charts ignore it.
pub fn run_bins(
    lots: &RecordTable,
    chart: BinsChart,
    breaks: Option<&Breakpoints>,
    export: Export,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let cleaned = pluto::clean(lots).context("Failed to clean lot data")?;
    if cleaned.is_empty() {
        anyhow::bail!("No lots left after cleaning (build year 1851-2019, at least one floor)");
    }

    let data = match chart {
        BinsChart::Year | BinsChart::Decade => {
            let (rows, title, kind) = if chart == BinsChart::Year {
                (pluto::lots_per_year(&cleaned)?, "Lots built per year", ChartKind::Line)
            } else {
                (pluto::lots_per_decade(&cleaned)?, "Lots built per decade", ChartKind::Bar)
            };
            if export == Export::Json {
                return to_json(&rows);
            }
            ChartData::from_counts(title, kind, &rows)
        }
        BinsChart::Floors | BinsChart::FloorsLow => {
            let (groups, title) = match (chart, breaks) {
                (BinsChart::Floors, Some(b)) => (
                    pluto::floors_per_decade(&cleaned, b, &b.all_labels())?,
                    "Lots per decade by number of floors",
                ),
                (BinsChart::Floors, None) => (
                    pluto::tall_lots_per_decade(&cleaned)?,
                    "Lots per decade by number of floors",
                ),
                _ => (pluto::low_lots_per_decade(&cleaned)?, "Lots built per decade of 1-10 floors"),
            };
            if export == Export::Json {
                return to_json(&groups);
            }
            ChartData::stacked(title, &groups)
        }
    };

    let Export::Chart(format) = export else {
        unreachable!("json export returned above");
    };
    let x_desc = if chart == BinsChart::Year { "year built" } else { "decade" };
    chart::render(&data.with_axes(x_desc, "lots"), &with_format(options, format)).context("Failed to render chart")
}

/// Render a density image of cleaned lot data to PNG
pub fn run_density(lots: &RecordTable, view: DensityView, options: &DensityOptions) -> Result<Vec<u8>> {
    let cleaned = pluto::clean(lots).context("Failed to clean lot data")?;
    let image = pluto::density_image(&cleaned, view, options).context("Failed to render density image")?;
    density::encode_png(&image).context("Failed to encode PNG")
}

/// Apply a selection to a dashboard and export the payload.
///
/// Dimensions missing from `selection` keep the dashboard's default value. JSON export
/// always succeeds; chart export fails with the payload's message when the
/// selection is empty or invalid.
pub fn run_select(
    table: &RecordTable,
    dashboard: Dashboard,
    selection: Option<Selection>,
    export: Export,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let mut controller = dashboard.controller(table).context("Failed to prepare dashboard")?;
    let payload = match selection {
        Some(sel) => {
            let mut merged = controller.selection().clone();
            merged.extend(sel);
            controller.on_selection_changed(merged)
        }
        None => controller
            .displayed()
            .cloned()
            .context("Dashboard has no default selection")?,
    };

    let format = match export {
        Export::Json => return to_json(&payload),
        Export::Chart(format) => format,
    };

    let kind = match dashboard {
        Dashboard::AnxietyGroup | Dashboard::AnxietyState => ChartKind::Line,
        _ => ChartKind::Bar,
    };
    match ChartData::from_payload(dashboard.title(), kind, &payload) {
        Some(data) => chart::render(&data, &with_format(options, format)).context("Failed to render chart"),
        None => match payload {
            ChartPayload::Empty { selection } => anyhow::bail!("No rows match selection {:?}", selection),
            ChartPayload::Invalid { message, .. } | ChartPayload::Failed { message } => anyhow::bail!(message),
            ChartPayload::Chart { .. } => unreachable!("chart payloads always convert"),
        },
    }
}
