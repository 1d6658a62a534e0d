use crate::aggregate::{AggregateRow, CategoryCounts};
use crate::controller::ChartPayload;
use crate::density::encode_png;
use crate::error::{Error, Result};
use crate::scale::pad_range;
use crate::{OutputFormat, RenderOptions};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Bars side by side when there is more than one series
    Bar,
    StackedBar,
    Line,
}

/// One named run of values aligned with the chart categories
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

/// Everything needed to draw one categorical chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub title: String,
    pub kind: ChartKind,
    pub x_desc: String,
    pub y_desc: String,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

fn key_label(key: &[crate::data::Value]) -> String {
    key.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" / ")
}

impl ChartData {
    /// A single series of group counts
    pub fn from_counts(title: &str, kind: ChartKind, rows: &[AggregateRow]) -> Self {
        Self {
            title: title.to_string(),
            kind,
            x_desc: String::new(),
            y_desc: "count".to_string(),
            categories: rows.iter().map(|r| key_label(&r.key)).collect(),
            series: vec![Series {
                label: "count".to_string(),
                values: rows.iter().map(|r| Some(r.count as f64)).collect(),
            }],
        }
    }

    /// One stacked segment per category, one bar per group
    pub fn stacked(title: &str, groups: &[CategoryCounts]) -> Self {
        let mut labels: Vec<String> = Vec::new();
        for g in groups {
            for (cat, _) in &g.counts {
                if !labels.contains(cat) {
                    labels.push(cat.clone());
                }
            }
        }
        Self {
            title: title.to_string(),
            kind: ChartKind::StackedBar,
            x_desc: String::new(),
            y_desc: "count".to_string(),
            categories: groups.iter().map(|g| key_label(&g.key)).collect(),
            series: labels
                .into_iter()
                .map(|label| Series {
                    values: groups.iter().map(|g| Some(g.get(&label).unwrap_or(0) as f64)).collect(),
                    label,
                })
                .collect(),
        }
    }

    /// Chart data for a controller payload; `None` for non-chart payloads
    pub fn from_payload(title: &str, kind: ChartKind, payload: &ChartPayload) -> Option<Self> {
        let ChartPayload::Chart { x, y, series } = payload else {
            return None;
        };
        Some(Self {
            title: title.to_string(),
            kind,
            x_desc: String::new(),
            y_desc: String::new(),
            categories: x.clone(),
            series: series
                .iter()
                .zip(y)
                .map(|(label, values)| Series {
                    label: label.clone(),
                    values: values.clone(),
                })
                .collect(),
        })
    }

    pub fn with_axes(mut self, x_desc: &str, y_desc: &str) -> Self {
        self.x_desc = x_desc.to_string();
        self.y_desc = y_desc.to_string();
        self
    }

    fn y_range(&self) -> Range<f64> {
        let values = self.series.iter().flat_map(|s| s.values.iter().flatten().copied());
        match self.kind {
            ChartKind::Line => {
                let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                let (min, max) = pad_range(min, max);
                min..max
            }
            ChartKind::Bar => 0.0..values.fold(0.0, f64::max).max(1.0) * 1.1,
            ChartKind::StackedBar => {
                let top = (0..self.categories.len())
                    .map(|i| self.series.iter().filter_map(|s| s.values[i]).sum::<f64>())
                    .fold(0.0, f64::max);
                0.0..top.max(1.0) * 1.1
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() || self.series.is_empty() {
            return Err(Error::Chart("Cannot draw a chart with no data".to_string()));
        }
        for s in &self.series {
            if s.values.len() != self.categories.len() {
                return Err(Error::Chart(format!(
                    "Series '{}' has {} values for {} categories",
                    s.label,
                    s.values.len(),
                    self.categories.len()
                )));
            }
        }
        if self.kind == ChartKind::Line && !self.series.iter().any(|s| s.values.iter().any(Option::is_some)) {
            return Err(Error::Chart("Cannot draw a line chart with no values".to_string()));
        }
        Ok(())
    }
}

fn chart_err<E: std::fmt::Display>(what: &str) -> impl Fn(E) -> Error + '_ {
    move |e| Error::Chart(format!("{}: {}", what, e))
}

/// Draw a chart and encode it in the requested format
pub fn render(data: &ChartData, options: &RenderOptions) -> Result<Vec<u8>> {
    data.validate()?;
    let (width, height) = (options.width, options.height);

    match options.format {
        OutputFormat::Png => {
            let mut buffer = vec![0u8; (width * height * 3) as usize];
            {
                let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
                draw(&root, data)?;
                root.present().map_err(chart_err("Failed to present drawing"))?;
            }
            let img = image::RgbImage::from_raw(width, height, buffer)
                .ok_or_else(|| Error::Chart("chart buffer has the wrong size".to_string()))?;
            encode_png(&img)
        }
        OutputFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
                draw(&root, data)?;
                root.present().map_err(chart_err("Failed to present drawing"))?;
            }
            Ok(svg.into_bytes())
        }
    }
}

fn draw<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, data: &ChartData) -> Result<()> {
    root.fill(&WHITE).map_err(chart_err("Failed to fill background"))?;

    let n = data.categories.len();
    // Category i is centred on x = i so mesh ticks land under the bars.
    let x_range = -0.5..(n as f64 - 0.5);

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&data.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, data.y_range())
        .map_err(chart_err("Failed to build chart"))?;

    let categories = &data.categories;
    chart
        .configure_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| {
            let idx = x.round();
            if (x - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < categories.len() {
                categories[idx as usize].clone()
            } else {
                String::new()
            }
        })
        .x_desc(data.x_desc.as_str())
        .y_desc(data.y_desc.as_str())
        .draw()
        .map_err(chart_err("Failed to draw mesh"))?;

    let num_series = data.series.len();
    for (series_idx, series) in data.series.iter().enumerate() {
        let color = SERIES_COLORS[series_idx % SERIES_COLORS.len()];

        let drawn = match data.kind {
            ChartKind::Line => {
                let points: Vec<(f64, f64)> = series
                    .values
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                    .collect();
                chart
                    .draw_series(LineSeries::new(points, color.stroke_width(2)))
                    .map_err(chart_err("Failed to draw line series"))?
            }
            ChartKind::Bar => {
                let bar_width = 0.8 / num_series as f64;
                let offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_width;
                chart
                    .draw_series(series.values.iter().enumerate().filter_map(|(i, v)| {
                        let x = i as f64 + offset;
                        v.map(|v| Rectangle::new([(x - bar_width / 2.0, 0.0), (x + bar_width / 2.0, v)], color.filled()))
                    }))
                    .map_err(chart_err("Failed to draw bars"))?
            }
            ChartKind::StackedBar => {
                let below: Vec<f64> = (0..n)
                    .map(|i| data.series[..series_idx].iter().filter_map(|s| s.values[i]).sum())
                    .collect();
                chart
                    .draw_series(series.values.iter().enumerate().filter_map(|(i, v)| {
                        let x = i as f64;
                        v.map(|v| Rectangle::new([(x - 0.4, below[i]), (x + 0.4, below[i] + v)], color.filled()))
                    }))
                    .map_err(chart_err("Failed to draw bars"))?
            }
        };
        drawn
            .label(series.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    if num_series > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err("Failed to draw legend"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn counts() -> Vec<AggregateRow> {
        vec![
            AggregateRow { key: vec![Value::Number(1950.0)], count: 4 },
            AggregateRow { key: vec![Value::Number(1960.0)], count: 7 },
        ]
    }

    #[test]
    fn test_render_bar_png() {
        let data = ChartData::from_counts("Lots per decade", ChartKind::Bar, &counts());
        let png = render(&data, &RenderOptions::default()).unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_render_line_svg() {
        let data = ChartData::from_counts("Lots per year", ChartKind::Line, &counts());
        let options = RenderOptions {
            format: OutputFormat::Svg,
            ..RenderOptions::default()
        };
        let svg = String::from_utf8(render(&data, &options).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_stacked_series_follow_category_order() {
        let groups = vec![
            CategoryCounts {
                key: vec![Value::Number(1920.0)],
                counts: vec![("11-20".to_string(), 3), ("21-30".to_string(), 0)],
                total: 3,
            },
            CategoryCounts {
                key: vec![Value::Number(1930.0)],
                counts: vec![("11-20".to_string(), 1), ("21-30".to_string(), 2)],
                total: 3,
            },
        ];
        let data = ChartData::stacked("Tall lots", &groups);
        assert_eq!(data.categories, vec!["1920", "1930"]);
        assert_eq!(data.series[1].label, "21-30");
        assert_eq!(data.series[1].values, vec![Some(0.0), Some(2.0)]);
        assert_eq!(data.y_range().end, 3.0 * 1.1);
    }

    #[test]
    fn test_from_payload() {
        let payload = ChartPayload::Chart {
            x: vec!["Poor".to_string(), "Good".to_string()],
            y: vec![vec![Some(1.0), Some(2.0)]],
            series: vec!["count".to_string()],
        };
        let data = ChartData::from_payload("Health", ChartKind::Bar, &payload).unwrap();
        assert_eq!(data.series[0].values, vec![Some(1.0), Some(2.0)]);

        let empty = ChartPayload::Empty { selection: Default::default() };
        assert!(ChartData::from_payload("Health", ChartKind::Bar, &empty).is_none());
    }

    #[test]
    fn test_empty_chart_rejected() {
        let data = ChartData::from_counts("Nothing", ChartKind::Bar, &[]);
        assert!(matches!(render(&data, &RenderOptions::default()), Err(Error::Chart(_))));
    }
}
