//! Pixel-density rendering.
//!
//! Two numeric columns are mapped straight onto a fixed-size canvas, one
//! accumulator cell per pixel, instead of being binned into labelled
//! ranges first. The accumulated grid is then shaded into an RGBA image,
//! spread so isolated points stay visible, and composited over a
//! background for export.
//!
//! Rows whose coordinates are missing or fall outside the canvas range are
//! skipped without error. Nothing is clamped or wrapped, so outliers never
//! pile up on the canvas edge.

use crate::data::RecordTable;
use crate::error::{Error, Result};
use crate::palette::{ColorKey, ColorRamp};
use crate::scale::{AxisRange, How};
use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

/// NYC state-plane bounding box (x: easting, y: northing), in feet
pub const NEW_YORK_CITY: ((f64, f64), (f64, f64)) = ((913164.0, 1067279.0), (120966.0, 272275.0));

/// Canvas geometry shared by every reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityCanvas {
    pub width: u32,
    pub height: u32,
    pub x_range: AxisRange,
    pub y_range: AxisRange,
}

/// Per-pixel counts, row 0 at the top of the image
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    cells: Vec<u32>,
}

impl Grid {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize],
        }
    }

    pub fn get(&self, col: u32, row: u32) -> u32 {
        self.cells[(row * self.width + col) as usize]
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| c as u64).sum()
    }

    /// Smallest and largest non-zero counts
    pub fn nonzero_span(&self) -> Option<(u32, u32)> {
        self.cells.iter().filter(|&&c| c > 0).fold(None, |acc, &c| match acc {
            None => Some((c, c)),
            Some((lo, hi)) => Some((lo.min(c), hi.max(c))),
        })
    }
}

/// Per-pixel count vectors, one slot per category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGrid {
    pub width: u32,
    pub height: u32,
    pub categories: Vec<String>,
    cells: Vec<u32>,
}

impl CategoryGrid {
    pub fn counts(&self, col: u32, row: u32) -> &[u32] {
        let k = self.categories.len();
        let start = (row * self.width + col) as usize * k;
        &self.cells[start..start + k]
    }

    /// Index of the category with the highest count; ties go to the earlier category
    pub fn dominant(&self, col: u32, row: u32) -> Option<usize> {
        let counts = self.counts(col, row);
        let mut best: Option<(usize, u32)> = None;
        for (i, &c) in counts.iter().enumerate() {
            if c > 0 && best.map(|(_, b)| c > b).unwrap_or(true) {
                best = Some((i, c));
            }
        }
        best.map(|(i, _)| i)
    }
}

impl DensityCanvas {
    pub fn new(width: u32, height: u32, x_range: AxisRange, y_range: AxisRange) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Parse(format!("canvas size must be non-zero, got {}x{}", width, height)));
        }
        Ok(Self { width, height, x_range, y_range })
    }

    /// Canvas covering the five boroughs
    pub fn new_york_city(width: u32, height: u32) -> Result<Self> {
        let ((x0, x1), (y0, y1)) = NEW_YORK_CITY;
        Self::new(width, height, AxisRange::new(x0, x1)?, AxisRange::new(y0, y1)?)
    }

    /// Pixel for a coordinate, or `None` outside either range.
    ///
    /// A coordinate equal to the range maximum lands in the last column/row.
    pub fn cell(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        if !self.x_range.contains(x) || !self.y_range.contains(y) {
            return None;
        }
        let col = scale_to(x, &self.x_range, self.width);
        let from_bottom = scale_to(y, &self.y_range, self.height);
        Some((col, self.height - 1 - from_bottom))
    }

    fn coordinates(&self, table: &RecordTable, x: &str, y: &str) -> Result<(usize, usize)> {
        Ok((table.column_index(x)?, table.column_index(y)?))
    }

    /// Count rows per pixel
    pub fn points(&self, table: &RecordTable, x: &str, y: &str) -> Result<Grid> {
        let (xi, yi) = self.coordinates(table, x, y)?;
        let mut grid = Grid::new(self.width, self.height);
        let mut skipped = 0usize;

        for row in &table.rows {
            let cell = match (row[xi].as_f64(), row[yi].as_f64()) {
                (Some(px), Some(py)) => self.cell(px, py),
                _ => None,
            };
            match cell {
                Some((col, r)) => grid.cells[(r * self.width + col) as usize] += 1,
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("{} of {} rows outside the canvas range", skipped, table.len());
        }
        Ok(grid)
    }

    /// Count rows per pixel and per category. Rows whose category is not listed are skipped.
    pub fn points_by_category(
        &self,
        table: &RecordTable,
        x: &str,
        y: &str,
        category: &str,
        categories: &[String],
    ) -> Result<CategoryGrid> {
        let (xi, yi) = self.coordinates(table, x, y)?;
        let ci = table.column_index(category)?;
        let k = categories.len();
        let mut cells = vec![0u32; self.width as usize * self.height as usize * k];
        let mut skipped = 0usize;

        for row in &table.rows {
            let slot = categories.iter().position(|c| row[ci].matches(c));
            let cell = match (row[xi].as_f64(), row[yi].as_f64()) {
                (Some(px), Some(py)) => self.cell(px, py),
                _ => None,
            };
            match (cell, slot) {
                (Some((col, r)), Some(s)) => cells[(r * self.width + col) as usize * k + s] += 1,
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("{} of {} rows skipped (out of range or uncategorized)", skipped, table.len());
        }
        Ok(CategoryGrid {
            width: self.width,
            height: self.height,
            categories: categories.to_vec(),
            cells,
        })
    }
}

fn scale_to(v: f64, range: &AxisRange, pixels: u32) -> u32 {
    let pos = ((v - range.min) / range.span() * pixels as f64).floor();
    // Also guards the rounding case where v is just below max but pos reaches `pixels`.
    (pos as u32).min(pixels - 1)
}

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Shade counts through a color ramp. Empty cells stay transparent.
pub fn shade(grid: &Grid, ramp: &ColorRamp, how: How) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(grid.width, grid.height, TRANSPARENT);
    let Some((lo, hi)) = grid.nonzero_span() else {
        return img;
    };
    for row in 0..grid.height {
        for col in 0..grid.width {
            let c = grid.get(col, row);
            if c > 0 {
                img.put_pixel(col, row, ramp.at(how.normalize(c, lo, hi)));
            }
        }
    }
    img
}

/// Color each non-empty cell by its dominant category
pub fn shade_categorical(grid: &CategoryGrid, key: &ColorKey) -> Result<RgbaImage> {
    let colors = grid
        .categories
        .iter()
        .map(|c| {
            key.color(c)
                .ok_or_else(|| Error::Schema(format!("no color for category '{}'", c)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut img = RgbaImage::from_pixel(grid.width, grid.height, TRANSPARENT);
    for row in 0..grid.height {
        for col in 0..grid.width {
            if let Some(i) = grid.dominant(col, row) {
                img.put_pixel(col, row, colors[i]);
            }
        }
    }
    Ok(img)
}

/// Dilate every painted pixel into transparent neighbours within `px` pixels.
///
/// Painted pixels keep their color; where spreads overlap, the source met first
/// in raster order wins.
pub fn spread(img: &RgbaImage, px: u32) -> RgbaImage {
    if px == 0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let r = px as i64;
    let mut out = img.clone();
    let mut claimed = vec![false; w as usize * h as usize];

    for y in 0..h {
        for x in 0..w {
            let src = *img.get_pixel(x, y);
            if src[3] == 0 {
                continue;
            }
            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let idx = (ny * w + nx) as usize;
                    if img.get_pixel(nx, ny)[3] == 0 && !claimed[idx] {
                        out.put_pixel(nx, ny, src);
                        claimed[idx] = true;
                    }
                }
            }
        }
    }
    out
}

/// Alpha-composite over an opaque background
pub fn composite(img: &RgbaImage, background: Rgba<u8>) -> RgbImage {
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y);
        let a = p[3] as f64 / 255.0;
        let blend = |c: u8, b: u8| (c as f64 * a + b as f64 * (1.0 - a)).round() as u8;
        Rgb([blend(p[0], background[0]), blend(p[1], background[1]), blend(p[2], background[2])])
    })
}

/// Encode an RGB image as PNG bytes
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder.write_image(img.as_raw(), img.width(), img.height(), image::ColorType::Rgb8)?;
    }
    Ok(png_bytes)
}
