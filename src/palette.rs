// Color ramps and categorical color keys

use crate::error::{Error, Result};
use image::Rgba;

const GREYS9: [&str; 9] = [
    "#000000", "#252525", "#525252", "#737373", "#969696", "#bdbdbd", "#d9d9d9", "#f0f0f0", "#ffffff",
];

const INFERNO: [&str; 10] = [
    "#000004", "#1b0c41", "#4a0c6b", "#781c6d", "#a52c60", "#cf4446", "#ed6925", "#fb9b06", "#f7d13d", "#fcffa4",
];

const VIRIDIS: [&str; 10] = [
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58", "#b5de2b", "#fde725",
];

/// Land-value class (A-C) × building-value class (1-3), low/low in the first slot
const BIVARIATE: [(&str, &str); 9] = [
    ("A1", "#e8e8e8"),
    ("A2", "#e4acac"),
    ("A3", "#c85a5a"),
    ("B1", "#b0d5df"),
    ("B2", "#ad9ea5"),
    ("B3", "#985356"),
    ("C1", "#64acbe"),
    ("C2", "#627f8c"),
    ("C3", "#574249"),
];

/// Parse `#rrggbb` into an opaque color
pub fn parse_hex(s: &str) -> Result<Rgba<u8>> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Parse(format!("invalid hex color '{}'", s)));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| Error::Parse(e.to_string()));
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Parse a named color or a hex string
pub fn parse_color(s: &str) -> Result<Rgba<u8>> {
    match s.to_ascii_lowercase().as_str() {
        "black" => Ok(Rgba([0, 0, 0, 255])),
        "white" => Ok(Rgba([255, 255, 255, 255])),
        "red" => Ok(Rgba([255, 0, 0, 255])),
        "green" => Ok(Rgba([0, 255, 0, 255])),
        "blue" => Ok(Rgba([0, 0, 255, 255])),
        _ => parse_hex(s),
    }
}

fn from_hex_list(list: &[&str]) -> Vec<Rgba<u8>> {
    list.iter().filter_map(|h| parse_hex(h).ok()).collect()
}

/// A continuous color ramp sampled by linear interpolation between stops
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    colors: Vec<Rgba<u8>>,
}

impl ColorRamp {
    pub fn new(colors: Vec<Rgba<u8>>) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::Parse("Color ramp requires at least one color".to_string()));
        }
        Ok(Self { colors })
    }

    pub fn greys9() -> Self {
        Self { colors: from_hex_list(&GREYS9) }
    }

    pub fn inferno() -> Self {
        Self { colors: from_hex_list(&INFERNO) }
    }

    pub fn viridis() -> Self {
        Self { colors: from_hex_list(&VIRIDIS) }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "greys9" | "greys" => Ok(Self::greys9()),
            "inferno" => Ok(Self::inferno()),
            "viridis" => Ok(Self::viridis()),
            other => Err(Error::Parse(format!("unknown color ramp '{}'", other))),
        }
    }

    /// Reverse the ramp, for light backgrounds
    pub fn reversed(mut self) -> Self {
        self.colors.reverse();
        self
    }

    /// Color at `t` in `[0, 1]` (clamped)
    pub fn at(&self, t: f64) -> Rgba<u8> {
        if self.colors.len() == 1 {
            return self.colors[0];
        }
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let segments = self.colors.len() - 1;
        let segment = ((t * segments as f64).floor() as usize).min(segments - 1);
        let local = t * segments as f64 - segment as f64;
        lerp(self.colors[segment], self.colors[segment + 1], local)
    }
}

fn lerp(a: Rgba<u8>, b: Rgba<u8>, t: f64) -> Rgba<u8> {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Rgba([mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), mix(a[3], b[3])])
}

/// Category → color mapping for categorical shading
#[derive(Debug, Clone, PartialEq)]
pub struct ColorKey {
    entries: Vec<(String, Rgba<u8>)>,
}

impl ColorKey {
    /// The nine-class bivariate land/building value key
    pub fn bivariate() -> Self {
        Self {
            entries: BIVARIATE
                .iter()
                .filter_map(|(class, hex)| parse_hex(hex).ok().map(|c| (class.to_string(), c)))
                .collect(),
        }
    }

    pub fn categories(&self) -> Vec<String> {
        self.entries.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn color(&self, category: &str) -> Option<Rgba<u8>> {
        self.entries.iter().find(|(c, _)| c == category).map(|(_, color)| *color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#e8e8e8").unwrap(), Rgba([0xe8, 0xe8, 0xe8, 255]));
        assert_eq!(parse_hex("574249").unwrap(), Rgba([0x57, 0x42, 0x49, 255]));
        assert!(parse_hex("#zzzzzz").is_err());
        assert!(parse_hex("#fff").is_err());
    }

    #[test]
    fn test_builtin_ramps_complete() {
        assert_eq!(ColorRamp::greys9().colors.len(), 9);
        assert_eq!(ColorRamp::inferno().colors.len(), 10);
        assert_eq!(ColorRamp::viridis().colors.len(), 10);
        assert_eq!(ColorKey::bivariate().categories().len(), 9);
    }

    #[test]
    fn test_ramp_endpoints_and_midpoint() {
        let ramp = ColorRamp::new(vec![Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255])]).unwrap();
        assert_eq!(ramp.at(0.0), Rgba([0, 0, 0, 255]));
        assert_eq!(ramp.at(1.0), Rgba([255, 255, 255, 255]));
        let mid = ramp.at(0.5);
        assert!(mid[0] > 100 && mid[0] < 150);
        assert_eq!(ramp.at(7.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_reversed_ramp() {
        let ramp = ColorRamp::greys9().reversed();
        assert_eq!(ramp.at(0.0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_bivariate_low_low_is_light_grey() {
        let key = ColorKey::bivariate();
        assert_eq!(key.color("A1"), Some(Rgba([0xe8, 0xe8, 0xe8, 255])));
        assert_eq!(key.color("D4"), None);
    }

    #[test]
    fn test_unknown_ramp() {
        assert!(ColorRamp::from_name("rainbow").is_err());
        assert!(ColorRamp::from_name("Inferno").is_ok());
    }
}
