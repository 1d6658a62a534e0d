// Library exports for tallyshade

pub mod aggregate;
pub mod bucket;
pub mod chart;
pub mod controller;
pub mod data;
pub mod datasets;
pub mod density;
pub mod error;
pub mod loader;
pub mod palette;
pub mod parser;
pub mod runtime;
pub mod scale;

pub use error::{Error, Result};

use scale::How;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(Error::Parse(format!("unknown output format '{}'", other))),
        }
    }
}

/// Size and format of static charts
#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

/// Overrides for density images. Unset fields fall back to the view's own defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DensityOptions {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub spread: Option<u32>,
    #[serde(default)]
    pub how: Option<How>,
    #[serde(default)]
    pub ramp: Option<String>,
    #[serde(default = "default_background")]
    pub background: String,
}

fn default_background() -> String { "black".to_string() }

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            spread: None,
            how: None,
            ramp: None,
            background: default_background(),
        }
    }
}

/// Contents of a `--config` file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub density: DensityOptions,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.render.width, 800);
        assert_eq!(config.render.format, OutputFormat::Png);
        assert_eq!(config.density.background, "black");
        assert!(config.density.spread.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_json(
            r#"{"render": {"width": 400, "type": "svg"}, "density": {"spread": 0, "how": "linear", "ramp": "viridis"}}"#,
        )
        .unwrap();
        assert_eq!(config.render.width, 400);
        assert_eq!(config.render.height, 600);
        assert_eq!(config.render.format, OutputFormat::Svg);
        assert_eq!(config.density.spread, Some(0));
        assert_eq!(config.density.how, Some(How::Linear));
        assert_eq!(config.density.ramp.as_deref(), Some("viridis"));
    }

    #[test]
    fn test_config_rejects_bad_json() {
        assert!(matches!(Config::from_json("{not json"), Err(Error::Json(_))));
    }
}
