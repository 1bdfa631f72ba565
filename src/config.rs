use crate::classify::{Color, Palette};
use crate::types::AttributeSet;
use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub transitions: TransitionConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub tabular: PathBuf,
    /// Enumeration units (TopoJSON, GeoJSON or shapefile).
    pub regions: PathBuf,
    /// Context layer drawn behind the regions.
    pub background: PathBuf,
    /// Topology object holding the regions; the first object when unset.
    #[serde(default)]
    pub regions_object: Option<String>,
    #[serde(default)]
    pub background_object: Option<String>,
    pub join_key: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    pub attributes: Vec<String>,
}

fn default_name_field() -> String {
    "name".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Longitude, latitude in degrees.
    pub center: [f64; 2],
    pub parallels: [f64; 2],
    pub scale: f64,
    /// Pixel position of the center; the canvas middle when unset.
    pub translate: Option<[f64; 2]>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            center: [-3.7, 40.2],
            parallels: [36.0, 44.0],
            scale: 2000.0,
            translate: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 473.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub width: f64,
    pub height: f64,
    pub left_padding: f64,
    pub right_padding: f64,
    pub top_bottom_padding: f64,
    /// Horizontal gap between bars.
    pub gutter: f64,
    /// Upper bound of the value axis; derived from the data when unset.
    pub y_max: Option<f64>,
    /// `{attribute}` is replaced with the expressed attribute.
    pub title: String,
    pub ticks: usize,
}

impl ChartConfig {
    pub fn inner_width(&self) -> f64 {
        self.width - self.left_padding - self.right_padding
    }

    pub fn inner_height(&self) -> f64 {
        self.height - self.top_bottom_padding * 2.0
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 816.0,
            height: 473.0,
            left_padding: 25.0,
            right_padding: 2.0,
            top_bottom_padding: 5.0,
            gutter: 1.0,
            y_max: None,
            title: "Number of {attribute} in each region".to_string(),
            ticks: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    pub palette: Vec<String>,
    pub background_fill: String,
    pub region_stroke: String,
    pub region_stroke_width: f64,
    pub highlight_stroke: String,
    pub highlight_stroke_width: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default()
                .colors()
                .iter()
                .map(Color::to_string)
                .collect(),
            background_fill: "#e8e8e8".to_string(),
            region_stroke: "#000".to_string(),
            region_stroke_width: 0.5,
            highlight_stroke: "#00f".to_string(),
            highlight_stroke_width: 2.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransitionConfig {
    pub map_duration_ms: u64,
    pub bar_duration_ms: u64,
    /// Per-rank delay that makes the bar re-sort cascade.
    pub bar_stagger_ms: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            map_duration_ms: 1000,
            bar_duration_ms: 500,
            bar_stagger_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
        }
    }
}

/// Styles resolved from hex strings once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub palette: Palette,
    pub background_fill: Color,
    pub region_stroke: Color,
    pub region_stroke_width: f64,
    pub highlight_stroke: Color,
    pub highlight_stroke_width: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            background_fill: Color::rgb(0xe8, 0xe8, 0xe8),
            region_stroke: Color::BLACK,
            region_stroke_width: 0.5,
            highlight_stroke: Color::BLUE,
            highlight_stroke_width: 2.0,
        }
    }
}

impl StyleConfig {
    pub fn theme(&self) -> Result<Theme> {
        let parse = |field: &str, hex: &str| {
            Color::parse(hex).with_context(|| format!("Invalid color for style.{field}"))
        };
        Ok(Theme {
            palette: Palette::from_hex(self.palette.as_slice()).context("Invalid style.palette")?,
            background_fill: parse("background_fill", &self.background_fill)?,
            region_stroke: parse("region_stroke", &self.region_stroke)?,
            region_stroke_width: self.region_stroke_width,
            highlight_stroke: parse("highlight_stroke", &self.highlight_stroke)?,
            highlight_stroke_width: self.highlight_stroke_width,
        })
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn attribute_set(&self) -> Result<AttributeSet> {
        AttributeSet::new(self.data.attributes.iter().cloned())
            .map_err(|e| anyhow!("Invalid data.attributes: {e}"))
    }

    pub fn validate(&self) -> Result<()> {
        self.attribute_set()?;
        self.style.theme()?;
        ensure!(!self.data.join_key.is_empty(), "data.join_key must not be empty");
        ensure!(
            self.map.width > 0.0 && self.map.height > 0.0,
            "map dimensions must be positive"
        );
        ensure!(
            self.chart.inner_width() > 0.0 && self.chart.inner_height() > 0.0,
            "chart dimensions must leave room inside the padding"
        );
        ensure!(self.projection.scale > 0.0, "projection.scale must be positive");
        if let Some(y_max) = self.chart.y_max {
            ensure!(y_max > 0.0, "chart.y_max must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [data]
        tabular = "data/regions.csv"
        regions = "data/regions.geojson"
        background = "data/countries.geojson"
        join_key = "adm1_code"
        attributes = ["var1", "var2"]
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.data.name_field, "name");
        assert_eq!(config.data.regions_object, None);
        assert_eq!(config.transitions.map_duration_ms, 1000);
        assert_eq!(config.chart.inner_height(), 463.0);
        let theme = config.style.theme().unwrap();
        assert_eq!(theme, Theme::default());
    }

    #[test]
    fn topology_objects_are_read_per_source() {
        let toml = MINIMAL.replace(
            "[data]\n",
            "[data]\nregions_object = \"Spain_correct\"\nbackground_object = \"EuropeCountries\"\n",
        );
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.data.regions_object.as_deref(), Some("Spain_correct"));
        assert_eq!(config.data.background_object.as_deref(), Some("EuropeCountries"));
    }

    #[test]
    fn rejects_duplicate_attributes() {
        let toml = MINIMAL.replace(r#"["var1", "var2"]"#, r#"["var1", "var1"]"#);
        assert!(AppConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn rejects_short_palette() {
        let toml = format!("{MINIMAL}\n[style]\npalette = [\"#fff\"]\n");
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(format!("{err:#}").contains("palette"));
    }
}
