//! Versioned, explicit pipeline configuration.
//!
//! A run is fully described by one [`PipelineConfig`]: the legend table, the
//! color tolerance, the geographic extent of the map body and the stage
//! parameters. Configurations round-trip through TOML and JSON.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calibration::parse_hex;
use crate::error::{ConfigError, Result};
use crate::georef::BoundingBox;
use crate::raster::CropRegion;
use crate::types::CategorySpec;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_TOLERANCE: i32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Per-channel color tolerance, 0..=255
    #[serde(default = "default_tolerance")]
    pub tolerance: i32,
    /// Classify and clean categories on worker threads
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    pub bounding_box: BoundingBox,
    /// Region of the raster holding the map body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRegion>,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub vectorize: VectorizeConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    /// Legend entries, slowest first; the position is the legend rank
    pub categories: Vec<CategorySpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CleaningConfig {
    /// Side of the square structuring element, in pixels
    pub kernel_size: u8,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VectorizeConfig {
    /// Contours enclosing less than this many square pixels are dropped
    pub min_area: f64,
    /// Simplification tolerance as a fraction of each contour's perimeter
    pub simplify_ratio: f64,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            min_area: 100.0,
            simplify_ratio: 0.002,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MergeConfig {
    /// Simplification tolerance applied after union, in degrees
    pub simplify_tolerance: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.0001,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_tolerance() -> i32 {
    DEFAULT_TOLERANCE
}

fn default_parallel() -> bool {
    true
}

impl PipelineConfig {
    /// Configuration with default stage parameters.
    pub fn new(categories: Vec<CategorySpec>, bounding_box: BoundingBox) -> Self {
        Self {
            version: CONFIG_VERSION,
            tolerance: DEFAULT_TOLERANCE,
            parallel: true,
            bounding_box,
            crop: None,
            cleaning: CleaningConfig::default(),
            vectorize: VectorizeConfig::default(),
            merge: MergeConfig::default(),
            categories,
        }
    }

    /// Check every field; the first problem found is returned.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        self.bounding_box.validate()?;
        validate_categories(&self.categories)?;

        if self.tolerance < 0 {
            return Err(ConfigError::NegativeTolerance(self.tolerance));
        }
        if self.tolerance > 255 {
            return Err(ConfigError::ToleranceOutOfRange(self.tolerance));
        }

        if let Some(crop) = &self.crop {
            crop.validate()?;
        }

        let kernel = self.cleaning.kernel_size;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::InvalidKernelSize(kernel));
        }

        check_non_negative("vectorize.min_area", self.vectorize.min_area)?;
        check_non_negative("vectorize.simplify_ratio", self.vectorize.simplify_ratio)?;
        check_non_negative("merge.simplify_tolerance", self.merge.simplify_tolerance)?;

        Ok(())
    }

    /// Tolerance as a channel offset. Only meaningful after [`validate`](Self::validate).
    pub fn tolerance_u8(&self) -> u8 {
        self.tolerance.clamp(0, 255) as u8
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(ConfigError::UnsupportedFileFormat(path.display().to_string()).into()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(ConfigError::UnsupportedFileFormat(path.display().to_string()).into()),
        };
        fs::write(path, content)?;
        Ok(())
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }
}

fn check_non_negative(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a finite, non-negative number (got {value})"),
        })
    }
}

pub fn validate_categories(categories: &[CategorySpec]) -> std::result::Result<(), ConfigError> {
    if categories.is_empty() {
        return Err(ConfigError::EmptyCategories);
    }

    let mut seen = HashSet::new();
    for category in categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::EmptyCategoryName);
        }
        if !seen.insert(category.name.as_str()) {
            return Err(ConfigError::DuplicateCategory(category.name.clone()));
        }
        if parse_hex(&category.display_color).is_none() {
            return Err(ConfigError::InvalidDisplayColor {
                category: category.name.clone(),
                value: category.display_color.clone(),
            });
        }
    }

    Ok(())
}

/// Entry of a `sampled_colors.json` file written by the legend sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SampledColor {
    color: [u8; 3],
    hex: String,
}

/// Helpers for building legend tables.
pub struct CategoryTable;

impl CategoryTable {
    /// Five-bucket legend used when writing skeleton job files. The pipeline
    /// never falls back to it.
    pub fn starter_legend() -> Vec<CategorySpec> {
        vec![
            CategorySpec::new("0-9 Mbps", [187, 17, 34], "#bb1122"),
            CategorySpec::new("10-24 Mbps", [255, 123, 0], "#ff7b00"),
            CategorySpec::new("25-49 Mbps", [221, 221, 85], "#dddd55"),
            CategorySpec::new("50-100 Mbps", [89, 144, 59], "#59903b"),
            CategorySpec::new("100+ Mbps", [14, 140, 14], "#0e8c0e"),
        ]
    }

    /// Read `{ "<name>": {"color": [r, g, b], "hex": "#rrggbb"} }`.
    /// Object order is kept as the legend order.
    pub fn from_sampled_json(content: &str) -> Result<Vec<CategorySpec>> {
        let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;

        let mut categories = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let sampled: SampledColor = serde_json::from_value(value)?;
            categories.push(CategorySpec::new(name, sampled.color, sampled.hex));
        }

        validate_categories(&categories)?;
        Ok(categories)
    }

    /// Inverse of [`CategoryTable::from_sampled_json`].
    pub fn to_sampled_json(categories: &[CategorySpec]) -> Result<String> {
        let mut entries = serde_json::Map::new();
        for category in categories {
            let sampled = SampledColor {
                color: category.color,
                hex: category.display_color.clone(),
            };
            entries.insert(category.name.clone(), serde_json::to_value(sampled)?);
        }
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}
