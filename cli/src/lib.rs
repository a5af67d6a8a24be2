use choropleth::{BoundingBox, CategoryTable, ConfigError, PipelineConfig};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapJobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Missing 'input_path' field")]
    MissingInput,
    #[error("Missing 'output_path' field")]
    MissingOutput,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
    #[error("Expected '{expected}', got '{value}'")]
    InvalidArgument { expected: &'static str, value: String },
}

/// One map to vectorize: where the raster comes from, where the GeoJSON goes,
/// and the full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MapJob {
    pub input_path: String,
    pub output_path: String,
    /// Directory for cleaned per-category mask PNGs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_dir: Option<String>,
    pub pipeline: PipelineConfig,
}

impl MapJob {
    /// Job using the starter legend and a placeholder extent; both are meant
    /// to be edited before the first run.
    pub fn skeleton(input_path: impl Into<String>, output_path: impl Into<String>) -> Result<Self, MapJobError> {
        let bbox = BoundingBox::new(-81.82, -81.55, 41.39, 41.60)?;
        Ok(Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            mask_dir: None,
            pipeline: PipelineConfig::new(CategoryTable::starter_legend(), bbox),
        })
    }

    pub fn validate(&self) -> Result<(), MapJobError> {
        if self.input_path.trim().is_empty() {
            return Err(MapJobError::MissingInput);
        }
        if self.output_path.trim().is_empty() {
            return Err(MapJobError::MissingOutput);
        }
        self.pipeline.validate()?;
        Ok(())
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, MapJobError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, MapJobError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, MapJobError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, MapJobError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the job
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MapJobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(MapJobError::UnsupportedFileFormat),
        }
    }

    /// Save with the format picked from the file extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MapJobError> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(MapJobError::UnsupportedFileFormat),
        };
        fs::write(path_ref, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, MapJobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, MapJobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MapJob)
    }
}

/// Parse `X,Y` pixel coordinates.
pub fn parse_point(value: &str) -> Result<(u32, u32), MapJobError> {
    let invalid = || MapJobError::InvalidArgument {
        expected: "X,Y",
        value: value.to_string(),
    };

    let (x, y) = value.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse().map_err(|_| invalid())?;
    let y = y.trim().parse().map_err(|_| invalid())?;
    Ok((x, y))
}

/// Parse a comma-separated tolerance list such as `20,40,60`.
pub fn parse_tolerances(value: &str) -> Result<Vec<u8>, MapJobError> {
    value
        .split(',')
        .map(|part| {
            part.trim().parse::<u8>().map_err(|_| MapJobError::InvalidArgument {
                expected: "comma-separated tolerances in 0..=255",
                value: value.to_string(),
            })
        })
        .collect()
}
