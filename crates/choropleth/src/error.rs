use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChoroplethError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// Problems that must abort a run before any pixel is processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("bounding box requires west < east and south < north (got west={west}, east={east}, south={south}, north={north})")]
    InvalidBoundingBox {
        west: f64,
        east: f64,
        south: f64,
        north: f64,
    },

    #[error("at least one category is required")]
    EmptyCategories,

    #[error("category names must not be empty")]
    EmptyCategoryName,

    #[error("category '{0}' is declared more than once")]
    DuplicateCategory(String),

    #[error("tolerance must not be negative (got {0})")]
    NegativeTolerance(i32),

    #[error("tolerance must be at most 255 (got {0})")]
    ToleranceOutOfRange(i32),

    #[error("category '{category}' has invalid display color '{value}', expected #rrggbb")]
    InvalidDisplayColor { category: String, value: String },

    #[error("invalid crop region: {0}")]
    InvalidCrop(String),

    #[error("structuring element size must be odd and at least 1 (got {0})")]
    InvalidKernelSize(u8),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unsupported configuration version {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported file format for '{0}', use .toml or .json")]
    UnsupportedFileFormat(String),
}

pub type Result<T> = std::result::Result<T, ChoroplethError>;
