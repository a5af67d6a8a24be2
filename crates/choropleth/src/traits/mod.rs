use image::GrayImage;
use crate::{
    error::Result,
    types::{CategorySpec, RasterImage, Shape},
};

/// Trait for color classification algorithms
pub trait ColorClassifier: Send + Sync {
    /// Produce a binary mask (0/255) of the pixels belonging to `category`
    fn classify(&self, image: &RasterImage, category: &CategorySpec, tolerance: u8) -> Result<GrayImage>;
}

/// Trait for binary mask cleanup steps (morphology, hole filling)
pub trait MaskPreprocessor: Send + Sync {
    /// Return the processed mask; dimensions must be preserved
    fn preprocess(&self, mask: &GrayImage) -> Result<GrayImage>;

    /// Short label used in pipeline descriptions
    fn name(&self) -> &'static str;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract region boundaries from a binary mask, in pixel coordinates
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Shape>>;
}

/// Trait for shape simplification algorithms
pub trait ShapeSimplifier: Send + Sync {
    /// Simplify the shapes by reducing point count
    fn simplify(&self, shapes: &mut [Shape]) -> Result<()>;
}

/// Trait for shape post-processing algorithms
///
/// Processors reject a shape by clearing its exterior; cleared shapes are
/// dropped once the chain has run.
pub trait ShapePostProcessor: Send + Sync {
    /// Post-process the extracted shapes and return the reasons for every
    /// shape dropped as invalid geometry. Shapes dropped as noise are not
    /// reported.
    fn process(&self, shapes: &mut [Shape]) -> Result<Vec<String>>;

    /// Short label used in pipeline descriptions
    fn name(&self) -> &'static str;
}
