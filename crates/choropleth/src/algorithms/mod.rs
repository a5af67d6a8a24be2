pub mod classification;
pub mod cleaning;
pub mod extraction;
pub mod simplification;

pub use classification::*;
pub use cleaning::*;
pub use extraction::*;
pub use simplification::*;

use image::GrayImage;

use crate::{
    error::Result,
    traits::{ContourExtractor, MaskPreprocessor, ShapePostProcessor},
    types::Shape,
};

/// Run a mask through a cleaning chain, in order.
pub(crate) fn clean_with(mask: &GrayImage, preprocessors: &[Box<dyn MaskPreprocessor>]) -> Result<GrayImage> {
    let mut cleaned = mask.clone();
    for preprocessor in preprocessors {
        cleaned = preprocessor.preprocess(&cleaned)?;
    }
    Ok(cleaned)
}

/// Trace a cleaned mask and apply the shape chain; cleared shapes are dropped.
/// Returns the kept shapes and the reasons for shapes rejected as invalid.
pub(crate) fn trace_with(
    cleaned: &GrayImage,
    extractor: &dyn ContourExtractor,
    postprocessors: &[Box<dyn ShapePostProcessor>],
) -> Result<(Vec<Shape>, Vec<String>)> {
    let mut shapes = extractor.extract_contours(cleaned)?;
    let mut rejected = Vec::new();
    for postprocessor in postprocessors {
        rejected.extend(postprocessor.process(&mut shapes)?);
    }
    shapes.retain(|shape| !shape.is_empty());
    Ok((shapes, rejected))
}
