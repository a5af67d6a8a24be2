use std::collections::HashSet;

use image::{GrayImage, Luma};
use imageproc::{
    distance_transform::Norm,
    morphology,
    region_labelling::{connected_components, Connectivity},
};
use crate::{error::Result, traits::MaskPreprocessor};

/// Chebyshev radius of a square structuring element of the given side.
fn square_radius(kernel_size: u8) -> u8 {
    kernel_size / 2
}

/// Morphological closing (dilate then erode) with a square structuring element.
/// Bridges anti-aliased seams and thin gridlines crossing a region.
#[derive(Debug, Clone)]
pub struct ClosingPreprocessor {
    pub kernel_size: u8,
}

impl Default for ClosingPreprocessor {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

impl MaskPreprocessor for ClosingPreprocessor {
    fn preprocess(&self, mask: &GrayImage) -> Result<GrayImage> {
        Ok(morphology::close(mask, Norm::LInf, square_radius(self.kernel_size)))
    }

    fn name(&self) -> &'static str {
        "close"
    }
}

/// Morphological opening (erode then dilate) with a square structuring element.
/// Removes specks smaller than the element.
#[derive(Debug, Clone)]
pub struct OpeningPreprocessor {
    pub kernel_size: u8,
}

impl Default for OpeningPreprocessor {
    fn default() -> Self {
        Self { kernel_size: 5 }
    }
}

impl MaskPreprocessor for OpeningPreprocessor {
    fn preprocess(&self, mask: &GrayImage) -> Result<GrayImage> {
        Ok(morphology::open(mask, Norm::LInf, square_radius(self.kernel_size)))
    }

    fn name(&self) -> &'static str {
        "open"
    }
}

/// Fills every region enclosed by an external boundary.
///
/// An unset pixel is enclosed exactly when it cannot reach the raster border
/// through 4-connected unset pixels, which is the interior of the traced
/// 8-connected outer contours.
#[derive(Debug, Clone, Default)]
pub struct HoleFillPreprocessor;

impl MaskPreprocessor for HoleFillPreprocessor {
    fn preprocess(&self, mask: &GrayImage) -> Result<GrayImage> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Ok(mask.clone());
        }

        let background = GrayImage::from_fn(width, height, |x, y| {
            if mask.get_pixel(x, y).0[0] > 0 { Luma([0u8]) } else { Luma([255u8]) }
        });
        let labels = connected_components(&background, Connectivity::Four, Luma([0u8]));

        let mut outside: HashSet<u32> = HashSet::new();
        for x in 0..width {
            outside.insert(labels.get_pixel(x, 0).0[0]);
            outside.insert(labels.get_pixel(x, height - 1).0[0]);
        }
        for y in 0..height {
            outside.insert(labels.get_pixel(0, y).0[0]);
            outside.insert(labels.get_pixel(width - 1, y).0[0]);
        }

        Ok(GrayImage::from_fn(width, height, |x, y| {
            let label = labels.get_pixel(x, y).0[0];
            // Label 0 marks set pixels of the input.
            if label == 0 || !outside.contains(&label) { Luma([255u8]) } else { Luma([0u8]) }
        }))
    }

    fn name(&self) -> &'static str {
        "fill_holes"
    }
}
