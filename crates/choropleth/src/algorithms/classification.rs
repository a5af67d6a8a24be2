use image::{GrayImage, Luma};
use crate::{
    error::{ChoroplethError, Result},
    traits::ColorClassifier,
    types::{CategorySpec, RasterImage},
};

/// Per-channel range classifier: a pixel belongs to a category when every
/// channel lies within `[ref - t, ref + t]`, clamped to `0..=255`.
#[derive(Debug, Clone, Default)]
pub struct ChannelRangeClassifier;

impl ColorClassifier for ChannelRangeClassifier {
    fn classify(&self, image: &RasterImage, category: &CategorySpec, tolerance: u8) -> Result<GrayImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ChoroplethError::ImageProcessing(format!(
                "cannot classify '{}' on an empty raster",
                category.name
            )));
        }

        let (lower, upper) = category.channel_bounds(tolerance);

        Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let pixel = image.get_pixel(x, y).0;
            let inside = (0..3).all(|i| lower[i] <= pixel[i] && pixel[i] <= upper[i]);
            if inside { Luma([255u8]) } else { Luma([0u8]) }
        }))
    }
}
