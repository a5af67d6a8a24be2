//! Raster preparation: decoding a map image and isolating the map body.

use std::path::Path;

use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ChoroplethError, ConfigError, Result};

/// Rectangle of the raster that holds the map body (legend and header excluded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CropRegion {
    /// Edges as fractions of the raster height (top, bottom) and width (left, right)
    Fractional {
        top: f64,
        bottom: f64,
        left: f64,
        right: f64,
    },
    /// Explicit pixel rectangle
    Pixels {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

impl CropRegion {
    /// Shape checks that do not depend on the raster size.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match *self {
            CropRegion::Fractional {
                top,
                bottom,
                left,
                right,
            } => {
                let in_unit = |v: f64| (0.0..=1.0).contains(&v);
                if !(in_unit(top) && in_unit(bottom) && in_unit(left) && in_unit(right)) {
                    return Err(ConfigError::InvalidCrop(
                        "fractional edges must lie in [0, 1]".to_string(),
                    ));
                }
                if top >= bottom || left >= right {
                    return Err(ConfigError::InvalidCrop(format!(
                        "need top < bottom and left < right (got top={top}, bottom={bottom}, left={left}, right={right})"
                    )));
                }
                Ok(())
            }
            CropRegion::Pixels { width, height, .. } => {
                if width == 0 || height == 0 {
                    return Err(ConfigError::InvalidCrop(
                        "pixel rectangle must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Resolve to `(x, y, width, height)` in pixels for a raster of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> std::result::Result<(u32, u32, u32, u32), ConfigError> {
        self.validate()?;

        let (x, y, w, h) = match *self {
            CropRegion::Fractional {
                top,
                bottom,
                left,
                right,
            } => {
                // Truncation matches how the crop fractions were calibrated.
                let x0 = (f64::from(width) * left) as u32;
                let x1 = (f64::from(width) * right) as u32;
                let y0 = (f64::from(height) * top) as u32;
                let y1 = (f64::from(height) * bottom) as u32;
                (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
            }
            CropRegion::Pixels {
                x,
                y,
                width: w,
                height: h,
            } => (x, y, w, h),
        };

        let fits = u64::from(x) + u64::from(w) <= u64::from(width)
            && u64::from(y) + u64::from(h) <= u64::from(height);
        if w == 0 || h == 0 || !fits {
            return Err(ConfigError::InvalidCrop(format!(
                "region {w}x{h} at ({x}, {y}) does not fit a {width}x{height} raster"
            )));
        }

        Ok((x, y, w, h))
    }

    pub fn apply(&self, image: &RgbImage) -> Result<RgbImage> {
        let (x, y, w, h) = self.to_pixels(image.width(), image.height())?;
        Ok(image::imageops::crop_imm(image, x, y, w, h).to_image())
    }
}

/// Decode an image file into an RGB raster, dropping any alpha channel.
pub fn load_raster<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let image = image::open(path)?;
    Ok(image.to_rgb8())
}

/// Decode an in-memory encoded image into an RGB raster.
pub fn load_raster_from_bytes(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}

pub(crate) fn ensure_non_empty(image: &RgbImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ChoroplethError::ImageProcessing(format!(
            "raster is empty ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn fractional_crop_truncates() {
        let crop = CropRegion::Fractional {
            top: 0.25,
            bottom: 0.88,
            left: 0.08,
            right: 0.70,
        };
        assert_eq!(crop.to_pixels(1000, 800).unwrap(), (80, 200, 620, 504));
    }

    #[test]
    fn crop_keeps_the_selected_pixels() {
        let image = RgbImage::from_fn(10, 10, |x, y| Rgb([x as u8, y as u8, 0]));
        let crop = CropRegion::Pixels {
            x: 2,
            y: 3,
            width: 4,
            height: 5,
        };

        let cropped = crop.apply(&image).unwrap();
        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([2, 3, 0]));
        assert_eq!(cropped.get_pixel(3, 4), &Rgb([5, 7, 0]));
    }

    #[test]
    fn crop_outside_raster_is_rejected() {
        let image = RgbImage::new(10, 10);
        let crop = CropRegion::Pixels {
            x: 8,
            y: 0,
            width: 4,
            height: 4,
        };
        assert!(matches!(
            crop.apply(&image),
            Err(ChoroplethError::Config(ConfigError::InvalidCrop(_)))
        ));
    }

    #[test]
    fn inverted_fractions_are_rejected() {
        let crop = CropRegion::Fractional {
            top: 0.8,
            bottom: 0.2,
            left: 0.0,
            right: 1.0,
        };
        assert!(crop.validate().is_err());
    }

    #[test]
    fn empty_raster_is_reported() {
        assert!(ensure_non_empty(&RgbImage::new(0, 5)).is_err());
        assert!(ensure_non_empty(&RgbImage::new(1, 1)).is_ok());
    }
}
