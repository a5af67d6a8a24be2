//! Offline helpers for deriving a legend table from a scanned map.

use image::RgbImage;
use serde::Serialize;

use crate::error::{ChoroplethError, Result};

/// Parse `#rrggbb` (case-insensitive, leading `#` required).
pub fn parse_hex(value: &str) -> Option<[u8; 3]> {
    let digits = value.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Format a color as lowercase `#rrggbb`.
pub fn to_hex(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Mean color of the `(2 * radius + 1)`² window centred on `(x, y)`, clipped
/// to the raster. Averaging over a small window smooths out print dithering.
pub fn sample_color(image: &RgbImage, x: u32, y: u32, radius: u32) -> Result<[u8; 3]> {
    if x >= image.width() || y >= image.height() {
        return Err(ChoroplethError::ImageProcessing(format!(
            "sample point ({x}, {y}) is outside the {}x{} raster",
            image.width(),
            image.height()
        )));
    }

    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = x.saturating_add(radius).min(image.width() - 1);
    let y1 = y.saturating_add(radius).min(image.height() - 1);

    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for py in y0..=y1 {
        for px in x0..=x1 {
            let pixel = image.get_pixel(px, py);
            for (sum, &value) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += u64::from(value);
            }
            count += 1;
        }
    }

    // Truncating mean, as integer casts of a float mean would give.
    Ok(sums.map(|sum| (sum / count) as u8))
}

/// How one category responds to a given tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceReport {
    pub tolerance: u8,
    /// Pixels matched by the classifier alone
    pub classified_pixels: usize,
    /// Pixels left after morphological cleanup and hole filling
    pub cleaned_pixels: usize,
    /// Polygons the vectorizer keeps from the cleaned mask
    pub polygons: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn hex_round_trip() {
        assert_eq!(parse_hex("#bb1122"), Some([0xbb, 0x11, 0x22]));
        assert_eq!(parse_hex("#FF7F00"), Some([255, 127, 0]));
        assert_eq!(to_hex([14, 140, 14]), "#0e8c0e");
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert_eq!(parse_hex("bb1122"), None);
        assert_eq!(parse_hex("#bb112"), None);
        assert_eq!(parse_hex("#gg1122"), None);
        assert_eq!(parse_hex("#bb11€"), None);
    }

    #[test]
    fn sample_averages_window() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        image.put_pixel(5, 5, Rgb([190, 100, 10]));

        // 3x3 window: eight pixels at 100 and one outlier
        assert_eq!(sample_color(&image, 5, 5, 1).unwrap(), [110, 100, 90]);
    }

    #[test]
    fn sample_clips_at_border() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        image.put_pixel(0, 0, Rgb([40, 40, 40]));

        // Window clipped to the 3x3 corner
        assert_eq!(sample_color(&image, 0, 0, 2).unwrap(), [4, 4, 4]);
        assert!(sample_color(&image, 4, 0, 2).is_err());
    }
}
