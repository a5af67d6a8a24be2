use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use crate::{error::Result, traits::ContourExtractor, types::Shape};

/// Outermost region boundaries only, via imageproc's border following.
/// Hole borders and regions nested inside holes are ignored. Regions that
/// touch only at a corner come back as separate rings.
#[derive(Debug, Clone, Default)]
pub struct ExternalContourExtractor;

impl ContourExtractor for ExternalContourExtractor {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Shape>> {
        let contours = find_contours::<i32>(mask);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .flat_map(|contour| {
                Shape::new(
                    contour
                        .points
                        .iter()
                        .map(|p| [f64::from(p.x), f64::from(p.y)])
                        .collect(),
                )
                .split_loops()
            })
            .collect();

        Ok(result)
    }
}
