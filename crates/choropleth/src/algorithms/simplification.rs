use geo_types::{Coord, LineString};
use tracing::trace;
use crate::{
    error::Result,
    traits::{ShapePostProcessor, ShapeSimplifier},
    types::Shape,
};

/// Douglas-Peucker simplification with a tolerance proportional to each
/// contour's closed perimeter, so large and small regions keep a comparable
/// share of their detail.
#[derive(Debug, Clone)]
pub struct PerimeterSimplifier {
    pub ratio: f64,
}

impl Default for PerimeterSimplifier {
    fn default() -> Self {
        Self { ratio: 0.002 }
    }
}

impl PerimeterSimplifier {
    fn simplify_ring(&self, ring: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
        use geo::Simplify;

        let mut coords: Vec<Coord<f64>> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
        coords.push(coords[0]);

        let simplified = LineString::new(coords).simplify(&epsilon);
        let mut points: Vec<[f64; 2]> = simplified.coords().map(|c| [c.x, c.y]).collect();

        // Drop the closing vertex again; shapes store open rings.
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points
    }
}

impl ShapeSimplifier for PerimeterSimplifier {
    fn simplify(&self, shapes: &mut [Shape]) -> Result<()> {
        for shape in shapes {
            if shape.exterior.len() < 3 {
                continue;
            }

            let epsilon = self.ratio * shape.perimeter();
            let before = shape.exterior.len();
            shape.exterior = self.simplify_ring(&shape.exterior, epsilon);
            trace!(before, after = shape.exterior.len(), epsilon, "simplified contour");
        }

        Ok(())
    }
}

impl ShapePostProcessor for PerimeterSimplifier {
    fn process(&self, shapes: &mut [Shape]) -> Result<Vec<String>> {
        self.simplify(shapes)?;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "simplify"
    }
}

/// Minimum area filter using geo crate's area calculation
#[derive(Debug, Clone)]
pub struct MinimumAreaFilter {
    pub min_area: f64,
}

impl Default for MinimumAreaFilter {
    fn default() -> Self {
        Self { min_area: 100.0 }
    }
}

impl ShapePostProcessor for MinimumAreaFilter {
    fn process(&self, shapes: &mut [Shape]) -> Result<Vec<String>> {
        for shape in shapes {
            if shape.area() < self.min_area {
                // Mark shape as invalid by clearing its points
                shape.exterior.clear();
            }
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "min_area"
    }
}

/// Rejects shapes that are not simple polygons: fewer than three distinct
/// vertices, zero area, non-finite coordinates or self-intersections.
#[derive(Debug, Clone, Default)]
pub struct GeometryValidator;

impl ShapePostProcessor for GeometryValidator {
    fn process(&self, shapes: &mut [Shape]) -> Result<Vec<String>> {
        let mut rejected = Vec::new();
        for shape in shapes {
            if shape.is_empty() {
                continue;
            }
            if let Some(reason) = shape.validation_error() {
                trace!(%reason, "dropping invalid polygon");
                shape.exterior.clear();
                rejected.push(reason);
            }
        }

        Ok(rejected)
    }

    fn name(&self) -> &'static str {
        "validate"
    }
}
