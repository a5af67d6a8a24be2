use std::collections::HashMap;

use geo_types::{Coord, LineString, Polygon};
use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::georef::BoundingBox;

/// RGB raster consumed by the pipeline.
pub type RasterImage = image::RgbImage;

/// One legend entry: a named speed bucket and the colors that represent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategorySpec {
    /// Legend label, e.g. "25-49 Mbps"
    pub name: String,
    /// Reference color as it appears on the scanned map
    pub color: [u8; 3],
    /// Color written to the output features, as `#rrggbb`
    pub display_color: String,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, color: [u8; 3], display_color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color,
            display_color: display_color.into(),
        }
    }

    /// Inclusive per-channel bounds `[ref - t, ref + t]`, clamped to `0..=255`.
    pub fn channel_bounds(&self, tolerance: u8) -> ([u8; 3], [u8; 3]) {
        let lower = self.color.map(|c| c.saturating_sub(tolerance));
        let upper = self.color.map(|c| c.saturating_add(tolerance));
        (lower, upper)
    }
}

/// Binary mask (0 or 255 per pixel) tagged with the category it was classified for.
#[derive(Debug, Clone)]
pub struct CategoryMask {
    /// Position of the category in the legend
    pub rank: usize,
    pub category: CategorySpec,
    pub mask: GrayImage,
}

impl CategoryMask {
    /// Number of set pixels
    pub fn pixel_count(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] > 0).count()
    }
}

/// A simple polygon ring in image space, stored without the closing vertex.
///
/// Depending on the stage the coordinates are pixel positions or normalized
/// `[0, 1]` fractions of the raster size with the origin at the top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub exterior: Vec<[f64; 2]>,
}

impl Shape {
    pub fn new(exterior: Vec<[f64; 2]>) -> Self {
        Self { exterior }
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .exterior
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area in the units of the coordinates
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Length of the closed ring
    pub fn perimeter(&self) -> f64 {
        use geo::EuclideanLength;
        self.to_geo_polygon().exterior().euclidean_length()
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    /// Number of vertices after collapsing consecutive duplicates
    pub fn distinct_vertex_count(&self) -> usize {
        dedup_ring(&self.exterior).len()
    }

    /// Get the bounding box of the shape
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];

        for &[x, y] in &self.exterior {
            min[0] = min[0].min(x);
            min[1] = min[1].min(y);
            max[0] = max[0].max(x);
            max[1] = max[1].max(y);
        }

        (min, max)
    }

    /// Divide pixel coordinates by the raster size.
    pub fn normalized(&self, width: u32, height: u32) -> Shape {
        let (w, h) = (f64::from(width), f64::from(height));
        Shape::new(self.exterior.iter().map(|&[x, y]| [x / w, y / h]).collect())
    }

    /// Inverse of [`Shape::normalized`].
    pub fn denormalized(&self, width: u32, height: u32) -> Shape {
        let (w, h) = (f64::from(width), f64::from(height));
        Shape::new(self.exterior.iter().map(|&[x, y]| [x * w, y * h]).collect())
    }

    /// Why this ring is not a valid simple polygon, if it is not.
    pub fn validation_error(&self) -> Option<String> {
        ring_defect(&self.exterior)
    }

    /// Split a ring that passes through the same vertex more than once into
    /// its separate loops.
    ///
    /// Regions meeting only at a corner are traced as one ring through the
    /// shared vertex. The back-and-forth bridge between them, and any other
    /// loop with fewer than three distinct vertices, is discarded.
    pub fn split_loops(&self) -> Vec<Shape> {
        let key = |[x, y]: [f64; 2]| [x.to_bits(), y.to_bits()];

        let mut loops: Vec<Vec<[f64; 2]>> = Vec::new();
        let mut path: Vec<[f64; 2]> = Vec::new();
        let mut index: HashMap<[u64; 2], usize> = HashMap::new();

        for point in dedup_ring(&self.exterior) {
            match index.get(&key(point)) {
                Some(&start) => {
                    let closed: Vec<[f64; 2]> = path.drain(start + 1..).collect();
                    for vertex in &closed {
                        index.remove(&key(*vertex));
                    }
                    let mut ring = Vec::with_capacity(closed.len() + 1);
                    ring.push(point);
                    ring.extend(closed);
                    loops.push(ring);
                }
                None => {
                    index.insert(key(point), path.len());
                    path.push(point);
                }
            }
        }
        loops.push(path);

        loops
            .into_iter()
            .filter(|ring| dedup_ring(ring).len() >= 3)
            .map(Shape::new)
            .collect()
    }
}

/// Normalized polygon tagged with the legend position of its category.
#[derive(Debug, Clone)]
pub struct CategoryShape {
    pub rank: usize,
    pub shape: Shape,
}

/// Polygon in (longitude, latitude) tagged with its category.
#[derive(Debug, Clone)]
pub struct GeoPolygon {
    pub rank: usize,
    pub category: String,
    pub color: String,
    pub polygon: Polygon<f64>,
}

/// One output record of the merged map.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFeature {
    pub rank: usize,
    pub category: String,
    pub color: String,
    pub polygon: Polygon<f64>,
}

impl CategoryFeature {
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.polygon.unsigned_area()
    }
}

/// Merged, georeferenced result of one run.
#[derive(Debug, Clone)]
pub struct ChoroplethMap {
    pub features: Vec<CategoryFeature>,
    pub bounding_box: BoundingBox,
    /// Dimensions of the raster the polygons were traced from
    pub image_width: u32,
    pub image_height: u32,
}

impl ChoroplethMap {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features of one category, in output order
    pub fn features_for(&self, category: &str) -> impl Iterator<Item = &CategoryFeature> {
        self.features.iter().filter(move |f| f.category == category)
    }
}

fn dedup_ring(ring: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut points: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for &p in ring {
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn cross(u: [f64; 2], v: [f64; 2]) -> f64 {
    u[0] * v[1] - u[1] * v[0]
}

fn dot(u: [f64; 2], v: [f64; 2]) -> f64 {
    u[0] * v[0] + u[1] * v[1]
}

fn orientation(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> i8 {
    let value = cross(sub(b, a), sub(c, a));
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn on_segment(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0]) && p[0] <= a[0].max(b[0]) && p[1] >= a[1].min(b[1]) && p[1] <= a[1].max(b[1])
}

/// Closed-segment intersection test, touching endpoints included.
fn segments_intersect(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(a, b, c))
        || (o2 == 0 && on_segment(a, b, d))
        || (o3 == 0 && on_segment(c, d, a))
        || (o4 == 0 && on_segment(c, d, b))
}

/// Edges `u-s` and `s-w` fold back over each other.
fn is_spike(u: [f64; 2], s: [f64; 2], w: [f64; 2]) -> bool {
    let (su, sw) = (sub(u, s), sub(w, s));
    cross(su, sw) == 0.0 && dot(su, sw) > 0.0
}

fn ring_defect(ring: &[[f64; 2]]) -> Option<String> {
    if ring.iter().any(|&[x, y]| !x.is_finite() || !y.is_finite()) {
        return Some("non-finite coordinate".to_string());
    }

    let points = dedup_ring(ring);
    let n = points.len();
    if n < 3 {
        return Some(format!("only {n} distinct vertices"));
    }

    let twice_area: f64 = (0..n)
        .map(|i| cross(points[i], points[(i + 1) % n]))
        .sum();
    if twice_area.abs() <= 0.0 {
        return Some("zero enclosed area".to_string());
    }

    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        for j in (i + 1)..n {
            let (c, d) = (points[j], points[(j + 1) % n]);

            if j == i + 1 {
                if is_spike(a, b, d) {
                    return Some(format!("edges {i} and {j} overlap"));
                }
            } else if i == 0 && j == n - 1 {
                if is_spike(c, a, b) {
                    return Some(format!("edges {j} and {i} overlap"));
                }
            } else if segments_intersect(a, b, c, d) {
                return Some(format!("edges {i} and {j} intersect"));
            }
        }
    }

    None
}
