//! Mapping from normalized image coordinates to WGS-84 longitude/latitude.
//!
//! The map is assumed to be drawn in an unprojected (plate carrée) frame, so
//! the transform is a pure axis-aligned affine map:
//!
//! ```text
//! lon = west  + x * (east  - west)
//! lat = north - y * (north - south)
//! ```
//!
//! with `y = 0` at the top edge of the raster.

use geo_types::{Coord, LineString, Polygon};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{CategorySpec, CategoryShape, GeoPolygon, Shape};

/// Geographic extent covered by the (cropped) raster, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Build a validated bounding box.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, ConfigError> {
        let bbox = Self {
            west,
            east,
            south,
            north,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.west < self.east && self.south < self.north;
        let finite = [self.west, self.east, self.south, self.north]
            .iter()
            .all(|v| v.is_finite());

        if ordered && finite {
            Ok(())
        } else {
            Err(ConfigError::InvalidBoundingBox {
                west: self.west,
                east: self.east,
                south: self.south,
                north: self.north,
            })
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// `[west, south, east, north]`, the GeoJSON `bbox` member order
    pub fn to_geojson_bbox(&self) -> Vec<f64> {
        vec![self.west, self.south, self.east, self.north]
    }
}

/// Applies the bounding-box affine map. Construction rejects malformed boxes,
/// so transforms themselves cannot fail.
#[derive(Debug, Clone, Copy)]
pub struct Georeferencer {
    bbox: BoundingBox,
}

impl Georeferencer {
    pub fn new(bbox: BoundingBox) -> Result<Self, ConfigError> {
        bbox.validate()?;
        Ok(Self { bbox })
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Normalized `(x, y)` to `(lon, lat)`.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = self.bbox.west + x * self.bbox.width();
        let lat = self.bbox.north - y * self.bbox.height();
        (lon, lat)
    }

    /// Inverse transform, `(lon, lat)` to normalized `(x, y)`.
    pub fn to_normalized(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon - self.bbox.west) / self.bbox.width();
        let y = (self.bbox.north - lat) / self.bbox.height();
        (x, y)
    }

    /// Transform every vertex of a normalized shape into a closed geographic polygon.
    pub fn georeference_shape(&self, shape: &Shape) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = shape
            .exterior
            .iter()
            .map(|&[x, y]| {
                let (lon, lat) = self.to_geographic(x, y);
                Coord { x: lon, y: lat }
            })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    pub fn georeference(&self, shape: &CategoryShape, category: &CategorySpec) -> GeoPolygon {
        GeoPolygon {
            rank: shape.rank,
            category: category.name.clone(),
            color: category.display_color.clone(),
            polygon: self.georeference_shape(&shape.shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleveland() -> BoundingBox {
        BoundingBox::new(-81.82, -81.55, 41.39, 41.60).unwrap()
    }

    #[test]
    fn corners_map_to_box_edges() {
        let geo = Georeferencer::new(cleveland()).unwrap();
        assert_eq!(geo.to_geographic(0.0, 0.0), (-81.82, 41.60));

        let (lon, lat) = geo.to_geographic(1.0, 1.0);
        assert!((lon - -81.55).abs() < 1e-12);
        assert!((lat - 41.39).abs() < 1e-12);
    }

    #[test]
    fn center_maps_to_midpoint() {
        let geo = Georeferencer::new(cleveland()).unwrap();
        let (lon, lat) = geo.to_geographic(0.5, 0.5);
        assert!((lon - -81.685).abs() < 1e-9);
        assert!((lat - 41.495).abs() < 1e-9);
    }

    #[test]
    fn inverse_round_trips() {
        let geo = Georeferencer::new(cleveland()).unwrap();
        let (lon, lat) = geo.to_geographic(0.25, 0.8);
        let (x, y) = geo.to_normalized(lon, lat);
        assert!((x - 0.25).abs() < 1e-9);
        assert!((y - 0.8).abs() < 1e-9);
    }

    #[test]
    fn malformed_boxes_are_rejected() {
        assert!(matches!(
            BoundingBox::new(-81.55, -81.82, 41.39, 41.60),
            Err(ConfigError::InvalidBoundingBox { .. })
        ));
        assert!(BoundingBox::new(-81.82, -81.55, 41.60, 41.60).is_err());
        assert!(BoundingBox::new(f64::NAN, -81.55, 41.39, 41.60).is_err());

        let raw = BoundingBox {
            west: 1.0,
            east: 0.0,
            south: 0.0,
            north: 1.0,
        };
        assert!(Georeferencer::new(raw).is_err());
    }

    #[test]
    fn shape_becomes_closed_polygon() {
        let geo = Georeferencer::new(BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap()).unwrap();
        let shape = Shape::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        let polygon = geo.georeference_shape(&shape);

        let coords: Vec<_> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
        assert_eq!(
            coords,
            vec![(0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0), (0.0, 10.0)]
        );
    }
}
