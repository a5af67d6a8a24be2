//! Per-category union of georeferenced polygons.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, Simplify};
use geo_types::{LineString, MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::{
    report::{GeometryRejection, PipelineStage},
    types::{CategoryFeature, GeoPolygon, Shape},
};

/// Unions all polygons of a category, then simplifies the merged boundary.
#[derive(Debug, Clone)]
pub struct CategoryMerger {
    /// Douglas-Peucker tolerance in degrees
    pub simplify_tolerance: f64,
}

impl Default for CategoryMerger {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.0001,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Ordered by legend rank, then by descending area
    pub features: Vec<CategoryFeature>,
    pub rejections: Vec<GeometryRejection>,
}

struct CategoryGroup {
    category: String,
    color: String,
    polygons: Vec<Polygon<f64>>,
}

fn ring_defect(ring: &LineString<f64>) -> Option<String> {
    Shape::new(ring.coords().map(|c| [c.x, c.y]).collect()).validation_error()
}

/// Validity of every ring of a polygon, checked ring by ring.
pub fn polygon_defect(polygon: &Polygon<f64>) -> Option<String> {
    if let Some(reason) = ring_defect(polygon.exterior()) {
        return Some(format!("exterior: {reason}"));
    }
    polygon
        .interiors()
        .iter()
        .enumerate()
        .find_map(|(i, ring)| ring_defect(ring).map(|reason| format!("interior {i}: {reason}")))
}

/// Pairwise union rounds until a single geometry remains.
fn cascade_union(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    if parts.is_empty() {
        return MultiPolygon::new(vec![]);
    }

    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }

    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

impl CategoryMerger {
    pub fn new(simplify_tolerance: f64) -> Self {
        Self { simplify_tolerance }
    }

    /// Simplify a merged part, keeping the unsimplified part when the result
    /// would no longer be a valid polygon.
    fn simplify_part(&self, part: Polygon<f64>) -> Polygon<f64> {
        if self.simplify_tolerance <= 0.0 {
            return part;
        }

        let simplified = part.simplify(&self.simplify_tolerance);
        if simplified.unsigned_area() > 0.0 && polygon_defect(&simplified).is_none() {
            simplified
        } else {
            part
        }
    }

    pub fn merge(&self, polygons: Vec<GeoPolygon>) -> MergeOutcome {
        let mut groups: BTreeMap<usize, CategoryGroup> = BTreeMap::new();
        let mut rejections = Vec::new();

        for polygon in polygons {
            if let Some(reason) = polygon_defect(&polygon.polygon) {
                warn!(category = %polygon.category, %reason, "dropping invalid polygon before union");
                rejections.push(GeometryRejection {
                    category: polygon.category,
                    stage: PipelineStage::Merge,
                    reason,
                });
                continue;
            }

            groups
                .entry(polygon.rank)
                .or_insert_with(|| CategoryGroup {
                    category: polygon.category.clone(),
                    color: polygon.color.clone(),
                    polygons: Vec::new(),
                })
                .polygons
                .push(polygon.polygon);
        }

        let mut features = Vec::new();
        for (rank, group) in groups {
            let inputs = group.polygons.len();
            let parts = group
                .polygons
                .into_iter()
                .map(|p| MultiPolygon::new(vec![p]))
                .collect();
            let merged = cascade_union(parts);

            let mut category_features: Vec<CategoryFeature> = merged
                .into_iter()
                .map(|part| self.simplify_part(part))
                .filter(|part| part.unsigned_area() > 0.0)
                .map(|polygon| CategoryFeature {
                    rank,
                    category: group.category.clone(),
                    color: group.color.clone(),
                    polygon,
                })
                .collect();

            category_features.sort_by(|a, b| b.area().total_cmp(&a.area()));
            debug!(
                category = %group.category,
                inputs,
                parts = category_features.len(),
                "merged category"
            );
            features.extend(category_features);
        }

        MergeOutcome {
            features,
            rejections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn tagged(rank: usize, polygon: Polygon<f64>) -> GeoPolygon {
        GeoPolygon {
            rank,
            category: format!("cat-{rank}"),
            color: "#000000".into(),
            polygon,
        }
    }

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn disjoint_polygons_stay_separate_parts() {
        let merged = CategoryMerger::default().merge(vec![
            tagged(0, square(0.0, 0.0, 0.01)),
            tagged(0, square(0.05, 0.05, 0.01)),
        ]);

        assert_eq!(merged.features.len(), 2);
        assert!(merged.features.iter().all(|f| f.category == "cat-0"));
        assert!(merged.rejections.is_empty());
    }

    #[test]
    fn overlapping_polygons_coalesce() {
        let merged = CategoryMerger::default().merge(vec![
            tagged(0, square(0.0, 0.0, 0.02)),
            tagged(0, square(0.01, 0.0, 0.02)),
        ]);

        assert_eq!(merged.features.len(), 1);
        assert!((merged.features[0].area() - 0.03 * 0.02).abs() < 1e-12);
    }

    #[test]
    fn touching_polygons_coalesce() {
        let merged = CategoryMerger::new(0.0).merge(vec![
            tagged(2, square(0.0, 0.0, 0.01)),
            tagged(2, square(0.01, 0.0, 0.01)),
        ]);

        assert_eq!(merged.features.len(), 1);
        assert!((merged.features[0].area() - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn categories_are_never_merged_together() {
        let merged = CategoryMerger::default().merge(vec![
            tagged(1, square(0.0, 0.0, 0.02)),
            tagged(0, square(0.01, 0.0, 0.02)),
        ]);

        let ranks: Vec<usize> = merged.features.iter().map(|f| f.rank).collect();
        assert_eq!(ranks, vec![0, 1]);
    }

    #[test]
    fn invalid_polygons_are_recorded_and_dropped() {
        let bow_tie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ];
        let merged = CategoryMerger::default().merge(vec![
            tagged(0, bow_tie),
            tagged(0, square(2.0, 2.0, 1.0)),
        ]);

        assert_eq!(merged.features.len(), 1);
        assert_eq!(merged.rejections.len(), 1);
        assert_eq!(merged.rejections[0].category, "cat-0");
        assert_eq!(merged.rejections[0].stage, PipelineStage::Merge);
    }

    #[test]
    fn simplification_removes_near_collinear_vertices() {
        let wobbly = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.005, y: 0.00002),
            (x: 0.01, y: 0.0),
            (x: 0.01, y: 0.01),
            (x: 0.0, y: 0.01),
        ];
        let merged = CategoryMerger::default().merge(vec![tagged(0, wobbly)]);

        // Closed ring of the four corners
        assert_eq!(merged.features[0].polygon.exterior().0.len(), 5);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let merged = CategoryMerger::default().merge(vec![]);
        assert!(merged.features.is_empty());
        assert!(merged.rejections.is_empty());
    }
}
