//! # Choropleth Map Vectorization
//!
//! Turns a scanned choropleth map (broadband speed by area) into
//! georeferenced, per-category polygons.
//!
//! ## Stages
//!
//! - **Classify**: per-channel color tolerance around each legend color
//! - **Clean**: morphological closing, opening and hole filling
//! - **Vectorize**: external contours, area filter, perimeter-scaled simplification
//! - **Georeference**: affine map from the normalized raster onto a bounding box
//! - **Merge**: per-category union and boundary simplification
//!
//! Every stage is a trait with a default implementation; [`PipelineBuilder`]
//! swaps or appends stages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use choropleth::{load_raster, BoundingBox, CategoryTable, Pipeline, PipelineConfig};
//!
//! let bbox = BoundingBox::new(-81.82, -81.55, 41.39, 41.60)?;
//! let config = PipelineConfig::new(CategoryTable::starter_legend(), bbox);
//! let pipeline = Pipeline::from_config(config)?;
//!
//! let raster = load_raster("map.png")?;
//! let report = pipeline.process(&raster)?;
//! report.collection.save_geojson("map.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithms;
pub mod calibration;
pub mod config;
pub mod error;
pub mod georef;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod traits;
pub mod typed_geojson;
pub mod types;

pub use algorithms::*;
pub use calibration::{parse_hex, sample_color, to_hex, ToleranceReport};
pub use config::{CategoryTable, CleaningConfig, MergeConfig, PipelineConfig, VectorizeConfig};
pub use error::{ChoroplethError, ConfigError, Result};
pub use georef::{BoundingBox, Georeferencer};
pub use io::CRS84;
pub use merge::{CategoryMerger, MergeOutcome};
pub use pipeline::{builder::PipelineBuilder, CleanedMasks, Pipeline, VectorizedMask};
pub use raster::{load_raster, load_raster_from_bytes, CropRegion};
pub use report::{CategoryFailure, CategoryReport, GeometryRejection, PipelineStage, RunOutcome, RunReport};
pub use traits::*;
pub use typed_geojson::{CategoryProperties, ChoroplethGeoJson, TypedFeature, TypedFeatureCollection, TypedGeoJson};
pub use types::*;

#[cfg(test)]
mod scenarios {
    use super::*;
    use image::{GrayImage, Rgb, RgbImage};

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: [u8; 3] = [187, 17, 34];
    const GREEN: [u8; 3] = [14, 140, 14];

    fn unit_box() -> BoundingBox {
        BoundingBox::new(0.0, 1.0, 0.0, 1.0).unwrap()
    }

    fn config(categories: Vec<CategorySpec>) -> PipelineConfig {
        let mut config = PipelineConfig::new(categories, unit_box());
        config.tolerance = 10;
        config
    }

    fn category(name: &str, color: [u8; 3]) -> CategorySpec {
        CategorySpec::new(name, color, to_hex(color))
    }

    fn paint(image: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, Rgb(color));
            }
        }
    }

    #[test]
    fn uniform_raster_yields_one_unit_square() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let image = RgbImage::from_pixel(100, 100, Rgb(RED));

        let masks = pipeline.masks(&image).unwrap();
        let shapes = pipeline.vectorize_mask(&masks.masks[0]).unwrap().shapes;
        assert_eq!(shapes.len(), 1);

        let mut corners = shapes[0].shape.exterior.clone();
        assert!(corners.len() >= 3);
        corners.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        for (corner, target) in corners.iter().zip(expected.iter()) {
            assert!((corner[0] - target[0]).abs() <= 0.02, "{corner:?} vs {target:?}");
            assert!((corner[1] - target[1]).abs() <= 0.02, "{corner:?} vs {target:?}");
        }

        let report = pipeline.process(&image).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.collection.features.len(), 1);
        assert!((report.collection.features[0].area() - 0.99 * 0.99).abs() < 1e-3);
        assert!(report.is_clean());
    }

    #[test]
    fn empty_category_completes_without_error() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let image = RgbImage::from_pixel(100, 100, WHITE);

        let report = pipeline.process(&image).unwrap();
        assert_eq!(report.outcome, RunOutcome::Empty);
        assert!(report.collection.is_empty());
        assert_eq!(report.empty_categories, vec!["X".to_string()]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn disjoint_regions_become_two_records_of_one_category() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let mut image = RgbImage::from_pixel(100, 100, WHITE);
        paint(&mut image, 10, 10, 30, 30, RED);
        paint(&mut image, 60, 60, 80, 80, RED);

        let report = pipeline.process(&image).unwrap();
        let features: Vec<&CategoryFeature> = report.collection.features_for("X").collect();
        assert_eq!(features.len(), 2);
        assert_eq!(report.category("X").unwrap().polygons, 2);
        assert_eq!(report.category("X").unwrap().features, 2);
    }

    #[test]
    fn categories_keep_legend_order_and_georeference() {
        let bbox = BoundingBox::new(-81.82, -81.55, 41.39, 41.60).unwrap();
        let mut config = PipelineConfig::new(vec![category("slow", RED), category("fast", GREEN)], bbox);
        config.tolerance = 10;
        let pipeline = Pipeline::from_config(config).unwrap();

        let mut image = RgbImage::from_pixel(200, 100, WHITE);
        paint(&mut image, 0, 0, 100, 100, GREEN);
        paint(&mut image, 100, 0, 200, 100, RED);

        let report = pipeline.process(&image).unwrap();
        let names: Vec<&str> = report.collection.features.iter().map(|f| f.category.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);

        for feature in &report.collection.features {
            for coord in feature.polygon.exterior().coords() {
                assert!((-81.82..=-81.55).contains(&coord.x));
                assert!((41.39..=41.60).contains(&coord.y));
            }
        }
        // The fast block sits on the western half of the map.
        let fast = report.collection.features_for("fast").next().unwrap();
        assert!(fast.polygon.exterior().coords().all(|c| c.x < -81.68));
    }

    #[test]
    fn invalid_configuration_is_rejected_before_processing() {
        let mut bad_box = config(vec![category("X", RED)]);
        bad_box.bounding_box.east = bad_box.bounding_box.west;
        assert!(matches!(
            Pipeline::from_config(bad_box),
            Err(ChoroplethError::Config(ConfigError::InvalidBoundingBox { .. }))
        ));

        let mut negative = config(vec![category("X", RED)]);
        negative.tolerance = -1;
        assert!(matches!(
            Pipeline::from_config(negative),
            Err(ChoroplethError::Config(ConfigError::NegativeTolerance(-1)))
        ));

        assert!(matches!(
            Pipeline::from_config(config(vec![])),
            Err(ChoroplethError::Config(ConfigError::EmptyCategories))
        ));
    }

    struct FailsFor(&'static str);

    impl ColorClassifier for FailsFor {
        fn classify(&self, image: &RasterImage, category: &CategorySpec, tolerance: u8) -> Result<GrayImage> {
            if category.name == self.0 {
                return Err(ChoroplethError::ImageProcessing("sensor glitch".into()));
            }
            ChannelRangeClassifier.classify(image, category, tolerance)
        }
    }

    #[test]
    fn failing_category_is_recorded_and_skipped() {
        let pipeline = Pipeline::builder(config(vec![category("slow", RED), category("fast", GREEN)]))
            .with_classifier(FailsFor("slow"))
            .build()
            .unwrap();
        let image = RgbImage::from_pixel(100, 100, Rgb(GREEN));

        let report = pipeline.process(&image).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, "slow");
        assert_eq!(report.failures[0].stage, PipelineStage::Classify);
        assert!(report.empty_categories.is_empty());
        assert_eq!(report.collection.features_for("fast").count(), 1);
    }

    #[test]
    fn overlapping_tolerances_keep_both_masks() {
        let pipeline = Pipeline::from_config(config(vec![
            category("a", [100, 100, 100]),
            category("b", [110, 110, 110]),
        ]))
        .unwrap();
        let image = RgbImage::from_pixel(50, 50, Rgb([105, 105, 105]));

        let masks = pipeline.masks(&image).unwrap();
        assert_eq!(masks.masks.len(), 2);
        assert!(masks.masks.iter().all(|m| m.pixel_count() == 2500));
    }

    #[test]
    fn crop_limits_the_processed_area() {
        let mut config = config(vec![category("X", RED)]);
        config.crop = Some(CropRegion::Pixels {
            x: 50,
            y: 0,
            width: 50,
            height: 100,
        });
        let pipeline = Pipeline::from_config(config).unwrap();

        let mut image = RgbImage::from_pixel(100, 100, WHITE);
        paint(&mut image, 0, 0, 40, 100, RED);

        let report = pipeline.process(&image).unwrap();
        assert_eq!(report.collection.image_width, 50);
        assert_eq!(report.outcome, RunOutcome::Empty);

        let too_big = RgbImage::from_pixel(60, 60, WHITE);
        assert!(pipeline.process(&too_big).is_err());
    }

    #[test]
    fn diagonally_touching_blocks_become_two_records() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let mut image = RgbImage::from_pixel(100, 100, WHITE);
        paint(&mut image, 10, 10, 40, 40, RED);
        paint(&mut image, 40, 40, 70, 70, RED);

        let report = pipeline.process(&image).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.collection.features.len(), 2);
        assert!(report.empty_categories.is_empty());
        assert!(report.is_clean());
        for feature in &report.collection.features {
            assert!((feature.area() - 0.29 * 0.29).abs() < 1e-3);
        }
    }

    /// Traces one self-crossing ring whatever the mask holds.
    struct CrossedRing;

    impl ContourExtractor for CrossedRing {
        fn extract_contours(&self, _mask: &GrayImage) -> Result<Vec<Shape>> {
            Ok(vec![Shape::new(vec![[0.0, 0.0], [80.0, 80.0], [80.0, 0.0], [0.0, 40.0]])])
        }
    }

    #[test]
    fn invalid_traced_polygon_is_reported_not_empty() {
        let pipeline = Pipeline::builder(config(vec![category("X", RED)]))
            .set_contour_extractor(CrossedRing)
            .build()
            .unwrap();
        let image = RgbImage::from_pixel(100, 100, Rgb(RED));

        let report = pipeline.process(&image).unwrap();
        assert!(report.collection.is_empty());
        assert!(report.empty_categories.is_empty());
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].category, "X");
        assert_eq!(report.rejections[0].stage, PipelineStage::Vectorize);
        assert!(report.rejections[0].reason.contains("intersect"));
        assert_eq!(report.category("X").unwrap().rejected, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn reused_masks_give_the_same_report() {
        let mut config = config(vec![category("slow", RED), category("fast", GREEN)]);
        config.crop = Some(CropRegion::Pixels {
            x: 0,
            y: 0,
            width: 100,
            height: 70,
        });
        let pipeline = Pipeline::from_config(config).unwrap();
        let mut image = RgbImage::from_pixel(120, 80, WHITE);
        paint(&mut image, 5, 5, 50, 70, RED);
        paint(&mut image, 60, 10, 115, 60, GREEN);

        let masks = pipeline.masks(&image).unwrap();
        assert_eq!((masks.width, masks.height), (100, 70));

        let reused = pipeline.process_masks(masks);
        let direct = pipeline.process(&image).unwrap();
        assert_eq!(reused.collection.features, direct.collection.features);
        assert_eq!(reused.collection.image_width, 100);
        assert_eq!(reused.collection.image_height, 70);
        assert_eq!(reused.categories, direct.categories);
    }

    #[test]
    fn empty_raster_is_fatal() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        assert!(pipeline.process(&RgbImage::new(0, 0)).is_err());
    }

    #[test]
    fn sequential_and_parallel_runs_agree() {
        let categories = vec![category("slow", RED), category("fast", GREEN)];
        let mut image = RgbImage::from_pixel(120, 80, WHITE);
        paint(&mut image, 5, 5, 50, 70, RED);
        paint(&mut image, 60, 10, 115, 60, GREEN);

        let parallel = Pipeline::from_config(config(categories.clone())).unwrap();
        let sequential = Pipeline::builder(config(categories)).with_parallelism(false).build().unwrap();

        let a = parallel.process(&image).unwrap();
        let b = sequential.process(&image).unwrap();
        assert_eq!(a.collection.features, b.collection.features);
        assert_eq!(a.categories, b.categories);
    }

    #[test]
    fn tolerance_sweep_reports_each_step() {
        let pipeline = Pipeline::from_config(config(vec![category("X", [200, 200, 200])])).unwrap();
        let mut image = RgbImage::from_pixel(60, 60, WHITE);
        paint(&mut image, 10, 10, 50, 50, [210, 210, 210]);

        let sweep = pipeline.sweep_tolerance(&image, "X", &[5, 20, 60]).unwrap();
        assert_eq!(sweep.len(), 3);
        assert_eq!(sweep[0].classified_pixels, 0);
        assert_eq!(sweep[1].classified_pixels, 1600);
        assert_eq!(sweep[1].polygons, 1);
        assert_eq!(sweep[2].classified_pixels, 3600);

        assert!(pipeline.sweep_tolerance(&image, "missing", &[10]).is_err());
    }

    #[test]
    fn written_map_reads_back() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let mut image = RgbImage::from_pixel(100, 100, WHITE);
        paint(&mut image, 10, 10, 30, 30, RED);

        let report = pipeline.process(&image).unwrap();
        let text = report.collection.to_geojson_string().unwrap();
        let loaded = ChoroplethMap::from_geojson_string(&text).unwrap();
        assert_eq!(loaded.features, report.collection.features);
    }

    #[test]
    fn info_lists_stages() {
        let pipeline = Pipeline::from_config(config(vec![category("X", RED)])).unwrap();
        let info = pipeline.info();
        assert!(info.contains("close, open, fill_holes"));
        assert!(info.contains("min_area, simplify, validate"));
    }
}
