pub mod builder;

use std::collections::HashMap;

use image::GrayImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    algorithms::{clean_with, trace_with},
    calibration::ToleranceReport,
    config::PipelineConfig,
    error::{ChoroplethError, ConfigError, Result},
    georef::Georeferencer,
    merge::CategoryMerger,
    raster::ensure_non_empty,
    report::{CategoryFailure, CategoryReport, GeometryRejection, PipelineStage, RunOutcome, RunReport},
    traits::{ColorClassifier, ContourExtractor, MaskPreprocessor, ShapePostProcessor},
    types::{CategoryMask, CategoryShape, CategorySpec, ChoroplethMap, GeoPolygon, RasterImage},
};

/// Cleaned masks of one run, in legend order, plus the categories that failed
/// to classify or clean.
#[derive(Debug, Clone, Default)]
pub struct CleanedMasks {
    pub masks: Vec<CategoryMask>,
    pub failures: Vec<CategoryFailure>,
    /// Size of the cropped raster the masks were classified from
    pub width: u32,
    pub height: u32,
}

/// Polygons traced from one category mask.
#[derive(Debug, Clone, Default)]
pub struct VectorizedMask {
    pub shapes: Vec<CategoryShape>,
    pub rejections: Vec<GeometryRejection>,
}

/// Raster to georeferenced, per-category polygons.
pub struct Pipeline {
    config: PipelineConfig,
    georeferencer: Georeferencer,
    classifier: Box<dyn ColorClassifier>,
    preprocessors: Vec<Box<dyn MaskPreprocessor>>,
    contour_extractor: Box<dyn ContourExtractor>,
    postprocessors: Vec<Box<dyn ShapePostProcessor>>,
    merger: CategoryMerger,
    parallel: bool,
}

impl Pipeline {
    /// Start a builder with the default stages for `config`
    pub fn builder(config: PipelineConfig) -> builder::PipelineBuilder {
        builder::PipelineBuilder::new(config)
    }

    /// Validate `config` and assemble the default stages
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn georeferencer(&self) -> &Georeferencer {
        &self.georeferencer
    }

    /// Run every stage over `image` and merge the result.
    ///
    /// Only fatal input problems (empty raster, crop outside the raster) are
    /// returned as errors; per-category failures and dropped geometries are
    /// recorded in the report.
    pub fn process(&self, image: &RasterImage) -> Result<RunReport> {
        let raster = self.prepare(image)?;
        let (width, height) = raster.dimensions();
        info!(width, height, categories = self.config.categories.len(), "processing raster");

        let cleaned = self.clean_all(&raster);
        info!(
            masks = cleaned.masks.len(),
            failed = cleaned.failures.len(),
            "classified and cleaned masks"
        );

        Ok(self.process_masks(cleaned))
    }

    /// Vectorize, georeference and merge masks produced by [`Pipeline::masks`].
    pub fn process_masks(&self, cleaned: CleanedMasks) -> RunReport {
        let CleanedMasks {
            masks,
            mut failures,
            width,
            height,
        } = cleaned;

        let mut reports: Vec<CategoryReport> = self
            .config
            .categories
            .iter()
            .enumerate()
            .map(|(rank, category)| CategoryReport {
                name: category.name.clone(),
                rank,
                ..CategoryReport::default()
            })
            .collect();

        let mut shapes = Vec::new();
        let mut rejections = Vec::new();
        for mask in &masks {
            reports[mask.rank].mask_pixels = mask.pixel_count();
            match self.vectorize_mask(mask) {
                Ok(vectorized) => {
                    debug!(
                        category = %mask.category.name,
                        polygons = vectorized.shapes.len(),
                        rejected = vectorized.rejections.len(),
                        "vectorized"
                    );
                    reports[mask.rank].polygons = vectorized.shapes.len();
                    shapes.extend(vectorized.shapes);
                    rejections.extend(vectorized.rejections);
                }
                Err(err) => {
                    failures.push(self.record_failure(&mask.category, PipelineStage::Vectorize, &err));
                }
            }
        }
        info!(polygons = shapes.len(), rejected = rejections.len(), "vectorized masks");

        let geo_polygons: Vec<GeoPolygon> = shapes
            .iter()
            .map(|shape| self.georeferencer.georeference(shape, &self.config.categories[shape.rank]))
            .collect();

        let merged = self.merger.merge(geo_polygons);
        info!(
            features = merged.features.len(),
            rejected = merged.rejections.len(),
            "merged categories"
        );
        rejections.extend(merged.rejections);

        let mut feature_counts: HashMap<usize, usize> = HashMap::new();
        for feature in &merged.features {
            *feature_counts.entry(feature.rank).or_default() += 1;
        }
        for report in &mut reports {
            report.features = feature_counts.get(&report.rank).copied().unwrap_or(0);
            report.rejected = rejections.iter().filter(|r| r.category == report.name).count();
        }

        let failed: Vec<&str> = failures.iter().map(|f| f.category.as_str()).collect();
        let empty_categories: Vec<String> = reports
            .iter()
            .filter(|r| r.polygons == 0 && r.rejected == 0 && !failed.contains(&r.name.as_str()))
            .map(|r| r.name.clone())
            .collect();
        for name in &empty_categories {
            warn!(category = %name, "category produced no polygons");
        }

        let collection = ChoroplethMap {
            features: merged.features,
            bounding_box: *self.georeferencer.bounding_box(),
            image_width: width,
            image_height: height,
        };

        let outcome = if collection.is_empty() {
            warn!(rejected = rejections.len(), "run produced no polygons in any category");
            RunOutcome::Empty
        } else {
            RunOutcome::Completed
        };

        RunReport {
            collection,
            outcome,
            categories: reports,
            empty_categories,
            failures,
            rejections,
        }
    }

    /// Classified and cleaned masks of every category, without vectorizing.
    pub fn masks(&self, image: &RasterImage) -> Result<CleanedMasks> {
        let raster = self.prepare(image)?;
        let masks = self.clean_all(&raster);

        for mask in &masks.masks {
            info!(category = %mask.category.name, pixels = mask.pixel_count(), "cleaned mask");
        }
        if masks.masks.iter().all(|m| m.pixel_count() == 0) {
            warn!("no category matched any pixel; check the legend colors and tolerance");
        }

        Ok(masks)
    }

    /// Trace a cleaned mask into normalized polygons tagged with its rank.
    /// Traced rings that are not valid polygons come back as rejections.
    pub fn vectorize_mask(&self, mask: &CategoryMask) -> Result<VectorizedMask> {
        let (width, height) = mask.mask.dimensions();
        let (shapes, rejected) = trace_with(&mask.mask, self.contour_extractor.as_ref(), &self.postprocessors)?;

        let rejections = rejected
            .into_iter()
            .map(|reason| {
                warn!(category = %mask.category.name, %reason, "dropping invalid traced polygon");
                GeometryRejection {
                    category: mask.category.name.clone(),
                    stage: PipelineStage::Vectorize,
                    reason,
                }
            })
            .collect();

        let shapes = shapes
            .into_iter()
            .map(|shape| CategoryShape {
                rank: mask.rank,
                shape: shape.normalized(width, height),
            })
            .collect();

        Ok(VectorizedMask { shapes, rejections })
    }

    /// How one category responds to each of `tolerances`.
    pub fn sweep_tolerance(&self, image: &RasterImage, category: &str, tolerances: &[u8]) -> Result<Vec<ToleranceReport>> {
        let spec = self
            .config
            .categories
            .iter()
            .find(|c| c.name == category)
            .ok_or_else(|| ConfigError::InvalidParameter {
                name: "category",
                reason: format!("'{category}' is not in the legend"),
            })?;
        let raster = self.prepare(image)?;

        tolerances
            .iter()
            .map(|&tolerance| {
                let classified = self.classifier.classify(&raster, spec, tolerance)?;
                let cleaned = clean_with(&classified, &self.preprocessors)?;
                let (shapes, _) = trace_with(&cleaned, self.contour_extractor.as_ref(), &self.postprocessors)?;

                let report = ToleranceReport {
                    tolerance,
                    classified_pixels: count_set(&classified),
                    cleaned_pixels: count_set(&cleaned),
                    polygons: shapes.len(),
                };
                debug!(category, ?report, "tolerance sweep step");
                Ok(report)
            })
            .collect()
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let preprocessors: Vec<&str> = self.preprocessors.iter().map(|p| p.name()).collect();
        let postprocessors: Vec<&str> = self.postprocessors.iter().map(|p| p.name()).collect();
        format!(
            "Pipeline: {} categories, tolerance {}, clean [{}], vectorize [{}], merge tolerance {}, {}",
            self.config.categories.len(),
            self.config.tolerance,
            preprocessors.join(", "),
            postprocessors.join(", "),
            self.merger.simplify_tolerance,
            if self.parallel { "parallel" } else { "sequential" }
        )
    }

    fn prepare(&self, image: &RasterImage) -> Result<RasterImage> {
        ensure_non_empty(image)?;
        let raster = match &self.config.crop {
            Some(crop) => crop.apply(image)?,
            None => image.clone(),
        };
        ensure_non_empty(&raster)?;
        Ok(raster)
    }

    fn clean_all(&self, raster: &RasterImage) -> CleanedMasks {
        let run = |(rank, category): (usize, &CategorySpec)| self.clean_category(raster, rank, category);

        let results: Vec<std::result::Result<CategoryMask, CategoryFailure>> = if self.parallel {
            self.config.categories.par_iter().enumerate().map(run).collect()
        } else {
            self.config.categories.iter().enumerate().map(run).collect()
        };

        let (width, height) = raster.dimensions();
        let mut cleaned = CleanedMasks {
            width,
            height,
            ..CleanedMasks::default()
        };
        for result in results {
            match result {
                Ok(mask) => cleaned.masks.push(mask),
                Err(failure) => cleaned.failures.push(failure),
            }
        }
        cleaned
    }

    fn clean_category(
        &self,
        raster: &RasterImage,
        rank: usize,
        category: &CategorySpec,
    ) -> std::result::Result<CategoryMask, CategoryFailure> {
        let classified = self
            .classifier
            .classify(raster, category, self.config.tolerance_u8())
            .map_err(|err| self.record_failure(category, PipelineStage::Classify, &err))?;

        let cleaned = clean_with(&classified, &self.preprocessors)
            .map_err(|err| self.record_failure(category, PipelineStage::Clean, &err))?;

        if cleaned.dimensions() != raster.dimensions() {
            let err = ChoroplethError::ImageProcessing(format!(
                "cleaned mask is {:?}, raster is {:?}",
                cleaned.dimensions(),
                raster.dimensions()
            ));
            return Err(self.record_failure(category, PipelineStage::Clean, &err));
        }

        debug!(
            category = %category.name,
            classified = count_set(&classified),
            cleaned = count_set(&cleaned),
            "cleaned category mask"
        );

        Ok(CategoryMask {
            rank,
            category: category.clone(),
            mask: cleaned,
        })
    }

    fn record_failure(&self, category: &CategorySpec, stage: PipelineStage, err: &ChoroplethError) -> CategoryFailure {
        warn!(category = %category.name, %stage, error = %err, "skipping category");
        CategoryFailure {
            category: category.name.clone(),
            stage,
            message: err.to_string(),
        }
    }
}

fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
