//! Run-level outcome: the merged map plus every non-fatal event of the run.

use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::types::ChoroplethMap;

/// Pipeline stage in which a per-category problem occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumIter, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Classify,
    Clean,
    Vectorize,
    Merge,
}

/// Whether the run found anything at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    /// At least one feature was produced
    Completed,
    /// Every stage ran, but no feature was produced. Polygons that were traced
    /// and then dropped as invalid are listed in the rejections.
    Empty,
}

/// A category that was skipped because one of its stages failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryFailure {
    pub category: String,
    pub stage: PipelineStage,
    pub message: String,
}

/// A polygon dropped because it is not a valid simple polygon, either right
/// after tracing (`Vectorize`) or before its category's union (`Merge`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryRejection {
    pub category: String,
    pub stage: PipelineStage,
    pub reason: String,
}

/// Per-category counters, in legend order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryReport {
    pub name: String,
    pub rank: usize,
    /// Set pixels after cleaning
    pub mask_pixels: usize,
    /// Image-space polygons kept by the vectorizer
    pub polygons: usize,
    /// Polygons dropped as invalid geometry, in any stage
    pub rejected: usize,
    /// Output records after merging
    pub features: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub collection: ChoroplethMap,
    pub outcome: RunOutcome,
    pub categories: Vec<CategoryReport>,
    /// Categories that ran but traced nothing, valid or not
    pub empty_categories: Vec<String>,
    pub failures: Vec<CategoryFailure>,
    pub rejections: Vec<GeometryRejection>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.outcome == RunOutcome::Empty
    }

    /// True when no category failed and no geometry was rejected
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.rejections.is_empty()
    }

    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Outcome: {} ({} features)\n",
            self.outcome,
            self.collection.features.len()
        ));

        for category in &self.categories {
            out.push_str(&format!(
                "  {}: {} pixels, {} polygons, {} features\n",
                category.name, category.mask_pixels, category.polygons, category.features
            ));
            if category.rejected > 0 {
                out.push_str(&format!("    {} invalid polygons dropped\n", category.rejected));
            }
        }
        for failure in &self.failures {
            out.push_str(&format!(
                "  failed {} at {}: {}\n",
                failure.category, failure.stage, failure.message
            ));
        }

        out
    }
}
