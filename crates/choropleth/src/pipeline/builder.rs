use crate::{
    algorithms::{
        ChannelRangeClassifier, ClosingPreprocessor, ExternalContourExtractor, GeometryValidator,
        HoleFillPreprocessor, MinimumAreaFilter, OpeningPreprocessor, PerimeterSimplifier,
    },
    config::PipelineConfig,
    error::Result,
    georef::Georeferencer,
    merge::CategoryMerger,
    pipeline::Pipeline,
    traits::{ColorClassifier, ContourExtractor, MaskPreprocessor, ShapePostProcessor},
};

/// Builder for creating processing pipelines with a fluent API.
///
/// Starts from the default stages configured by a [`PipelineConfig`]; stages
/// can be replaced or appended before [`build`](Self::build) validates the
/// configuration.
pub struct PipelineBuilder {
    config: PipelineConfig,
    classifier: Box<dyn ColorClassifier>,
    preprocessors: Vec<Box<dyn MaskPreprocessor>>,
    contour_extractor: Box<dyn ContourExtractor>,
    postprocessors: Vec<Box<dyn ShapePostProcessor>>,
    parallel: bool,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        let kernel_size = config.cleaning.kernel_size;
        let vectorize = config.vectorize;
        let parallel = config.parallel;

        Self {
            config,
            classifier: Box::new(ChannelRangeClassifier),
            preprocessors: vec![
                Box::new(ClosingPreprocessor { kernel_size }),
                Box::new(OpeningPreprocessor { kernel_size }),
                Box::new(HoleFillPreprocessor),
            ],
            contour_extractor: Box::new(ExternalContourExtractor),
            postprocessors: vec![
                Box::new(MinimumAreaFilter {
                    min_area: vectorize.min_area,
                }),
                Box::new(PerimeterSimplifier {
                    ratio: vectorize.simplify_ratio,
                }),
                Box::new(GeometryValidator),
            ],
            parallel,
        }
    }

    /// Set the color classifier (replaces the default one)
    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: ColorClassifier + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    /// Append a mask cleaning step after the default chain
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: MaskPreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Drop every mask cleaning step, including the defaults
    pub fn clear_preprocessors(mut self) -> Self {
        self.preprocessors.clear();
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Box::new(extractor);
        self
    }

    /// Add a post-processor after the default chain
    pub fn add_postprocessor<P>(mut self, postprocessor: P) -> Self
    where
        P: ShapePostProcessor + 'static,
    {
        self.postprocessors.push(Box::new(postprocessor));
        self
    }

    /// Drop every post-processor, including the defaults
    pub fn clear_postprocessors(mut self) -> Self {
        self.postprocessors.clear();
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validate the configuration and assemble the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let georeferencer = Georeferencer::new(self.config.bounding_box)?;
        let merger = CategoryMerger::new(self.config.merge.simplify_tolerance);

        Ok(Pipeline {
            config: self.config,
            georeferencer,
            classifier: self.classifier,
            preprocessors: self.preprocessors,
            contour_extractor: self.contour_extractor,
            postprocessors: self.postprocessors,
            merger,
            parallel: self.parallel,
        })
    }
}
