//! Pipeline orchestrator
//!
//! One request runs classify → plan → convert → load → segment → composite,
//! strictly in that order. The first failing step aborts the request and is
//! reported to the progress reporter with its stage.

use crate::{
    backends::{BackendRegistry, SegmentationBackend},
    capability::BackendId,
    classify::classify,
    compositor::{Compositor, Output, SinkSpec},
    config::PipelineConfig,
    convert::ImageConverter,
    error::Result,
    planner::{plan, ConversionDecision},
    services::{
        CanvasRegistry, NoOpProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
        SegmentationTimings,
    },
    types::{ImageValue, ImageVariant},
};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Backend and sink for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRequest {
    #[serde(default)]
    pub backend: BackendId,
    pub sink: SinkSpec,
}

impl SegmentRequest {
    #[must_use]
    pub fn new(backend: BackendId, sink: SinkSpec) -> Self {
        Self { backend, sink }
    }

    #[must_use]
    pub fn draw<S: Into<String>>(backend: BackendId, target: S) -> Self {
        Self::new(backend, SinkSpec::draw(target))
    }

    #[must_use]
    pub fn export(backend: BackendId) -> Self {
        Self::new(backend, SinkSpec::export_blob())
    }
}

/// An input made ready for a backend
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub source_variant: ImageVariant,
    pub decision: ConversionDecision,
    pub image: ImageValue,
}

/// Sequences one segmentation request across the pipeline components
pub struct SegmentationPipeline {
    backends: BackendRegistry,
    converter: ImageConverter,
    compositor: Compositor,
    config: PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl SegmentationPipeline {
    #[must_use]
    pub fn new(backends: BackendRegistry, config: PipelineConfig) -> Self {
        Self::with_canvases(backends, config, Arc::new(CanvasRegistry::new()))
    }

    /// Build a pipeline drawing into an existing canvas registry
    #[must_use]
    pub fn with_canvases(
        backends: BackendRegistry,
        config: PipelineConfig,
        canvases: Arc<CanvasRegistry>,
    ) -> Self {
        Self {
            converter: ImageConverter::from_config(&config),
            compositor: Compositor::new(canvases, config.export.clone()),
            backends,
            config,
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn canvases(&self) -> &Arc<CanvasRegistry> {
        self.compositor.canvases()
    }

    #[must_use]
    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    #[must_use]
    pub fn converter(&self) -> &ImageConverter {
        &self.converter
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify, plan and convert `image` for `backend` without segmenting
    pub async fn prepare_for_backend(
        &self,
        image: &ImageValue,
        backend: BackendId,
    ) -> Result<PreparedImage> {
        let source_variant = classify(image);
        let decision = plan(source_variant, backend);
        let image = match decision.target() {
            Some(target) => {
                self.converter
                    .convert(image, target, &self.config.conversion)
                    .await?
            },
            None => image.clone(),
        };
        Ok(PreparedImage {
            source_variant,
            decision,
            image,
        })
    }

    /// Segment `image` with the requested backend and deliver it to the sink
    ///
    /// # Errors
    /// The first failing step's error; nothing is drawn or returned on failure.
    #[instrument(skip(self, image), fields(backend = %request.backend))]
    pub async fn segment_image(&self, image: ImageValue, request: &SegmentRequest) -> Result<Output> {
        self.segment_image_timed(image, request)
            .await
            .map(|(output, _)| output)
    }

    /// Like [`segment_image`](Self::segment_image), also returning stage timings
    pub async fn segment_image_timed(
        &self,
        image: ImageValue,
        request: &SegmentRequest,
    ) -> Result<(Output, SegmentationTimings)> {
        let start = Instant::now();
        let mut timings = SegmentationTimings::default();
        // Classify
        self.enter(PipelineStage::Classify, start);
        let stage_start = Instant::now();
        let variant = classify(&image);
        timings.classify_ms = stage_start.elapsed().as_millis() as u64;
        tracing::debug!(variant = %variant, dimensions = ?image.known_dimensions(), "classified input");

        // Plan
        self.enter(PipelineStage::Plan, start);
        let decision = plan(variant, request.backend);
        tracing::debug!(needed = decision.needed(), reason = decision.reason(), "planned conversion");

        // Convert
        let prepared = match decision.target() {
            Some(target) => {
                self.reporter.report_progress(ProgressUpdate::with_description(
                    PipelineStage::Convert,
                    format!("Converting {} to {}", variant, target),
                    start,
                ));
                let stage_start = Instant::now();
                let converted = self.stage(
                    PipelineStage::Convert,
                    self.converter
                        .convert(&image, target, &self.config.conversion)
                        .await,
                )?;
                timings.convert_ms = stage_start.elapsed().as_millis() as u64;
                converted
            },
            None => image,
        };

        // Load
        self.enter(PipelineStage::LoadModel, start);
        let stage_start = Instant::now();
        let backend = self.stage(PipelineStage::LoadModel, self.backends.get(request.backend))?;
        self.stage(PipelineStage::LoadModel, backend.ensure_loaded().await)?;
        timings.model_load_ms = stage_start.elapsed().as_millis() as u64;

        // Segment
        self.enter(PipelineStage::Segment, start);
        let stage_start = Instant::now();
        let result = self.stage(PipelineStage::Segment, backend.segment(&prepared).await)?;
        timings.inference_ms = stage_start.elapsed().as_millis() as u64;

        // Composite
        self.enter(PipelineStage::Composite, start);
        let stage_start = Instant::now();
        let output = self.stage(
            PipelineStage::Composite,
            self.compositor
                .composite(result, &prepared, &request.sink)
                .await,
        )?;
        timings.composite_ms = stage_start.elapsed().as_millis() as u64;

        timings.total_ms = start.elapsed().as_millis() as u64;
        self.enter(PipelineStage::Completed, start);
        self.reporter.report_completion(&timings);
        tracing::debug!(
            total_ms = timings.total_ms,
            convert_ms = timings.convert_ms,
            inference_ms = timings.inference_ms,
            "segmentation finished"
        );

        Ok((output, timings))
    }

    /// Start loading the given backends in the background
    ///
    /// Failures are logged and stay retryable.
    pub fn warm_up(&self, ids: &[BackendId]) -> Vec<JoinHandle<Result<()>>> {
        ids.iter()
            .map(|&id| {
                let backend = self.backends.get(id);
                tokio::spawn(async move {
                    let backend: Arc<dyn SegmentationBackend> = backend?;
                    let result = backend.ensure_loaded().await;
                    if let Err(ref e) = result {
                        tracing::warn!(backend = %id, error = %e, "⚠️ warm-up failed");
                    }
                    result
                })
            })
            .collect()
    }

    fn enter(&self, stage: PipelineStage, start: Instant) {
        self.reporter
            .report_progress(ProgressUpdate::new(stage, start));
    }

    fn stage<T>(&self, stage: PipelineStage, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            self.reporter.report_error(stage, &e.to_string());
        }
        result
    }
}

impl std::fmt::Debug for SegmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("backends", &self.backends)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
