//! Progress reporting service
//!
//! Keeps progress reporting out of the pipeline logic so the CLI and library
//! callers can observe stages their own way.

use instant::Instant;
use serde::Serialize;

/// Stages of one segmentation request, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    /// Identifying the input representation
    Classify,
    /// Deciding whether conversion is needed
    Plan,
    /// Converting the input to the backend's target representation
    Convert,
    /// Waiting for the backend model to finish loading
    LoadModel,
    /// Running backend inference
    Segment,
    /// Applying the backend result and delivering it to the sink
    Composite,
    /// Request finished
    Completed,
}

impl PipelineStage {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::Classify => "Classifying input representation",
            PipelineStage::Plan => "Planning conversion",
            PipelineStage::Convert => "Converting input",
            PipelineStage::LoadModel => "Loading segmentation model",
            PipelineStage::Segment => "Running segmentation",
            PipelineStage::Composite => "Compositing result",
            PipelineStage::Completed => "Segmentation completed",
        }
    }

    /// Typical progress percentage once this stage is entered
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            PipelineStage::Classify => 2,
            PipelineStage::Plan => 5,
            PipelineStage::Convert => 15,
            PipelineStage::LoadModel => 30,
            PipelineStage::Segment => 60,
            PipelineStage::Composite => 90,
            PipelineStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since the request started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: PipelineStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }

    #[must_use]
    pub fn with_description(stage: PipelineStage, description: String, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Per-stage timings for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentationTimings {
    pub classify_ms: u64,
    pub convert_ms: u64,
    pub model_load_ms: u64,
    pub inference_ms: u64,
    pub composite_ms: u64,
    pub total_ms: u64,
}

impl SegmentationTimings {
    /// Time not attributed to any stage
    #[must_use]
    pub fn other_ms(&self) -> u64 {
        self.total_ms.saturating_sub(
            self.classify_ms
                + self.convert_ms
                + self.model_load_ms
                + self.inference_ms
                + self.composite_ms,
        )
    }
}

/// Trait for observing segmentation progress
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    fn report_completion(&self, timings: &SegmentationTimings);

    /// Report a failure at `stage`
    fn report_error(&self, stage: PipelineStage, error: &str);
}

/// Discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &SegmentationTimings) {}

    fn report_error(&self, _stage: PipelineStage, _error: &str) {}
}

/// Emits progress as `tracing` events
pub struct TracingProgressReporter {
    verbose: bool,
}

impl TracingProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            tracing::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            tracing::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &SegmentationTimings) {
        tracing::info!("✅ Segmentation completed in {}ms", timings.total_ms);

        if self.verbose {
            tracing::info!("  📊 Detailed timings:");
            tracing::info!("    • Classify: {}ms", timings.classify_ms);
            tracing::info!("    • Convert: {}ms", timings.convert_ms);
            tracing::info!("    • Model load: {}ms", timings.model_load_ms);
            tracing::info!("    • Inference: {}ms", timings.inference_ms);
            tracing::info!("    • Composite: {}ms", timings.composite_ms);
        }
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        tracing::error!("❌ Error during {}: {}", stage.description(), error);
    }
}
