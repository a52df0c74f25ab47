//! Services shared by the converter, compositor and pipeline

pub mod encoding;
pub mod object_url;
pub mod progress;
pub mod surface;

pub use encoding::EncodingService;
pub use object_url::{ObjectUrl, ObjectUrlRegistry};
pub use progress::{
    NoOpProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate, SegmentationTimings,
    TracingProgressReporter,
};
pub use surface::{lock_surface, CanvasRegistry, SharedSurface, Surface};
