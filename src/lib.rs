#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgseg
//!
//! Format negotiation and multi-backend dispatch for person/background
//! segmentation.
//!
//! An image arrives in one of four representations (raw RGBA pixels, an
//! encoded blob, a decoded image, or a base64 data URL). The pipeline
//! classifies it, decides whether the selected backend can take it as-is,
//! converts it if not, runs the backend, and turns the backend's result into
//! one alpha-masked image that is either painted onto a registered surface or
//! exported.
//!
//! ## Backends
//!
//! | Backend       | Accepts                        | Result            |
//! |---------------|--------------------------------|-------------------|
//! | `BodyPix`     | decoded image, raw pixels      | per-person masks  |
//! | `MediaPipe`   | decoded image, raw pixels      | one category mask |
//! | `HuggingFace` | encoded blob                   | pre-masked image  |
//!
//! The engines themselves are supplied by the caller through
//! [`ModelLoader`]s and are constructed lazily, at most once per adapter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgseg::{
//!     BackendId, BackendRegistry, EngineLoaders, ImageValue, Output, PipelineConfig,
//!     SegmentRequest, SegmentationPipeline, EncodedBlob,
//! };
//!
//! # async fn example(loaders: EngineLoaders) -> anyhow::Result<()> {
//! let config = PipelineConfig::default();
//! let pipeline = SegmentationPipeline::new(BackendRegistry::with_defaults(loaders, &config), config);
//!
//! let blob = EncodedBlob::from_file("portrait.jpg").await?;
//! let output = pipeline
//!     .segment_image(ImageValue::Blob(blob), &SegmentRequest::export(BackendId::MediaPipe))
//!     .await?;
//!
//! if let Output::NoDetections = output {
//!     println!("nothing to keep");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `bgseg` binary and tracing setup
//! - `webp-support` (default): lossless WebP as a conversion target
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
pub mod capability;
pub mod classify;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use backends::{
    loader_fn, BackgroundRemover, BackendRegistry, BodyPixAdapter, CategorySegmenter,
    EngineLoaders, HuggingFaceAdapter, LoadState, MediaPipeAdapter, ModelLoader,
    PersonSegmenter, SegmentationBackend,
};
pub use capability::{capability_table, BackendId, CapabilityEntry};
pub use classify::{classify, classify_opaque};
pub use compositor::{
    apply_category_mask, apply_person_masks, union_person_masks, Compositor, ExportedImage,
    Output, SinkSpec,
};
pub use config::{
    BodyPixConfig, ConversionOptions, EncodingFormat, HuggingFaceConfig, MediaPipeConfig,
    MultiPersonConfig, PipelineConfig, PipelineConfigBuilder,
};
pub use convert::{DataUrl, ImageConverter};
pub use error::{EngineError, Result, SegmentationError};
pub use pipeline::{PreparedImage, SegmentRequest, SegmentationPipeline};
pub use planner::{plan, ConversionDecision};
pub use services::{
    CanvasRegistry, EncodingService, NoOpProgressReporter, ObjectUrlRegistry, PipelineStage,
    ProgressReporter, ProgressUpdate, SegmentationTimings, Surface, TracingProgressReporter,
};
pub use types::{
    BackendResult, CategoryMask, DecodedImage, EncodedBlob, ImageValue, ImageVariant, PersonMask,
    PersonMaskSet, PreMaskedImage, RawPixelBuffer,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};
