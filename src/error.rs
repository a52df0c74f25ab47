//! Error types for format negotiation and segmentation dispatch

use crate::{capability::BackendId, types::ImageVariant};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Error type reported by external engine collaborators (model loaders and
/// inference calls). Adapters wrap it into [`SegmentationError`].
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error taxonomy for the segmentation pipeline
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// A type-erased value is none of the four known image representations
    #[error("Unsupported image representation: {0}")]
    UnsupportedRepresentation(String),

    /// Malformed data URL or a MIME type outside the allow-list
    #[error("Invalid image reference: {0}")]
    InvalidImageReference(String),

    /// No converter exists for the requested (source, target) pair
    #[error("Conversion from {from} to {to} is not implemented")]
    ConversionUnsupported { from: ImageVariant, to: ImageVariant },

    /// Draw target identifier does not resolve to a surface
    #[error("Canvas '{0}' not found")]
    SinkNotFound(String),

    /// `segment` was called before the backend finished loading
    #[error("{backend} model is not loaded")]
    ModelNotLoaded { backend: BackendId },

    /// Backend model construction failed; a later call may retry
    #[error("Failed to load {backend} model: {message}")]
    ModelLoad { backend: BackendId, message: String },

    /// Backend accepted the input but inference raised
    #[error("{backend} segmentation failed: {message}")]
    SegmentationFailed { backend: BackendId, message: String },

    /// Adapter received a representation outside its capability set
    #[error("{backend} does not accept {variant} input")]
    IncompatibleInput {
        backend: BackendId,
        variant: ImageVariant,
    },

    /// No adapter registered for the requested backend
    #[error("Backend {0} is not registered")]
    BackendUnavailable(BackendId),

    /// Raw pixel data does not match its declared dimensions
    #[error("Invalid pixel buffer: {0}")]
    InvalidPixelBuffer(String),

    /// A mask does not cover the image it is applied to
    #[error("Mask dimensions {mask:?} do not match image dimensions {image:?}")]
    MaskDimensionMismatch { mask: (u32, u32), image: (u32, u32) },

    /// Pixel encoding failures
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Image decoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SegmentationError {
    /// Create a new invalid image reference error
    pub fn invalid_reference<S: Into<String>>(msg: S) -> Self {
        Self::InvalidImageReference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an engine failure raised while constructing a model
    pub fn model_load(backend: BackendId, error: impl std::fmt::Display) -> Self {
        Self::ModelLoad {
            backend,
            message: error.to_string(),
        }
    }

    /// Wrap an engine failure raised during inference
    pub fn segmentation_failed(backend: BackendId, error: impl std::fmt::Display) -> Self {
        Self::SegmentationFailed {
            backend,
            message: error.to_string(),
        }
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Whether a later call may succeed without changing the input.
    ///
    /// Only model construction is transient; classification and conversion
    /// failures describe the input itself.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }
}
