//! Segmentation backend adapters
//!
//! Each adapter wraps an external engine behind [`SegmentationBackend`]:
//! - [`BodyPixAdapter`]: multi-person masks
//! - [`MediaPipeAdapter`]: a single category mask
//! - [`HuggingFaceAdapter`]: an already background-removed image
//!
//! Engines are supplied by the caller through [`ModelLoader`]s and are
//! constructed at most once per adapter.

pub mod bodypix;
pub mod huggingface;
pub mod lazy;
pub mod mediapipe;
pub mod registry;

#[cfg(test)]
pub mod test_utils;

pub use self::bodypix::{BodyPixAdapter, BodyPixLoader, PersonSegmenter};
pub use self::huggingface::{BackgroundRemover, HuggingFaceAdapter, HuggingFaceLoader};
pub use self::lazy::{loader_fn, FnLoader, LazyModel, LoadState, ModelLoader};
pub use self::mediapipe::{CategorySegmenter, MediaPipeAdapter, MediaPipeLoader};
pub use self::registry::{BackendRegistry, EngineLoaders};

use crate::{
    capability::BackendId,
    convert::rasterize,
    error::{Result, SegmentationError},
    types::{BackendResult, ImageValue},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;

/// Contract shared by every backend adapter
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    fn id(&self) -> BackendId;

    fn load_state(&self) -> LoadState;

    /// How many times model construction has been started
    fn construction_count(&self) -> usize;

    /// Construct the model if needed; idempotent and safe to call concurrently
    ///
    /// # Errors
    /// - `ModelLoad` when construction fails; a later call retries
    async fn ensure_loaded(&self) -> Result<()>;

    /// Run inference on an input already in one of the backend's accepted
    /// representations
    ///
    /// # Errors
    /// - `ModelNotLoaded` before `ensure_loaded` has succeeded
    /// - `IncompatibleInput` for a representation outside the capability set
    /// - `SegmentationFailed` when the engine raises
    async fn segment(&self, image: &ImageValue) -> Result<BackendResult>;
}

/// Check `image` against the capability table before touching the engine
pub(crate) fn check_input(backend: BackendId, image: &ImageValue) -> Result<()> {
    let variant = image.variant();
    if backend.accepts(variant) {
        Ok(())
    } else {
        Err(SegmentationError::IncompatibleInput { backend, variant })
    }
}

/// Pixels of an accepted pixel-bearing input
pub(crate) fn pixel_input(backend: BackendId, image: &ImageValue) -> Result<Arc<RgbaImage>> {
    check_input(backend, image)?;
    rasterize(image)
}
