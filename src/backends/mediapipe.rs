//! Selfie segmentation adapter

use super::{pixel_input, LazyModel, LoadState, ModelLoader, SegmentationBackend};
use crate::{
    capability::BackendId,
    config::MediaPipeConfig,
    error::{EngineError, Result, SegmentationError},
    types::{BackendResult, CategoryMask, ImageValue},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use tracing::instrument;

/// Engine producing a single category mask, or nothing
#[async_trait]
pub trait CategorySegmenter: Send + Sync {
    async fn segment(
        &self,
        image: &RgbaImage,
    ) -> std::result::Result<Option<CategoryMask>, EngineError>;
}

pub type MediaPipeLoader = Arc<dyn ModelLoader<dyn CategorySegmenter, MediaPipeConfig>>;

pub struct MediaPipeAdapter {
    model: LazyModel<dyn CategorySegmenter, MediaPipeConfig>,
}

impl MediaPipeAdapter {
    #[must_use]
    pub fn new(loader: MediaPipeLoader, config: MediaPipeConfig) -> Self {
        Self {
            model: LazyModel::new(BackendId::MediaPipe, loader, config),
        }
    }
}

#[async_trait]
impl SegmentationBackend for MediaPipeAdapter {
    fn id(&self) -> BackendId {
        BackendId::MediaPipe
    }

    fn load_state(&self) -> LoadState {
        self.model.load_state()
    }

    fn construction_count(&self) -> usize {
        self.model.construction_count()
    }

    async fn ensure_loaded(&self) -> Result<()> {
        self.model.ensure_loaded().await.map(|_| ())
    }

    #[instrument(skip(self, image), fields(backend = "MediaPipe", variant = %image.variant()))]
    async fn segment(&self, image: &ImageValue) -> Result<BackendResult> {
        let model = self.model.get()?;
        let pixels = pixel_input(self.id(), image)?;

        let mask = model
            .segment(&pixels)
            .await
            .map_err(|e| SegmentationError::segmentation_failed(self.id(), e))?;

        // A missing category mask is the empty result
        Ok(BackendResult::CategoryMask(
            mask.unwrap_or_else(CategoryMask::empty),
        ))
    }
}
