//! Multi-person segmentation adapter

use super::{pixel_input, LazyModel, LoadState, ModelLoader, SegmentationBackend};
use crate::{
    capability::BackendId,
    config::{BodyPixConfig, BodyPixLoadConfig, MultiPersonConfig},
    error::{EngineError, Result, SegmentationError},
    types::{BackendResult, ImageValue, PersonMask, PersonMaskSet},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use tracing::instrument;

/// Engine producing one binary mask per detected person
#[async_trait]
pub trait PersonSegmenter: Send + Sync {
    async fn segment_multi_person(
        &self,
        image: &RgbaImage,
        config: &MultiPersonConfig,
    ) -> std::result::Result<Vec<PersonMask>, EngineError>;
}

pub type BodyPixLoader = Arc<dyn ModelLoader<dyn PersonSegmenter, BodyPixLoadConfig>>;

pub struct BodyPixAdapter {
    model: LazyModel<dyn PersonSegmenter, BodyPixLoadConfig>,
    inference: MultiPersonConfig,
}

impl BodyPixAdapter {
    #[must_use]
    pub fn new(loader: BodyPixLoader, config: BodyPixConfig) -> Self {
        Self {
            model: LazyModel::new(BackendId::BodyPix, loader, config.load),
            inference: config.inference,
        }
    }
}

#[async_trait]
impl SegmentationBackend for BodyPixAdapter {
    fn id(&self) -> BackendId {
        BackendId::BodyPix
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

    #[instrument(skip(self, image), fields(backend = "BodyPix", variant = %image.variant()))]
    async fn segment(&self, image: &ImageValue) -> Result<BackendResult> {
        let model = self.model.get()?;
        let pixels = pixel_input(self.id(), image)?;

        let masks = model
            .segment_multi_person(&pixels, &self.inference)
            .await
            .map_err(|e| SegmentationError::segmentation_failed(self.id(), e))?;
        tracing::debug!(people = masks.len(), "multi-person segmentation finished");

        Ok(BackendResult::PersonMaskSet(PersonMaskSet::new(masks)?))
    }
}
