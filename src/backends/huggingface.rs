//! Background-removal pipeline adapter
//!
//! The engine only takes encoded blobs and hands back images with the
//! background already removed.

use super::{check_input, LazyModel, LoadState, ModelLoader, SegmentationBackend};
use crate::{
    capability::BackendId,
    config::HuggingFaceConfig,
    error::{EngineError, Result, SegmentationError},
    types::{BackendResult, EncodedBlob, ImageValue, PreMaskedImage},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use tracing::instrument;

/// Engine returning background-removed images for an encoded input
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(
        &self,
        image: &EncodedBlob,
    ) -> std::result::Result<Vec<RgbaImage>, EngineError>;
}

pub type HuggingFaceLoader = Arc<dyn ModelLoader<dyn BackgroundRemover, HuggingFaceConfig>>;

pub struct HuggingFaceAdapter {
    model: LazyModel<dyn BackgroundRemover, HuggingFaceConfig>,
}

impl HuggingFaceAdapter {
    #[must_use]
    pub fn new(loader: HuggingFaceLoader, config: HuggingFaceConfig) -> Self {
        Self {
            model: LazyModel::new(BackendId::HuggingFace, loader, config),
        }
    }
}

#[async_trait]
impl SegmentationBackend for HuggingFaceAdapter {
    fn id(&self) -> BackendId {
        BackendId::HuggingFace
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

    #[instrument(skip(self, image), fields(backend = "HuggingFace", variant = %image.variant()))]
    async fn segment(&self, image: &ImageValue) -> Result<BackendResult> {
        let model = self.model.get()?;
        check_input(self.id(), image)?;
        let ImageValue::Blob(blob) = image else {
            return Err(SegmentationError::IncompatibleInput {
                backend: self.id(),
                variant: image.variant(),
            });
        };

        let outputs = model
            .remove_background(blob)
            .await
            .map_err(|e| SegmentationError::segmentation_failed(self.id(), e))?;
        if outputs.len() > 1 {
            tracing::debug!(outputs = outputs.len(), "using the first background-removal output");
        }

        Ok(BackendResult::PreMaskedImage(
            outputs
                .into_iter()
                .next()
                .map_or_else(PreMaskedImage::empty, PreMaskedImage::new),
        ))
    }
}
