//! Backend registry

use super::{
    BodyPixAdapter, BodyPixLoader, HuggingFaceAdapter, HuggingFaceLoader, MediaPipeAdapter,
    MediaPipeLoader, SegmentationBackend,
};
use crate::{
    capability::BackendId,
    config::PipelineConfig,
    error::{Result, SegmentationError},
};
use std::{collections::HashMap, sync::Arc};

/// Engine loaders for the three built-in adapters
#[derive(Clone)]
pub struct EngineLoaders {
    pub bodypix: BodyPixLoader,
    pub mediapipe: MediaPipeLoader,
    pub huggingface: HuggingFaceLoader,
}

/// One shared adapter per backend id
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendId, Arc<dyn SegmentationBackend>>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build all three adapters from their loaders and settings
    #[must_use]
    pub fn with_defaults(loaders: EngineLoaders, config: &PipelineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BodyPixAdapter::new(
            loaders.bodypix,
            config.bodypix.clone(),
        )));
        registry.register(Arc::new(MediaPipeAdapter::new(
            loaders.mediapipe,
            config.mediapipe.clone(),
        )));
        registry.register(Arc::new(HuggingFaceAdapter::new(
            loaders.huggingface,
            config.huggingface.clone(),
        )));
        registry
    }

    /// Register an adapter under its own id, replacing any previous one
    pub fn register(&mut self, backend: Arc<dyn SegmentationBackend>) {
        let id = backend.id();
        if self.backends.insert(id, backend).is_some() {
            log::debug!("Replaced registered backend {}", id);
        }
    }

    pub fn get(&self, id: BackendId) -> Result<Arc<dyn SegmentationBackend>> {
        self.backends
            .get(&id)
            .cloned()
            .ok_or(SegmentationError::BackendUnavailable(id))
    }

    #[must_use]
    pub fn contains(&self, id: BackendId) -> bool {
        self.backends.contains_key(&id)
    }

    /// Registered ids in `BackendId::ALL` order
    #[must_use]
    pub fn ids(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|id| self.backends.contains_key(id))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::mock_loaders;
    use crate::backends::LoadState;

    #[test]
    fn test_empty_registry() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(BackendId::MediaPipe),
            Err(SegmentationError::BackendUnavailable(BackendId::MediaPipe))
        ));
    }

    #[test]
    fn test_with_defaults_registers_all() {
        let registry = BackendRegistry::with_defaults(mock_loaders(), &PipelineConfig::default());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids(), BackendId::ALL.to_vec());

        for id in BackendId::ALL {
            let backend = registry.get(id).unwrap();
            assert_eq!(backend.id(), id);
            assert_eq!(backend.load_state(), LoadState::Unloaded);
            assert_eq!(backend.construction_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_adapters_are_shared() {
        let registry = BackendRegistry::with_defaults(mock_loaders(), &PipelineConfig::default());
        registry.get(BackendId::BodyPix).unwrap().ensure_loaded().await.unwrap();

        let again = registry.get(BackendId::BodyPix).unwrap();
        assert_eq!(again.load_state(), LoadState::Ready);
        again.ensure_loaded().await.unwrap();
        assert_eq!(again.construction_count(), 1);
    }
}
