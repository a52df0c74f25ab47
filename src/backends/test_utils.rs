//! Mock engines and loaders for adapter and pipeline tests
//!
//! Engines record every call and can be told to fail; loaders count
//! construction attempts and can fail a given number of times first.

use super::{
    BackgroundRemover, BodyPixLoader, CategorySegmenter, EngineLoaders, HuggingFaceLoader,
    MediaPipeLoader, ModelLoader, PersonSegmenter,
};
use crate::{
    config::{BodyPixLoadConfig, HuggingFaceConfig, MediaPipeConfig, MultiPersonConfig},
    error::EngineError,
    types::{CategoryMask, EncodedBlob, PersonMask},
};
use async_trait::async_trait;
use image::RgbaImage;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

pub type CallHistory = Arc<Mutex<Vec<String>>>;

fn record(history: &CallHistory, call: String) {
    if let Ok(mut calls) = history.lock() {
        calls.push(call);
    }
}

/// Person segmenter returning a fixed set of masks
pub struct MockPersonSegmenter {
    masks: Vec<PersonMask>,
    should_fail: bool,
    history: CallHistory,
}

impl MockPersonSegmenter {
    pub fn new(masks: Vec<PersonMask>) -> Self {
        Self {
            masks,
            should_fail: false,
            history: CallHistory::default(),
        }
    }

    pub fn failing() -> Self {
        let mut engine = Self::new(Vec::new());
        engine.should_fail = true;
        engine
    }

    pub fn call_history(&self) -> CallHistory {
        Arc::clone(&self.history)
    }
}

#[async_trait]
impl PersonSegmenter for MockPersonSegmenter {
    async fn segment_multi_person(
        &self,
        image: &RgbaImage,
        config: &MultiPersonConfig,
    ) -> Result<Vec<PersonMask>, EngineError> {
        record(
            &self.history,
            format!(
                "segment_multi_person {}x{} threshold={}",
                image.width(),
                image.height(),
                config.segmentation_threshold
            ),
        );
        if self.should_fail {
            return Err("mock person segmentation failed".into());
        }
        Ok(self.masks.clone())
    }
}

/// Category segmenter returning a fixed mask, or none
pub struct MockCategorySegmenter {
    mask: MaskSource,
    should_fail: bool,
    history: CallHistory,
}

enum MaskSource {
    Fixed(CategoryMask),
    Uniform(f32),
    Missing,
}

impl MockCategorySegmenter {
    pub fn new(mask: CategoryMask) -> Self {
        Self::with_source(MaskSource::Fixed(mask))
    }

    /// A mask of `value` sized to whatever image is passed in
    pub fn uniform(value: f32) -> Self {
        Self::with_source(MaskSource::Uniform(value))
    }

    pub fn no_mask() -> Self {
        Self::with_source(MaskSource::Missing)
    }

    pub fn failing() -> Self {
        let mut engine = Self::no_mask();
        engine.should_fail = true;
        engine
    }

    pub fn call_history(&self) -> CallHistory {
        Arc::clone(&self.history)
    }

    fn with_source(mask: MaskSource) -> Self {
        Self {
            mask,
            should_fail: false,
            history: CallHistory::default(),
        }
    }
}

#[async_trait]
impl CategorySegmenter for MockCategorySegmenter {
    async fn segment(&self, image: &RgbaImage) -> Result<Option<CategoryMask>, EngineError> {
        record(
            &self.history,
            format!("segment {}x{}", image.width(), image.height()),
        );
        if self.should_fail {
            return Err("mock category segmentation failed".into());
        }
        Ok(match &self.mask {
            MaskSource::Fixed(mask) => Some(mask.clone()),
            MaskSource::Uniform(value) => Some(CategoryMask::new(ndarray::Array2::from_elem(
                (image.height() as usize, image.width() as usize),
                *value,
            ))),
            MaskSource::Missing => None,
        })
    }
}

/// Background remover that clears the alpha of the left half of the input
pub struct MockBackgroundRemover {
    produce_output: bool,
    should_fail: bool,
    history: CallHistory,
}

impl MockBackgroundRemover {
    pub fn new() -> Self {
        Self {
            produce_output: true,
            should_fail: false,
            history: CallHistory::default(),
        }
    }

    /// Returns no images at all
    pub fn empty() -> Self {
        let mut engine = Self::new();
        engine.produce_output = false;
        engine
    }

    pub fn failing() -> Self {
        let mut engine = Self::new();
        engine.should_fail = true;
        engine
    }

    pub fn call_history(&self) -> CallHistory {
        Arc::clone(&self.history)
    }
}

impl Default for MockBackgroundRemover {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundRemover for MockBackgroundRemover {
    async fn remove_background(&self, image: &EncodedBlob) -> Result<Vec<RgbaImage>, EngineError> {
        record(
            &self.history,
            format!("remove_background {} ({} bytes)", image.mime_type(), image.len()),
        );
        if self.should_fail {
            return Err("mock background removal failed".into());
        }
        if !self.produce_output {
            return Ok(Vec::new());
        }

        let mut pixels = image::load_from_memory(image.bytes())?.to_rgba8();
        let half = pixels.width() / 2;
        for (x, _, pixel) in pixels.enumerate_pixels_mut() {
            if x < half {
                pixel[3] = 0;
            }
        }
        Ok(vec![pixels])
    }
}

/// Loader handing out a shared mock engine
pub struct MockLoader<E> {
    engine: Arc<E>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl<E> MockLoader<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Fail the first `failures` load attempts
    pub fn failing_first(engine: E, failures: usize) -> Self {
        let loader = Self::new(engine);
        loader.failures_left.store(failures, Ordering::SeqCst);
        loader
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn load_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn attempt(&self) -> Result<Arc<E>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err("mock model download failed".into());
        }
        Ok(Arc::clone(&self.engine))
    }
}

#[async_trait]
impl ModelLoader<dyn PersonSegmenter, BodyPixLoadConfig> for MockLoader<MockPersonSegmenter> {
    async fn load(
        &self,
        _config: &BodyPixLoadConfig,
    ) -> Result<Arc<dyn PersonSegmenter>, EngineError> {
        let engine: Arc<dyn PersonSegmenter> = self.attempt().await?;
        Ok(engine)
    }
}

#[async_trait]
impl ModelLoader<dyn CategorySegmenter, MediaPipeConfig> for MockLoader<MockCategorySegmenter> {
    async fn load(
        &self,
        _config: &MediaPipeConfig,
    ) -> Result<Arc<dyn CategorySegmenter>, EngineError> {
        let engine: Arc<dyn CategorySegmenter> = self.attempt().await?;
        Ok(engine)
    }
}

#[async_trait]
impl ModelLoader<dyn BackgroundRemover, HuggingFaceConfig> for MockLoader<MockBackgroundRemover> {
    async fn load(
        &self,
        _config: &HuggingFaceConfig,
    ) -> Result<Arc<dyn BackgroundRemover>, EngineError> {
        let engine: Arc<dyn BackgroundRemover> = self.attempt().await?;
        Ok(engine)
    }
}

/// Loaders for all three backends with well-behaved engines
pub fn mock_loaders() -> EngineLoaders {
    let bodypix: BodyPixLoader = Arc::new(MockLoader::new(MockPersonSegmenter::new(Vec::new())));
    let mediapipe: MediaPipeLoader = Arc::new(MockLoader::new(MockCategorySegmenter::uniform(0.0)));
    let huggingface: HuggingFaceLoader = Arc::new(MockLoader::new(MockBackgroundRemover::new()));
    EngineLoaders {
        bodypix,
        mediapipe,
        huggingface,
    }
}
