//! Mock engines shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bgseg::{
    backends::{
        loader_fn, BackgroundRemover, BodyPixLoader, CategorySegmenter, EngineLoaders,
        HuggingFaceLoader, MediaPipeLoader, PersonSegmenter,
    },
    config::{BodyPixLoadConfig, HuggingFaceConfig, MediaPipeConfig, MultiPersonConfig},
    CategoryMask, EncodedBlob, EngineError, PersonMask,
};
use image::{Rgba, RgbaImage};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Opaque test image with a horizontal red gradient
pub fn opaque_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        Rgba([(x * 255 / width.max(1)) as u8, 80, 160, 255])
    })
}

/// Marks the left half of every image as the erase category
pub struct LeftHalfCategory;

#[async_trait]
impl CategorySegmenter for LeftHalfCategory {
    async fn segment(&self, image: &RgbaImage) -> Result<Option<CategoryMask>, EngineError> {
        let (width, height) = image.dimensions();
        let values = (0..width * height)
            .map(|i| if i % width < width / 2 { 1.0 } else { 0.0 })
            .collect();
        Ok(Some(CategoryMask::from_vec(width, height, values)?))
    }
}

/// Finds one person covering the right half, or nobody
pub struct RightHalfPerson {
    pub present: bool,
}

#[async_trait]
impl PersonSegmenter for RightHalfPerson {
    async fn segment_multi_person(
        &self,
        image: &RgbaImage,
        _config: &MultiPersonConfig,
    ) -> Result<Vec<PersonMask>, EngineError> {
        if !self.present {
            return Ok(Vec::new());
        }
        let (width, height) = image.dimensions();
        let data = (0..width * height)
            .map(|i| u8::from(i % width >= width / 2))
            .collect();
        Ok(vec![PersonMask::new(width, height, data)?])
    }
}

/// Clears the alpha of the left half of the decoded blob
pub struct LeftHalfRemover;

#[async_trait]
impl BackgroundRemover for LeftHalfRemover {
    async fn remove_background(&self, image: &EncodedBlob) -> Result<Vec<RgbaImage>, EngineError> {
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

/// Counts load attempts; fails the first `failures` of them
#[derive(Clone, Default)]
pub struct LoadCounter {
    calls: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl LoadCounter {
    pub fn failing_first(failures: usize) -> Self {
        let counter = Self::default();
        counter.failures.store(failures, Ordering::SeqCst);
        counter
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn attempt(&self, delay: Duration) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err("model download failed".into());
        }
        Ok(())
    }
}

pub fn mediapipe_loader(counter: LoadCounter, delay: Duration) -> MediaPipeLoader {
    Arc::new(loader_fn(move |_config: MediaPipeConfig| {
        let counter = counter.clone();
        async move {
            counter.attempt(delay).await?;
            let engine: Arc<dyn CategorySegmenter> = Arc::new(LeftHalfCategory);
            Ok::<_, EngineError>(engine)
        }
    }))
}

pub fn bodypix_loader(counter: LoadCounter, present: bool) -> BodyPixLoader {
    Arc::new(loader_fn(move |_config: BodyPixLoadConfig| {
        let counter = counter.clone();
        async move {
            counter.attempt(Duration::ZERO).await?;
            let engine: Arc<dyn PersonSegmenter> = Arc::new(RightHalfPerson { present });
            Ok::<_, EngineError>(engine)
        }
    }))
}

pub fn huggingface_loader(counter: LoadCounter) -> HuggingFaceLoader {
    Arc::new(loader_fn(move |_config: HuggingFaceConfig| {
        let counter = counter.clone();
        async move {
            counter.attempt(Duration::ZERO).await?;
            let engine: Arc<dyn BackgroundRemover> = Arc::new(LeftHalfRemover);
            Ok::<_, EngineError>(engine)
        }
    }))
}

/// Loaders for all three backends sharing one counter
pub fn loaders(counter: &LoadCounter) -> EngineLoaders {
    EngineLoaders {
        bodypix: bodypix_loader(counter.clone(), true),
        mediapipe: mediapipe_loader(counter.clone(), Duration::ZERO),
        huggingface: huggingface_loader(counter.clone()),
    }
}
