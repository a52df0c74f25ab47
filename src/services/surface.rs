//! Drawable surfaces and the registry the draw sink resolves targets from

use crate::{
    config::ConversionOptions,
    error::{Result, SegmentationError},
    services::encoding::EncodingService,
    types::EncodedBlob,
};
use image::{imageops, RgbaImage};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

/// An RGBA drawing surface
///
/// Resizing clears the contents. Drawing composites with source-over;
/// `put_image_data` overwrites pixels including alpha.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Create a transparent surface
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Set the surface size, discarding the current contents
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Source-over draw of `image` at (`x`, `y`)
    pub fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(&mut self.pixels, image, x, y);
    }

    /// Overwrite pixels with `image` at (`x`, `y`) without blending
    pub fn put_image_data(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::replace(&mut self.pixels, image, x, y);
    }

    /// Copy of the current pixels
    #[must_use]
    pub fn get_image_data(&self) -> RgbaImage {
        self.pixels.clone()
    }

    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn encode(&self, options: &ConversionOptions) -> Result<EncodedBlob> {
        EncodingService::encode_rgba(&self.pixels, options)
    }
}

/// Handle to a registered surface
pub type SharedSurface = Arc<Mutex<Surface>>;

/// Named surfaces the draw sink can target
#[derive(Debug, Default)]
pub struct CanvasRegistry {
    surfaces: RwLock<HashMap<String, SharedSurface>>,
}

impl CanvasRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `surface` under `id`, replacing any previous one
    pub fn register<S: Into<String>>(&self, id: S, surface: Surface) -> Result<SharedSurface> {
        let id = id.into();
        let shared = Arc::new(Mutex::new(surface));
        self.surfaces
            .write()
            .map_err(|_| SegmentationError::internal("canvas registry lock poisoned"))?
            .insert(id.clone(), Arc::clone(&shared));
        log::debug!("Registered canvas '{}'", id);
        Ok(shared)
    }

    /// Resolve `id`, failing with `SinkNotFound`
    pub fn get(&self, id: &str) -> Result<SharedSurface> {
        self.surfaces
            .read()
            .map_err(|_| SegmentationError::internal("canvas registry lock poisoned"))?
            .get(id)
            .cloned()
            .ok_or_else(|| SegmentationError::SinkNotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Result<Option<SharedSurface>> {
        Ok(self
            .surfaces
            .write()
            .map_err(|_| SegmentationError::internal("canvas registry lock poisoned"))?
            .remove(id))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.surfaces
            .read()
            .map(|surfaces| surfaces.contains_key(id))
            .unwrap_or(false)
    }

    /// Copy of the pixels currently on surface `id`
    pub fn snapshot(&self, id: &str) -> Result<RgbaImage> {
        let surface = self.get(id)?;
        let guard = lock_surface(&surface)?;
        Ok(guard.get_image_data())
    }
}

/// Lock a shared surface, mapping poisoning to `Internal`
pub fn lock_surface(surface: &SharedSurface) -> Result<MutexGuard<'_, Surface>> {
    surface
        .lock()
        .map_err(|_| SegmentationError::internal("surface lock poisoned"))
}
