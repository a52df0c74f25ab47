//! Result normalizer and sink routing
//!
//! Every [`BackendResult`] shape is reduced to one RGBA image and then either
//! painted onto a registered surface or exported as an encoded value.
//! Person masks keep the foreground; a category mask erases the pixels marked
//! with [`CategoryMask::ERASE_VALUE`].

use crate::{
    config::ConversionOptions,
    convert::rasterize,
    error::{Result, SegmentationError},
    services::{lock_surface, CanvasRegistry, EncodingService},
    types::{BackendResult, CategoryMask, EncodedBlob, ImageValue, PersonMaskSet},
};
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Where a composited result goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkSpec {
    /// Paint onto the registered surface `target`
    Draw { target: String },
    /// Return the encoded result; `text` requests a data URL
    Export {
        #[serde(default)]
        text: bool,
    },
}

impl SinkSpec {
    #[must_use]
    pub fn draw<S: Into<String>>(target: S) -> Self {
        Self::Draw {
            target: target.into(),
        }
    }

    #[must_use]
    pub fn export_blob() -> Self {
        Self::Export { text: false }
    }

    #[must_use]
    pub fn export_data_url() -> Self {
        Self::Export { text: true }
    }
}

/// An exported composite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportedImage {
    Blob(EncodedBlob),
    DataUrl(String),
}

/// Outcome of one segmentation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// The draw sink was painted
    Drawn,
    Exported(ExportedImage),
    /// The backend found nothing; no sink was touched
    NoDetections,
}

impl Output {
    #[must_use]
    pub fn is_no_detections(&self) -> bool {
        matches!(self, Self::NoDetections)
    }
}

/// Union of all person masks; 255 where any person is present
pub fn union_person_masks(set: &PersonMaskSet) -> Option<GrayImage> {
    let (width, height) = set.dimensions()?;
    let mut union = GrayImage::new(width, height);
    for (index, pixel) in union.pixels_mut().enumerate() {
        if set.masks().iter().any(|mask| mask.is_foreground(index)) {
            *pixel = Luma([255]);
        }
    }
    Some(union)
}

/// Keep only pixels covered by some person; everything else becomes
/// transparent black
pub fn apply_person_masks(image: &mut RgbaImage, set: &PersonMaskSet) -> Result<()> {
    let Some(union) = union_person_masks(set) else {
        return Ok(());
    };
    check_dimensions(union.dimensions(), image.dimensions())?;

    for (pixel, mask) in image.pixels_mut().zip(union.pixels()) {
        if mask[0] == 0 {
            pixel.0 = [0, 0, 0, 0];
        }
    }
    Ok(())
}

/// Zero the alpha of every pixel whose mask value is exactly
/// [`CategoryMask::ERASE_VALUE`]; other pixels are left untouched
pub fn apply_category_mask(image: &mut RgbaImage, mask: &CategoryMask) -> Result<()> {
    check_dimensions(mask.dimensions(), image.dimensions())?;

    for (pixel, &value) in image.pixels_mut().zip(mask.values().iter()) {
        if value == CategoryMask::ERASE_VALUE {
            pixel[3] = 0;
        }
    }
    Ok(())
}

fn check_dimensions(mask: (u32, u32), image: (u32, u32)) -> Result<()> {
    if mask == image {
        Ok(())
    } else {
        Err(SegmentationError::MaskDimensionMismatch { mask, image })
    }
}

/// Reduce `result` to a single masked image, `None` for the empty result
pub fn compose(result: BackendResult, original: &ImageValue) -> Result<Option<RgbaImage>> {
    if result.is_empty() {
        return Ok(None);
    }

    match result {
        BackendResult::PersonMaskSet(set) => {
            let mut pixels = rasterize(original)?.as_ref().clone();
            apply_person_masks(&mut pixels, &set)?;
            Ok(Some(pixels))
        },
        BackendResult::CategoryMask(mask) => {
            let mut pixels = rasterize(original)?.as_ref().clone();
            apply_category_mask(&mut pixels, &mask)?;
            Ok(Some(pixels))
        },
        BackendResult::PreMaskedImage(masked) => Ok(Some(masked.into_image())),
    }
}

/// Applies backend results and delivers them to a sink
#[derive(Debug, Clone)]
pub struct Compositor {
    canvases: Arc<CanvasRegistry>,
    export: ConversionOptions,
}

impl Compositor {
    #[must_use]
    pub fn new(canvases: Arc<CanvasRegistry>, export: ConversionOptions) -> Self {
        Self { canvases, export }
    }

    #[must_use]
    pub fn canvases(&self) -> &Arc<CanvasRegistry> {
        &self.canvases
    }

    /// Composite `result` over `original` and route it to `sink`
    ///
    /// The sink is only touched once the composite is complete, so a failure
    /// leaves a draw target unchanged.
    ///
    /// # Errors
    /// - `SinkNotFound` when a draw target is not registered
    /// - `MaskDimensionMismatch` when a mask does not cover the image
    /// - `Encoding` when exporting fails
    #[instrument(skip_all, fields(result = result.kind()))]
    pub async fn composite(
        &self,
        result: BackendResult,
        original: &ImageValue,
        sink: &SinkSpec,
    ) -> Result<Output> {
        if result.is_empty() {
            tracing::info!("backend returned no detections");
            return Ok(Output::NoDetections);
        }

        match sink {
            SinkSpec::Draw { target } => {
                let surface = self.canvases.get(target)?;
                let original = original.clone();
                let composed = run_blocking(move || compose(result, &original)).await?;
                let Some(composed) = composed else {
                    return Ok(Output::NoDetections);
                };

                let mut guard = lock_surface(&surface)?;
                guard.resize(composed.width(), composed.height());
                guard.put_image_data(&composed, 0, 0);
                tracing::debug!(
                    canvas = %target,
                    width = composed.width(),
                    height = composed.height(),
                    "painted composite"
                );
                Ok(Output::Drawn)
            },
            SinkSpec::Export { text } => {
                let original = original.clone();
                let options = self.export.clone();
                let blob = run_blocking(move || {
                    compose(result, &original)?
                        .map(|composed| EncodingService::encode_rgba(&composed, &options))
                        .transpose()
                })
                .await?;
                let Some(blob) = blob else {
                    return Ok(Output::NoDetections);
                };

                if *text {
                    Ok(Output::Exported(ExportedImage::DataUrl(blob.to_data_url())))
                } else {
                    Ok(Output::Exported(ExportedImage::Blob(blob)))
                }
            },
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SegmentationError::internal(format!("compositing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Surface;
    use crate::types::{DecodedImage, PersonMask, PreMaskedImage, RawPixelBuffer};
    use image::Rgba;

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
    }

    #[test]
    fn test_union_not_intersection() {
        let a = PersonMask::new(2, 1, vec![1, 0]).unwrap();
        let b = PersonMask::new(2, 1, vec![0, 0]).unwrap();
        let union = union_person_masks(&PersonMaskSet::new(vec![a, b]).unwrap()).unwrap();
        assert_eq!(union.get_pixel(0, 0)[0], 255);
        assert_eq!(union.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_person_masks_clear_background() {
        let mut image = opaque(2, 2);
        let set = PersonMaskSet::new(vec![
            PersonMask::new(2, 2, vec![1, 0, 0, 0]).unwrap(),
            PersonMask::new(2, 2, vec![0, 0, 0, 1]).unwrap(),
        ])
        .unwrap();
        apply_person_masks(&mut image, &set).unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(0, 1), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 1), &Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_category_mask_erases_exact_one_only() {
        let mut image = RgbaImage::from_pixel(3, 1, Rgba([10, 20, 30, 128]));
        let mask = CategoryMask::from_vec(3, 1, vec![1.0, 0.0, 0.99]).unwrap();
        apply_category_mask(&mut image, &mask).unwrap();

        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(1, 0), &Rgba([10, 20, 30, 128]));
        assert_eq!(image.get_pixel(2, 0), &Rgba([10, 20, 30, 128]));
    }

    #[test]
    fn test_mask_size_mismatch() {
        let mut image = opaque(4, 4);
        let mask = CategoryMask::from_vec(2, 2, vec![0.0; 4]).unwrap();
        assert!(matches!(
            apply_category_mask(&mut image, &mask),
            Err(SegmentationError::MaskDimensionMismatch { mask: (2, 2), image: (4, 4) })
        ));
    }

    #[test]
    fn test_compose_premasked_passes_through() {
        let premasked = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        let original = ImageValue::Raw(RawPixelBuffer::from_rgba_image(opaque(2, 2)));
        let composed = compose(
            BackendResult::PreMaskedImage(PreMaskedImage::new(premasked.clone())),
            &original,
        )
        .unwrap();
        assert_eq!(composed, Some(premasked));
    }

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(CanvasRegistry::new()), ConversionOptions::default())
    }

    #[tokio::test]
    async fn test_draw_resizes_and_paints() {
        let compositor = compositor();
        let surface = compositor
            .canvases()
            .register("out", Surface::new(1, 1))
            .unwrap();

        let original = ImageValue::Decoded(DecodedImage::new(opaque(3, 2)));
        let mask = CategoryMask::from_vec(3, 2, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        let output = compositor
            .composite(BackendResult::CategoryMask(mask), &original, &SinkSpec::draw("out"))
            .await
            .unwrap();

        assert_eq!(output, Output::Drawn);
        let guard = surface.lock().unwrap();
        assert_eq!(guard.dimensions(), (3, 2));
        assert_eq!(guard.pixels().get_pixel(0, 0)[3], 0);
        assert_eq!(guard.pixels().get_pixel(1, 0)[3], 255);
        assert_eq!(guard.pixels().get_pixel(2, 1)[3], 0);
    }

    #[tokio::test]
    async fn test_failed_composite_leaves_surface_untouched() {
        let compositor = compositor();
        let before = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        compositor
            .canvases()
            .register("out", Surface::from_image(before.clone()))
            .unwrap();

        let original = ImageValue::Decoded(DecodedImage::new(opaque(4, 4)));
        let mask = CategoryMask::from_vec(2, 2, vec![1.0; 4]).unwrap();
        let result = compositor
            .composite(BackendResult::CategoryMask(mask), &original, &SinkSpec::draw("out"))
            .await;

        assert!(result.is_err());
        assert_eq!(compositor.canvases().snapshot("out").unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_canvas() {
        let original = ImageValue::Decoded(DecodedImage::new(opaque(1, 1)));
        let mask = CategoryMask::from_vec(1, 1, vec![0.0]).unwrap();
        let err = compositor()
            .composite(BackendResult::CategoryMask(mask), &original, &SinkSpec::draw("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentationError::SinkNotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_export_blob_and_data_url() {
        let compositor = compositor();
        let original = ImageValue::Decoded(DecodedImage::new(opaque(2, 2)));
        let mask = || BackendResult::CategoryMask(CategoryMask::from_vec(2, 2, vec![0.0; 4]).unwrap());

        let blob = compositor
            .composite(mask(), &original, &SinkSpec::export_blob())
            .await
            .unwrap();
        let Output::Exported(ExportedImage::Blob(blob)) = blob else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type(), "image/png");

        let text = compositor
            .composite(mask(), &original, &SinkSpec::export_data_url())
            .await
            .unwrap();
        assert!(matches!(
            text,
            Output::Exported(ExportedImage::DataUrl(ref url)) if url.starts_with("data:image/png;base64,")
        ));
    }

    #[tokio::test]
    async fn test_empty_result_touches_nothing() {
        let compositor = compositor();
        let original = ImageValue::Decoded(DecodedImage::new(opaque(1, 1)));

        let output = compositor
            .composite(
                BackendResult::PersonMaskSet(PersonMaskSet::default()),
                &original,
                &SinkSpec::draw("unregistered"),
            )
            .await
            .unwrap();
        assert!(output.is_no_detections());
    }

    #[test]
    fn test_sink_spec_serde() {
        let draw: SinkSpec = serde_json::from_str(r#"{"kind":"draw","target":"preview"}"#).unwrap();
        assert_eq!(draw, SinkSpec::draw("preview"));

        let export: SinkSpec = serde_json::from_str(r#"{"kind":"export"}"#).unwrap();
        assert_eq!(export, SinkSpec::export_blob());

        assert_eq!(
            serde_json::to_string(&SinkSpec::export_data_url()).unwrap(),
            r#"{"kind":"export","text":true}"#
        );
    }
}
