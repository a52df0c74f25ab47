//! Conversion executor
//!
//! A closed set of five pairwise converters:
//!
//! | from                   | to                   |
//! |------------------------|----------------------|
//! | `DecodedImageHandle`   | `EncodedBlob`        |
//! | `RawPixelBuffer`       | `EncodedBlob`        |
//! | `EncodedBlob`          | `DecodedImageHandle` |
//! | `EncodedTextReference` | `DecodedImageHandle` |
//! | `EncodedTextReference` | `EncodedBlob`        |
//!
//! Every other pair fails with `ConversionUnsupported`. Decoding and encoding
//! run on the blocking pool.

pub mod data_url;

pub use data_url::DataUrl;

use crate::{
    config::{ConversionOptions, PipelineConfig, DEFAULT_ALLOWED_DATA_URL_TYPES},
    error::{Result, SegmentationError},
    services::{ObjectUrlRegistry, Surface},
    types::{DecodedImage, EncodedBlob, ImageValue, ImageVariant},
};
use image::RgbaImage;
use std::sync::Arc;
use tracing::instrument;

/// Performs representation-to-representation transforms
#[derive(Debug, Clone)]
pub struct ImageConverter {
    object_urls: Arc<ObjectUrlRegistry>,
    allowed_data_url_types: Vec<String>,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_DATA_URL_TYPES.iter().map(|mime| (*mime).to_string()))
    }
}

impl ImageConverter {
    pub fn new<I, S>(allowed_data_url_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object_urls: ObjectUrlRegistry::new(),
            allowed_data_url_types: allowed_data_url_types.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.allowed_data_url_types.iter().cloned())
    }

    #[must_use]
    pub fn object_urls(&self) -> &Arc<ObjectUrlRegistry> {
        &self.object_urls
    }

    /// Convert `image` to `target`
    ///
    /// Converting to the value's own variant returns a clone.
    ///
    /// # Errors
    /// - `ConversionUnsupported` for pairs outside the converter table
    /// - `InvalidImageReference` for malformed or disallowed data URLs,
    ///   raised before any decoding
    /// - `Image` / `Encoding` when the codec fails
    #[instrument(skip(self, image, options), fields(from = %image.variant(), to = %target))]
    pub async fn convert(
        &self,
        image: &ImageValue,
        target: ImageVariant,
        options: &ConversionOptions,
    ) -> Result<ImageValue> {
        if image.variant() == target {
            return Ok(image.clone());
        }

        match (image, target) {
            (ImageValue::Decoded(decoded), ImageVariant::EncodedBlob) => {
                let pixels = decoded.shared_pixels();
                let options = options.clone();
                let blob = run_blocking(move || {
                    let (width, height) = pixels.dimensions();
                    let mut surface = Surface::new(width, height);
                    surface.draw_image(&pixels, 0, 0);
                    surface.encode(&options)
                })
                .await?;
                Ok(ImageValue::Blob(blob))
            },
            (ImageValue::Raw(raw), ImageVariant::EncodedBlob) => {
                let pixels = raw.shared_pixels();
                let options = options.clone();
                let blob = run_blocking(move || {
                    let (width, height) = pixels.dimensions();
                    let mut surface = Surface::new(width, height);
                    surface.put_image_data(&pixels, 0, 0);
                    surface.encode(&options)
                })
                .await?;
                Ok(ImageValue::Blob(blob))
            },
            (ImageValue::Blob(blob), ImageVariant::DecodedImageHandle) => {
                let decoded = self.decode_blob(blob).await?;
                Ok(ImageValue::Decoded(decoded))
            },
            (ImageValue::TextReference(text), ImageVariant::DecodedImageHandle) => {
                let blob = self.resolve_text_reference(text)?;
                let bytes = blob.shared_bytes();
                let decoded = run_blocking(move || {
                    Ok(DecodedImage::from_dynamic(&image::load_from_memory(&bytes)?))
                })
                .await?;
                Ok(ImageValue::Decoded(decoded))
            },
            (ImageValue::TextReference(text), ImageVariant::EncodedBlob) => {
                Ok(ImageValue::Blob(self.resolve_text_reference(text)?))
            },
            _ => Err(SegmentationError::ConversionUnsupported {
                from: image.variant(),
                to: target,
            }),
        }
    }

    /// Validate a data URL and resolve its payload into a blob
    pub fn resolve_text_reference(&self, text: &str) -> Result<EncodedBlob> {
        let url = DataUrl::validate(text, &self.allowed_data_url_types)?;
        let bytes = url.decode_payload()?;
        tracing::debug!(mime = url.mime_type(), bytes = bytes.len(), "resolved data URL");
        Ok(EncodedBlob::new(bytes, url.mime_type()))
    }

    /// Decode a blob through a transient object URL
    ///
    /// The URL is revoked when this returns, whether decoding succeeded or not.
    pub async fn decode_blob(&self, blob: &EncodedBlob) -> Result<DecodedImage> {
        let object_url = self.object_urls.create(blob.clone())?;
        let bytes = object_url.resolve()?.shared_bytes();

        let decoded = run_blocking(move || {
            Ok(DecodedImage::from_dynamic(&image::load_from_memory(&bytes)?))
        })
        .await;

        if let Err(ref e) = decoded {
            log::debug!("Decoding {} failed: {}", object_url.as_str(), e);
        }
        drop(object_url);
        decoded
    }
}

/// Pixels of an image already in a pixel-bearing representation
///
/// Raw buffers and decoded images share their pixels; a blob is decoded on
/// the calling thread. Decoded images use their natural size.
pub fn rasterize(image: &ImageValue) -> Result<Arc<RgbaImage>> {
    match image {
        ImageValue::Raw(raw) => Ok(raw.shared_pixels()),
        ImageValue::Decoded(decoded) => Ok(decoded.shared_pixels()),
        ImageValue::Blob(blob) => Ok(Arc::new(image::load_from_memory(blob.bytes())?.to_rgba8())),
        ImageValue::TextReference(_) => Err(SegmentationError::ConversionUnsupported {
            from: ImageVariant::EncodedTextReference,
            to: ImageVariant::RawPixelBuffer,
        }),
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SegmentationError::internal(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPixelBuffer;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 255]))
    }

    #[tokio::test]
    async fn test_decoded_blob_round_trip_preserves_size() {
        let converter = ImageConverter::default();
        let decoded = ImageValue::Decoded(DecodedImage::new(gradient(37, 21)));

        let blob = converter
            .convert(&decoded, ImageVariant::EncodedBlob, &ConversionOptions::default())
            .await
            .unwrap();
        let back = converter
            .convert(&blob, ImageVariant::DecodedImageHandle, &ConversionOptions::default())
            .await
            .unwrap();

        assert_eq!(back.known_dimensions(), Some((37, 21)));
        assert_eq!(converter.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn test_rasterize_uses_natural_size() {
        let converter = ImageConverter::default();
        let decoded = DecodedImage::new(gradient(40, 30)).with_display_size(10, 5);

        let blob = converter
            .convert(
                &ImageValue::Decoded(decoded),
                ImageVariant::EncodedBlob,
                &ConversionOptions::default(),
            )
            .await
            .unwrap();
        let ImageValue::Blob(blob) = blob else {
            panic!("expected blob");
        };
        let pixels = image::load_from_memory(blob.bytes()).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (40, 30));
    }

    #[tokio::test]
    async fn test_raw_to_blob_keeps_pixels() {
        let converter = ImageConverter::default();
        let raw = RawPixelBuffer::from_rgba_image(gradient(4, 4));

        let blob = converter
            .convert(&ImageValue::Raw(raw), ImageVariant::EncodedBlob, &ConversionOptions::default())
            .await
            .unwrap();
        let ImageValue::Blob(blob) = blob else {
            panic!("expected blob");
        };
        assert_eq!(blob.mime_type(), "image/png");
        let decoded = image::load_from_memory(blob.bytes()).unwrap().to_rgba8();
        assert_eq!(decoded, gradient(4, 4));
    }

    #[tokio::test]
    async fn test_jpeg_option_is_honored() {
        let converter = ImageConverter::default();
        let raw = RawPixelBuffer::from_rgba_image(gradient(8, 8));
        let options = ConversionOptions::new("image/jpeg").with_quality(0.7);

        let blob = converter
            .convert(&ImageValue::Raw(raw), ImageVariant::EncodedBlob, &options)
            .await
            .unwrap();
        assert!(matches!(blob, ImageValue::Blob(ref b) if b.mime_type() == "image/jpeg"));
    }

    #[tokio::test]
    async fn test_text_reference_conversions() {
        let converter = ImageConverter::default();
        let png = crate::services::EncodingService::encode_png(&gradient(6, 3)).unwrap();
        let text = ImageValue::TextReference(png.to_data_url());

        let blob = converter
            .convert(&text, ImageVariant::EncodedBlob, &ConversionOptions::default())
            .await
            .unwrap();
        assert!(matches!(blob, ImageValue::Blob(ref b) if b.bytes() == png.bytes()));

        let decoded = converter
            .convert(&text, ImageVariant::DecodedImageHandle, &ConversionOptions::default())
            .await
            .unwrap();
        assert_eq!(decoded.known_dimensions(), Some((6, 3)));
    }

    #[tokio::test]
    async fn test_malformed_text_reference_fails_before_decode() {
        let converter = ImageConverter::default();
        let text = ImageValue::TextReference("not-a-data-url".to_string());

        let err = converter
            .convert(&text, ImageVariant::DecodedImageHandle, &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidImageReference(_)));
        assert_eq!(converter.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn test_disallowed_mime_rejected() {
        let converter = ImageConverter::new(["image/png"]);
        let text = ImageValue::TextReference("data:image/gif;base64,R0lGODlh".to_string());

        let err = converter
            .convert(&text, ImageVariant::EncodedBlob, &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidImageReference(_)));
    }

    #[tokio::test]
    async fn test_unsupported_pairs() {
        let converter = ImageConverter::default();
        let blob = ImageValue::Blob(EncodedBlob::new(vec![1, 2, 3], "image/png"));
        let raw = ImageValue::Raw(RawPixelBuffer::new(1, 1, vec![0; 4]).unwrap());
        let options = ConversionOptions::default();

        for (image, target) in [
            (&blob, ImageVariant::RawPixelBuffer),
            (&raw, ImageVariant::DecodedImageHandle),
            (&raw, ImageVariant::EncodedTextReference),
            (&blob, ImageVariant::EncodedTextReference),
        ] {
            let err = converter.convert(image, target, &options).await.unwrap_err();
            assert!(
                matches!(err, SegmentationError::ConversionUnsupported { to, .. } if to == target),
                "{image:?} -> {target}"
            );
        }
    }

    #[tokio::test]
    async fn test_corrupt_blob_revokes_object_url() {
        let converter = ImageConverter::default();
        let blob = ImageValue::Blob(EncodedBlob::new(vec![0xde, 0xad, 0xbe, 0xef], "image/png"));

        let result = converter
            .convert(&blob, ImageVariant::DecodedImageHandle, &ConversionOptions::default())
            .await;
        assert!(matches!(result, Err(SegmentationError::Image(_))));
        assert_eq!(converter.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn test_same_variant_is_identity() {
        let converter = ImageConverter::default();
        let raw = ImageValue::Raw(RawPixelBuffer::new(2, 2, vec![7; 16]).unwrap());
        let same = converter
            .convert(&raw, ImageVariant::RawPixelBuffer, &ConversionOptions::default())
            .await
            .unwrap();
        assert_eq!(same.known_dimensions(), Some((2, 2)));
    }

    #[test]
    fn test_rasterize_text_reference_unsupported() {
        let text = ImageValue::TextReference("data:image/png;base64,AA==".to_string());
        assert!(rasterize(&text).is_err());
    }
}
