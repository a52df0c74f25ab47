//! Pixel encoding service
//!
//! Turns RGBA pixels into an [`EncodedBlob`] according to
//! [`ConversionOptions`]. Used by the raw-buffer and decoded-image converters
//! and by the export sink.

use crate::{
    config::{ConversionOptions, EncodingFormat},
    error::{Result, SegmentationError},
    types::EncodedBlob,
};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    ExtendedColorType, ImageEncoder, RgbaImage,
};

/// Service for encoding RGBA pixels
pub struct EncodingService;

impl EncodingService {
    /// Encode `image` with the format and quality from `options`
    ///
    /// Unknown MIME types fall back to PNG. JPEG output is flattened onto
    /// black; PNG and WebP keep alpha.
    ///
    /// # Errors
    /// - Quality outside `0.0..=1.0`
    /// - Encoder failures
    pub fn encode_rgba(image: &RgbaImage, options: &ConversionOptions) -> Result<EncodedBlob> {
        options.validate()?;
        let format = options.resolved_format();
        let bytes = Self::encode_with(image, format, options.quality_percent())?;
        log::debug!(
            "Encoded {}x{} image as {} ({} bytes)",
            image.width(),
            image.height(),
            format,
            bytes.len()
        );
        Ok(EncodedBlob::new(bytes, format.mime_type()))
    }

    /// Encode as PNG, the export sink's format
    pub fn encode_png(image: &RgbaImage) -> Result<EncodedBlob> {
        let bytes = Self::encode_with(image, EncodingFormat::Png, 100)?;
        Ok(EncodedBlob::new(bytes, EncodingFormat::Png.mime_type()))
    }

    fn encode_with(image: &RgbaImage, format: EncodingFormat, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        let mut buffer = Vec::new();

        match format {
            EncodingFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| SegmentationError::encoding(format!("PNG encoding failed: {}", e)))?;
            },
            EncodingFormat::Jpeg => {
                let rgb = flatten_onto_black(image);
                JpegEncoder::new_with_quality(&mut buffer, quality)
                    .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| {
                        SegmentationError::encoding(format!("JPEG encoding failed: {}", e))
                    })?;
            },
            #[cfg(feature = "webp-support")]
            EncodingFormat::WebP => {
                image::codecs::webp::WebPEncoder::new_lossless(&mut buffer)
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| {
                        SegmentationError::encoding(format!("WebP encoding failed: {}", e))
                    })?;
            },
            #[cfg(not(feature = "webp-support"))]
            EncodingFormat::WebP => {
                return Err(SegmentationError::encoding(
                    "WebP support is not enabled in this build",
                ));
            },
        }

        Ok(buffer)
    }
}

/// Source-over onto opaque black, as a canvas does before lossy export
fn flatten_onto_black(image: &RgbaImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|pixel| {
            let alpha = u16::from(pixel[3]);
            let scale = |channel: u8| ((u16::from(channel) * alpha + 127) / 255) as u8;
            [scale(pixel[0]), scale(pixel[1]), scale(pixel[2])]
        })
        .collect()
}
