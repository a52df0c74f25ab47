//! Core types: image representations and backend result shapes

use crate::error::{Result, SegmentationError};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Discriminant of [`ImageValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageVariant {
    /// Interleaved RGBA bytes with explicit dimensions
    RawPixelBuffer,
    /// Compressed bytes tagged with a MIME type
    EncodedBlob,
    /// Already-decoded, ready-to-draw image
    DecodedImageHandle,
    /// Base64 `data:` URL
    EncodedTextReference,
}

impl ImageVariant {
    /// All variants, in declaration order
    pub const ALL: [ImageVariant; 4] = [
        ImageVariant::RawPixelBuffer,
        ImageVariant::EncodedBlob,
        ImageVariant::DecodedImageHandle,
        ImageVariant::EncodedTextReference,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RawPixelBuffer => "RawPixelBuffer",
            Self::EncodedBlob => "EncodedBlob",
            Self::DecodedImageHandle => "DecodedImageHandle",
            Self::EncodedTextReference => "EncodedTextReference",
        }
    }
}

impl std::fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw RGBA pixels. The byte length is always `width * height * 4`.
#[derive(Debug, Clone)]
pub struct RawPixelBuffer {
    pixels: Arc<RgbaImage>,
}

impl RawPixelBuffer {
    /// Wrap interleaved RGBA bytes, rejecting any length other than `width * height * 4`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                SegmentationError::InvalidPixelBuffer(format!(
                    "{}x{} overflows the addressable size",
                    width, height
                ))
            })?;

        if data.len() != expected {
            return Err(SegmentationError::InvalidPixelBuffer(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        let pixels = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            SegmentationError::internal("pixel buffer rejected after length check")
        })?;
        Ok(Self {
            pixels: Arc::new(pixels),
        })
    }

    #[must_use]
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
        }
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

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[must_use]
    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub(crate) fn shared_pixels(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.pixels)
    }
}

/// A decoded image with intrinsic pixels and an optional display size.
///
/// Rasterization always uses the intrinsic (natural) size; the display size is
/// only layout information supplied by the caller.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
    display_size: Option<(u32, u32)>,
}

impl DecodedImage {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
            display_size: None,
        }
    }

    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    /// Attach a display size that differs from the natural size
    #[must_use]
    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display_size = Some((width, height));
        self
    }

    #[must_use]
    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn natural_dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[must_use]
    pub fn display_size(&self) -> Option<(u32, u32)> {
        self.display_size
    }

    /// Display width if one was set, natural width otherwise
    #[must_use]
    pub fn width(&self) -> u32 {
        self.display_size.map_or(self.natural_width(), |(w, _)| w)
    }

    /// Display height if one was set, natural height otherwise
    #[must_use]
    pub fn height(&self) -> u32 {
        self.display_size.map_or(self.natural_height(), |(_, h)| h)
    }

    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub(crate) fn shared_pixels(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.pixels)
    }
}

/// Compressed image bytes tagged with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl EncodedBlob {
    pub fn new<S: Into<String>>(bytes: Vec<u8>, mime_type: S) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Build a blob, inferring the MIME type from the byte signature
    #[must_use]
    pub fn from_bytes_sniffed(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map_or("application/octet-stream", |format| format.to_mime_type());
        Self::new(bytes, mime_type)
    }

    /// Read a file into a blob, sniffing its MIME type
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(Self::from_bytes_sniffed(bytes))
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as `data:<mime>;base64,<payload>`
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// An image in exactly one of four concrete representations.
///
/// Values are immutable once built; cloning shares the underlying pixels or
/// bytes.
#[derive(Debug, Clone)]
pub enum ImageValue {
    Raw(RawPixelBuffer),
    Blob(EncodedBlob),
    Decoded(DecodedImage),
    /// A base64 `data:` URL wrapping one of the other representations
    TextReference(String),
}

impl ImageValue {
    #[must_use]
    pub fn variant(&self) -> ImageVariant {
        match self {
            Self::Raw(_) => ImageVariant::RawPixelBuffer,
            Self::Blob(_) => ImageVariant::EncodedBlob,
            Self::Decoded(_) => ImageVariant::DecodedImageHandle,
            Self::TextReference(_) => ImageVariant::EncodedTextReference,
        }
    }

    /// Pixel dimensions, when known without decoding
    #[must_use]
    pub fn known_dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Raw(raw) => Some(raw.dimensions()),
            Self::Decoded(decoded) => Some(decoded.natural_dimensions()),
            Self::Blob(_) | Self::TextReference(_) => None,
        }
    }
}

impl From<RawPixelBuffer> for ImageValue {
    fn from(value: RawPixelBuffer) -> Self {
        Self::Raw(value)
    }
}

impl From<EncodedBlob> for ImageValue {
    fn from(value: EncodedBlob) -> Self {
        Self::Blob(value)
    }
}

impl From<DecodedImage> for ImageValue {
    fn from(value: DecodedImage) -> Self {
        Self::Decoded(value)
    }
}

/// Per-person binary mask; non-zero entries mark the person
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PersonMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SegmentationError::InvalidPixelBuffer(format!(
                "person mask expected {} entries for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn is_foreground(&self, index: usize) -> bool {
        self.data.get(index).is_some_and(|&v| v > 0)
    }
}

/// Ordered per-person masks sharing one size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonMaskSet {
    masks: Vec<PersonMask>,
}

impl PersonMaskSet {
    /// Build a set, rejecting masks whose dimensions disagree
    pub fn new(masks: Vec<PersonMask>) -> Result<Self> {
        if let Some(first) = masks.first() {
            let expected = first.dimensions();
            if let Some(bad) = masks.iter().find(|m| m.dimensions() != expected) {
                return Err(SegmentationError::MaskDimensionMismatch {
                    mask: bad.dimensions(),
                    image: expected,
                });
            }
        }
        Ok(Self { masks })
    }

    #[must_use]
    pub fn masks(&self) -> &[PersonMask] {
        &self.masks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Shared mask dimensions, `None` for an empty set
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.masks.first().map(PersonMask::dimensions)
    }
}

/// Single float mask of shape `(height, width)`.
///
/// A value of exactly [`CategoryMask::ERASE_VALUE`] marks a pixel the
/// compositor makes fully transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMask {
    values: Array2<f32>,
}

impl CategoryMask {
    pub const ERASE_VALUE: f32 = 1.0;

    #[must_use]
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// Build from row-major values
    pub fn from_vec(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let values = Array2::from_shape_vec((height as usize, width as usize), values)
            .map_err(|e| {
                SegmentationError::InvalidPixelBuffer(format!(
                    "category mask does not fit {}x{}: {}",
                    width, height, e
                ))
            })?;
        Ok(Self { values })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(Array2::zeros((0, 0)))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.values.ncols() as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.values.nrows() as u32
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[must_use]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output already composited by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreMaskedImage {
    image: RgbaImage,
}

impl PreMaskedImage {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(RgbaImage::new(0, 0))
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Result of one segmentation call, tagged by shape rather than by backend
#[derive(Debug, Clone)]
pub enum BackendResult {
    PersonMaskSet(PersonMaskSet),
    CategoryMask(CategoryMask),
    PreMaskedImage(PreMaskedImage),
}

impl BackendResult {
    /// The backend produced nothing to composite (e.g. no people found)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::PersonMaskSet(set) => set.is_empty(),
            Self::CategoryMask(mask) => mask.is_empty(),
            Self::PreMaskedImage(image) => image.is_empty(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PersonMaskSet(_) => "person_mask_set",
            Self::CategoryMask(_) => "category_mask",
            Self::PreMaskedImage(_) => "pre_masked_image",
        }
    }
}
