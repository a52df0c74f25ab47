//! Representation classifier
//!
//! Typed [`ImageValue`]s classify exhaustively through [`classify`]. Callers
//! holding type-erased values go through [`classify_opaque`] /
//! [`ImageValue::from_opaque`], which recognise the four payload types and
//! reject everything else with `UnsupportedRepresentation`.

use crate::{
    error::{Result, SegmentationError},
    types::{DecodedImage, EncodedBlob, ImageValue, ImageVariant, RawPixelBuffer},
};
use std::any::Any;

/// Identify which representation a value currently has
#[must_use]
pub fn classify(image: &ImageValue) -> ImageVariant {
    image.variant()
}

/// Classify a type-erased value
pub fn classify_opaque(value: &dyn Any) -> Result<ImageVariant> {
    if let Some(image) = value.downcast_ref::<ImageValue>() {
        return Ok(image.variant());
    }
    if value.is::<RawPixelBuffer>() {
        return Ok(ImageVariant::RawPixelBuffer);
    }
    if value.is::<EncodedBlob>() {
        return Ok(ImageVariant::EncodedBlob);
    }
    if value.is::<DecodedImage>() {
        return Ok(ImageVariant::DecodedImageHandle);
    }
    if value.is::<String>() || value.is::<&'static str>() {
        return Ok(ImageVariant::EncodedTextReference);
    }
    Err(unsupported())
}

impl ImageValue {
    /// Recover a typed value from a type-erased payload
    pub fn from_opaque(value: Box<dyn Any + Send>) -> Result<Self> {
        let value = match value.downcast::<ImageValue>() {
            Ok(image) => return Ok(*image),
            Err(other) => other,
        };
        let value = match value.downcast::<RawPixelBuffer>() {
            Ok(raw) => return Ok(Self::Raw(*raw)),
            Err(other) => other,
        };
        let value = match value.downcast::<EncodedBlob>() {
            Ok(blob) => return Ok(Self::Blob(*blob)),
            Err(other) => other,
        };
        let value = match value.downcast::<DecodedImage>() {
            Ok(decoded) => return Ok(Self::Decoded(*decoded)),
            Err(other) => other,
        };
        let value = match value.downcast::<String>() {
            Ok(text) => return Ok(Self::TextReference(*text)),
            Err(other) => other,
        };
        match value.downcast::<&'static str>() {
            Ok(text) => Ok(Self::TextReference((*text).to_string())),
            Err(_) => Err(unsupported()),
        }
    }
}

fn unsupported() -> SegmentationError {
    SegmentationError::UnsupportedRepresentation(
        "expected a raw pixel buffer, encoded blob, decoded image or data URL".to_string(),
    )
}
