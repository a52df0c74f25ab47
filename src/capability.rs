//! Backend identifiers and the static capability table

use crate::types::ImageVariant;
use serde::{Deserialize, Serialize};

/// The supported segmentation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Multi-person segmentation producing one mask per detected person
    #[default]
    BodyPix,
    /// Background-removal pipeline that only accepts encoded blobs and returns
    /// an already-masked image
    HuggingFace,
    /// Selfie segmenter producing a single category mask
    MediaPipe,
}

impl BackendId {
    pub const ALL: [BackendId; 3] = [BackendId::BodyPix, BackendId::HuggingFace, BackendId::MediaPipe];

    /// Representations the backend accepts without conversion
    #[must_use]
    pub const fn capabilities(self) -> &'static [ImageVariant] {
        match self {
            Self::HuggingFace => &[ImageVariant::EncodedBlob],
            Self::MediaPipe | Self::BodyPix => &[
                ImageVariant::DecodedImageHandle,
                ImageVariant::RawPixelBuffer,
            ],
        }
    }

    /// The single representation unsupported inputs are converted to
    #[must_use]
    pub const fn preferred_target(self) -> ImageVariant {
        match self {
            Self::HuggingFace => ImageVariant::EncodedBlob,
            Self::MediaPipe | Self::BodyPix => ImageVariant::DecodedImageHandle,
        }
    }

    #[must_use]
    pub fn accepts(self, variant: ImageVariant) -> bool {
        self.capabilities().contains(&variant)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BodyPix => "BodyPix",
            Self::HuggingFace => "HuggingFace",
            Self::MediaPipe => "MediaPipe",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for BackendId {
    type Err = crate::error::SegmentationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bodypix" | "body-pix" => Ok(Self::BodyPix),
            "huggingface" | "hugging-face" | "hf" => Ok(Self::HuggingFace),
            "mediapipe" | "media-pipe" => Ok(Self::MediaPipe),
            other => Err(crate::error::SegmentationError::invalid_config(format!(
                "unknown backend '{}' (expected bodypix, huggingface or mediapipe)",
                other
            ))),
        }
    }
}

/// One row of the capability table
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CapabilityEntry {
    pub backend: BackendId,
    pub accepts: &'static [ImageVariant],
    pub preferred_target: ImageVariant,
}

/// The full table, one row per backend
#[must_use]
pub fn capability_table() -> [CapabilityEntry; 3] {
    BackendId::ALL.map(|backend| CapabilityEntry {
        backend,
        accepts: backend.capabilities(),
        preferred_target: backend.preferred_target(),
    })
}
