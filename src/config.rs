//! Configuration types for format negotiation, export and backend loading

use crate::{
    capability::BackendId,
    error::{Result, SegmentationError},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Quality used for lossy encoders when none is supplied
pub const DEFAULT_LOSSY_QUALITY: f32 = 0.92;

/// MIME types accepted inside data URLs unless configured otherwise
pub const DEFAULT_ALLOWED_DATA_URL_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];

/// Encoders available for raw-buffer and decoded-image conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// Lossless, keeps alpha
    Png,
    /// Lossy, drops alpha
    Jpeg,
    /// Lossless WebP, keeps alpha
    WebP,
}

impl EncodingFormat {
    /// Map a MIME type onto an available encoder
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            #[cfg(feature = "webp-support")]
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// File extension without the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    #[must_use]
    pub fn supports_transparency(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    #[must_use]
    pub fn uses_quality(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl std::fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Encoding parameters used when a converter has to produce bytes
///
/// `encoding_format` is a MIME type string. Types without an encoder fall
/// back to PNG with a warning. `quality` is only consulted by lossy
/// encoders and must lie in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    pub encoding_format: String,
    pub quality: Option<f32>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            encoding_format: EncodingFormat::Png.mime_type().to_string(),
            quality: None,
        }
    }
}

impl ConversionOptions {
    #[must_use]
    pub fn new<S: Into<String>>(encoding_format: S) -> Self {
        Self {
            encoding_format: encoding_format.into(),
            quality: None,
        }
    }

    #[must_use]
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Check that `quality` lies in `0.0..=1.0`
    pub fn validate(&self) -> Result<()> {
        if let Some(quality) = self.quality {
            if !(0.0..=1.0).contains(&quality) {
                return Err(SegmentationError::config_value_error(
                    "quality",
                    quality,
                    "0.0-1.0",
                    Some(DEFAULT_LOSSY_QUALITY),
                ));
            }
        }
        Ok(())
    }

    /// The encoder that will actually run
    #[must_use]
    pub fn resolved_format(&self) -> EncodingFormat {
        EncodingFormat::from_mime(&self.encoding_format).unwrap_or_else(|| {
            log::warn!(
                "⚠️ No encoder for '{}', falling back to image/png",
                self.encoding_format
            );
            EncodingFormat::Png
        })
    }

    /// Quality in the encoder's `1..=100` scale
    #[must_use]
    pub fn quality_percent(&self) -> u8 {
        let quality = self.quality.unwrap_or(DEFAULT_LOSSY_QUALITY).clamp(0.0, 1.0);
        ((quality * 100.0).round() as u8).max(1)
    }
}

/// ResNet-style architecture selection for the multi-person model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BodyPixArchitecture {
    MobileNetV1,
    #[default]
    ResNet50,
}

/// Model construction parameters for BodyPix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyPixLoadConfig {
    pub architecture: BodyPixArchitecture,
    pub output_stride: u32,
    pub quant_bytes: u32,
}

impl Default for BodyPixLoadConfig {
    fn default() -> Self {
        Self {
            architecture: BodyPixArchitecture::ResNet50,
            output_stride: 16,
            quant_bytes: 2,
        }
    }
}

/// Resolution at which multi-person inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InternalResolution {
    Low,
    Medium,
    High,
    #[default]
    Full,
}

/// Inference parameters for multi-person segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiPersonConfig {
    pub flip_horizontal: bool,
    pub internal_resolution: InternalResolution,
    pub segmentation_threshold: f32,
    pub max_detections: u32,
    pub score_threshold: f32,
    pub nms_radius: u32,
    pub min_keypoint_score: f32,
    pub refine_steps: u32,
}

impl Default for MultiPersonConfig {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            internal_resolution: InternalResolution::Full,
            segmentation_threshold: 0.8,
            max_detections: 4,
            score_threshold: 0.2,
            nms_radius: 20,
            min_keypoint_score: 0.3,
            refine_steps: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BodyPixConfig {
    pub load: BodyPixLoadConfig,
    pub inference: MultiPersonConfig,
}

/// Whether the selfie segmenter processes still images or a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunningMode {
    #[default]
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPipeConfig {
    pub wasm_url: String,
    pub model_url: String,
    pub running_mode: RunningMode,
    pub output_category_mask: bool,
    pub output_confidence_masks: bool,
}

impl Default for MediaPipeConfig {
    fn default() -> Self {
        Self {
            wasm_url: "https://cdn.jsdelivr.net/npm/@mediapipe/tasks-vision@0.10.2/wasm".to_string(),
            model_url: "https://storage.googleapis.com/mediapipe-assets/selfie_segmentation.tflite"
                .to_string(),
            running_mode: RunningMode::Image,
            output_category_mask: true,
            output_confidence_masks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub task: String,
    pub model_id: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            task: "background-removal".to_string(),
            model_id: "onnx-community/ormbg-ONNX".to_string(),
        }
    }
}

/// Top-level pipeline configuration
///
/// Loadable from JSON with every field optional:
///
/// ```json
/// { "default_backend": "mediapipe", "conversion": { "encoding_format": "image/jpeg", "quality": 0.8 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend used when a request does not name one
    pub default_backend: BackendId,
    /// Encoding used by raw-buffer and decoded-image converters
    pub conversion: ConversionOptions,
    /// Encoding used by the export sink
    pub export: ConversionOptions,
    /// MIME types accepted in data URLs
    pub allowed_data_url_types: Vec<String>,
    pub bodypix: BodyPixConfig,
    pub mediapipe: MediaPipeConfig,
    pub huggingface: HuggingFaceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_backend: BackendId::default(),
            conversion: ConversionOptions::default(),
            export: ConversionOptions::default(),
            allowed_data_url_types: DEFAULT_ALLOWED_DATA_URL_TYPES
                .iter()
                .map(|mime| (*mime).to_string())
                .collect(),
            bodypix: BodyPixConfig::default(),
            mediapipe: MediaPipeConfig::default(),
            huggingface: HuggingFaceConfig::default(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            SegmentationError::invalid_config(format!(
                "Failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Quality outside `0.0..=1.0` in either option set
    /// - Empty data URL allow-list
    /// - BodyPix thresholds outside `0.0..=1.0`
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        self.export.validate()?;

        if self.allowed_data_url_types.is_empty() {
            return Err(SegmentationError::invalid_config(
                "allowed_data_url_types must not be empty",
            ));
        }

        let inference = &self.bodypix.inference;
        for (name, value, recommended) in [
            ("segmentation_threshold", inference.segmentation_threshold, 0.8),
            ("score_threshold", inference.score_threshold, 0.2),
            ("min_keypoint_score", inference.min_keypoint_score, 0.3),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SegmentationError::config_value_error(
                    name,
                    value,
                    "0.0-1.0",
                    Some(recommended),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn default_backend(mut self, backend: BackendId) -> Self {
        self.config.default_backend = backend;
        self
    }

    #[must_use]
    pub fn conversion(mut self, options: ConversionOptions) -> Self {
        self.config.conversion = options;
        self
    }

    #[must_use]
    pub fn export(mut self, options: ConversionOptions) -> Self {
        self.config.export = options;
        self
    }

    /// Replace the data URL allow-list
    #[must_use]
    pub fn allowed_data_url_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_data_url_types = types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn bodypix(mut self, config: BodyPixConfig) -> Self {
        self.config.bodypix = config;
        self
    }

    #[must_use]
    pub fn mediapipe(mut self, config: MediaPipeConfig) -> Self {
        self.config.mediapipe = config;
        self
    }

    #[must_use]
    pub fn huggingface(mut self, config: HuggingFaceConfig) -> Self {
        self.config.huggingface = config;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
