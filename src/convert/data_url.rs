//! `data:` URL parsing and validation

use crate::error::{Result, SegmentationError};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Standard alphabet, padding optional on decode
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A syntactically valid base64 data URL, borrowed from its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    mime_type: &'a str,
    payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Split `text` into MIME type and base64 payload without decoding
    pub fn parse(text: &'a str) -> Result<Self> {
        let rest = text.strip_prefix(DATA_PREFIX).ok_or_else(|| {
            SegmentationError::invalid_reference(format!(
                "'{}' is not a data URL",
                preview(text)
            ))
        })?;
        let marker = rest.find(BASE64_MARKER).ok_or_else(|| {
            SegmentationError::invalid_reference("data URL is missing the ';base64,' marker")
        })?;

        let mime_type = &rest[..marker];
        if mime_type.is_empty() {
            return Err(SegmentationError::invalid_reference(
                "data URL does not declare a MIME type",
            ));
        }

        Ok(Self {
            mime_type,
            payload: &rest[marker + BASE64_MARKER.len()..],
        })
    }

    /// Parse and check the MIME type against `allowed` (exact match)
    pub fn validate<S: AsRef<str>>(text: &'a str, allowed: &[S]) -> Result<Self> {
        let url = Self::parse(text)?;
        if !allowed.iter().any(|mime| mime.as_ref() == url.mime_type) {
            return Err(SegmentationError::invalid_reference(format!(
                "data URL MIME type '{}' is not allowed",
                url.mime_type
            )));
        }
        Ok(url)
    }

    #[must_use]
    pub fn mime_type(&self) -> &'a str {
        self.mime_type
    }

    #[must_use]
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Decode the base64 payload
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        PAYLOAD_ENGINE
            .decode(self.payload.trim())
            .map_err(|e| SegmentationError::invalid_reference(format!("invalid base64 payload: {}", e)))
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 32;
    match text.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
