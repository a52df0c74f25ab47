//! Conversion planner

use crate::{capability::BackendId, types::ImageVariant};
use serde::Serialize;

/// Whether an input must be converted before dispatch, and to what.
///
/// `target` is `Some` exactly when `needed` is true; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionDecision {
    needed: bool,
    target: Option<ImageVariant>,
    reason: String,
}

impl ConversionDecision {
    #[must_use]
    pub fn keep<S: Into<String>>(reason: S) -> Self {
        Self {
            needed: false,
            target: None,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn convert<S: Into<String>>(target: ImageVariant, reason: S) -> Self {
        Self {
            needed: true,
            target: Some(target),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn needed(&self) -> bool {
        self.needed
    }

    #[must_use]
    pub fn target(&self) -> Option<ImageVariant> {
        self.target
    }

    /// Diagnostic explanation; never drives behavior
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Decide whether `variant` has to be converted for `backend`.
///
/// The backend's declared target always wins; whether that target is
/// reachable from `variant` is left to the converter.
#[must_use]
pub fn plan(variant: ImageVariant, backend: BackendId) -> ConversionDecision {
    if backend.accepts(variant) {
        return ConversionDecision::keep(format!(
            "Input type '{}' is already supported by {}",
            variant, backend
        ));
    }

    let target = backend.preferred_target();
    ConversionDecision::convert(
        target,
        format!(
            "Input type '{}' needs conversion to '{}' for {}",
            variant, target, backend
        ),
    )
}
