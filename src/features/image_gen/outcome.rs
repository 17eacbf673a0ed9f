//! Result types returned by every engine entry point
//!
//! Failures are values, not errors: `imagine` never returns `Err`. Callers
//! that want the plain `(image, message)` pair use `ImageOutcome::into_parts`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::features::directives::DirectiveError;

/// Base64 image payload as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub base64: String,
    pub media_type: String,
}

impl GeneratedImage {
    pub fn new(base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            media_type: media_type.into(),
        }
    }

    /// Decode the payload into raw image bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.base64.trim())
            .context("Image payload is not valid base64")
    }

    /// File extension matching the media type
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" => "jpeg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

/// Media type for a provider `output_format` value
pub fn media_type_for_format(output_format: &str) -> &'static str {
    match output_format.trim().to_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("No text prompt was given. Please try again.")]
    EmptyPrompt,
    #[error("{0}")]
    Directive(#[from] DirectiveError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Your request was rejected. Please review it and try again.")]
    BadRequest,
    #[error("Service is down. Please try again later.")]
    ServiceDown,
    /// Stability 400
    #[error("Your request was rejected (BadRequest).")]
    Rejected,
    #[error("{}", no_image_message(.finish_reason))]
    NoImage { finish_reason: Option<String> },
    #[error("Could not generate image. Please try again.")]
    Malformed,
}

/// Explainable failures; the message is what the end user sees
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageFailure {
    #[error(
        "Image generation is rate limited (only {limit} images per {} minutes are allowed). Please try again later.",
        window_minutes(.window_secs)
    )]
    Throttled { limit: i64, window_secs: i64 },
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("Your request was rejected because it may violate content policy. Please review it and try again.")]
    PolicyRejected,
    /// Stability 403
    #[error("Your request was flagged by content moderation. Please review it and try again.")]
    ModerationFlagged,
    #[error("Service is getting rate limited. Please try again later.")]
    ProviderRateLimited,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn no_image_message(finish_reason: &Option<String>) -> String {
    match finish_reason {
        Some(reason) => format!("Could not generate image. Finish Reason: {reason}"),
        None => "Could not generate image. Please try again.".to_string(),
    }
}

fn window_minutes(window_secs: &i64) -> i64 {
    (*window_secs as f64 / 60.0).round() as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Generated {
        image: GeneratedImage,
        revision: Option<String>,
    },
    Failed(ImageFailure),
    /// Internal error, already logged. Carries no message on purpose.
    Unexpected,
}

impl ImageOutcome {
    /// Split into `(image, message)`: image present means success, image
    /// absent with a message is an explainable failure, both absent is an
    /// unexpected error.
    pub fn into_parts(self) -> (Option<GeneratedImage>, Option<String>) {
        match self {
            ImageOutcome::Generated { image, revision } => (Some(image), revision),
            ImageOutcome::Failed(failure) => (None, Some(failure.to_string())),
            ImageOutcome::Unexpected => (None, None),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, ImageOutcome::Generated { .. })
    }

    pub fn failure(&self) -> Option<&ImageFailure> {
        match self {
            ImageOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ImageFailure> for ImageOutcome {
    fn from(failure: ImageFailure) -> Self {
        ImageOutcome::Failed(failure)
    }
}

impl From<ProviderError> for ImageOutcome {
    fn from(error: ProviderError) -> Self {
        ImageOutcome::Failed(error.into())
    }
}

impl From<InvalidInput> for ImageOutcome {
    fn from(error: InvalidInput) -> Self {
        ImageOutcome::Failed(error.into())
    }
}
