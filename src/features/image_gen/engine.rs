//! Image engine trait and per-call request
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use async_trait::async_trait;

use super::options::{ImageQuality, ImageStyle, Orientation};
use super::outcome::ImageOutcome;
use crate::core::Identity;

/// Arguments to `ImageEngine::imagine`.
///
/// Generation parameters left as `None` fall back to directives parsed from
/// the prompt, then to the engine's configured defaults. Engines ignore
/// parameters their provider does not support.
#[derive(Debug, Clone, Default)]
pub struct ImagineRequest {
    pub prompt: String,
    pub identity: Identity,
    /// Pixel size (`1024x1024`) for dalle, aspect ratio (`16:9`) for stability
    pub size: Option<String>,
    pub style: Option<ImageStyle>,
    pub quality: Option<ImageQuality>,
    /// 0 lets the provider choose
    pub seed: Option<u64>,
    pub negative_prompt: Option<String>,
    pub output_format: Option<String>,
    pub count: Option<u32>,
    /// Ask for the provider's description of how the prompt was used
    pub revision: bool,
}

impl ImagineRequest {
    pub fn new(prompt: impl Into<String>, identity: impl Into<Identity>) -> Self {
        Self {
            prompt: prompt.into(),
            identity: identity.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_quality(mut self, quality: ImageQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = Some(output_format.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_revision(mut self, revision: bool) -> Self {
        self.revision = revision;
        self
    }
}

/// A provider-specific adapter exposing the uniform generation contract
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Full-control entry point. Never fails: every error becomes an outcome.
    async fn imagine(&self, request: ImagineRequest) -> ImageOutcome;

    /// Simplified entry point for tool calls.
    ///
    /// Returns `None` when no prompt is given. Forces standard quality and
    /// rate-limits under `Identity::function()`.
    async fn generate_image(
        &self,
        prompt: Option<&str>,
        orientation: Option<Orientation>,
        style: Option<ImageStyle>,
    ) -> Option<ImageOutcome>;

    /// Record a request for `identity` and report whether it is allowed
    fn check_rate_limit(&self, identity: &Identity) -> bool;
}

/// Truncate a prompt for log lines
pub(crate) fn log_prompt(prompt: &str) -> String {
    prompt.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait is object-safe (can be used with dyn)
    fn _assert_object_safe(_: &dyn ImageEngine) {}

    #[test]
    fn test_request_builder() {
        let request = ImagineRequest::new("a cat", 12i64)
            .with_size("1792x1024")
            .with_quality(ImageQuality::Hd)
            .with_revision(true);

        assert_eq!(request.identity, Identity::Id(12));
        assert_eq!(request.size.as_deref(), Some("1792x1024"));
        assert_eq!(request.quality, Some(ImageQuality::Hd));
        assert_eq!(request.style, None);
        assert!(request.revision);
    }

    #[test]
    fn test_log_prompt_truncates() {
        let long = "x".repeat(250);
        assert_eq!(log_prompt(&long).len(), 100);
        assert_eq!(log_prompt("short"), "short");
    }
}
