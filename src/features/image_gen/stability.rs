//! # Feature: Stability Image Engine
//!
//! Stable Image REST API (`v2beta/stable-image/generate/*`) with aspect
//! ratio, seed and negative prompt options.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.1.0: `--horizontal`/`--vertical` directives now change the aspect ratio
//! - 1.0.0: Initial release with the core endpoint

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::engine::{log_prompt, ImageEngine, ImagineRequest};
use super::options::{ImageQuality, ImageStyle, Orientation};
use super::outcome::{
    media_type_for_format, GeneratedImage, ImageFailure, ImageOutcome, InvalidInput,
    ProviderError,
};
use crate::core::{AppConfig, Identity};
use crate::features::directives::{self, Vocabulary};
use crate::features::rate_limiting::RateLimiter;

pub const DEFAULT_URL: &str = "https://api.stability.ai/v2beta/stable-image/generate/core";
pub const DEFAULT_OUTPUT_FORMAT: &str = "jpeg";

const SQUARE_RATIO: &str = "1:1";
const LANDSCAPE_RATIO: &str = "16:9";
const PORTRAIT_RATIO: &str = "9:16";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct StabilitySettings {
    pub url: String,
    pub ratio: String,
    pub price: f64,
    pub rate_limit_count: i64,
    pub rate_limit_time: i64,
    pub negative_prompt: Option<String>,
    /// 0 lets the provider pick a random seed
    pub seed: u64,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            ratio: SQUARE_RATIO.to_string(),
            price: 0.0,
            rate_limit_count: 0,
            rate_limit_time: 0,
            negative_prompt: None,
            seed: 0,
        }
    }
}

impl StabilitySettings {
    /// Read settings from the `image_generation` section, which is required
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let section = config.image_generation.as_ref().context(
            "Could not load image generation settings: missing image_generation section",
        )?;
        let defaults = Self::default();

        // Config files write "None" for an unset negative prompt
        let negative_prompt = section
            .negative_prompt
            .clone()
            .filter(|p| p != "None" && !p.trim().is_empty());

        Ok(Self {
            url: section.url.clone().unwrap_or(defaults.url),
            ratio: section.ratio.clone().unwrap_or(defaults.ratio),
            price: section.price.unwrap_or(defaults.price),
            rate_limit_count: section.rate_limit_count.unwrap_or(defaults.rate_limit_count),
            rate_limit_time: section.rate_limit_time.unwrap_or(defaults.rate_limit_time),
            negative_prompt,
            seed: section.seed.unwrap_or(defaults.seed),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    seed: Option<i64>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Fields sent as multipart form data
#[derive(Debug, Clone, PartialEq)]
struct GenerateForm {
    prompt: String,
    aspect_ratio: String,
    seed: u64,
    negative_prompt: Option<String>,
    output_format: String,
}

impl GenerateForm {
    fn into_multipart(self) -> Form {
        let mut form = Form::new()
            .text("prompt", self.prompt)
            .text("aspect_ratio", self.aspect_ratio)
            .text("seed", self.seed.to_string())
            .text("output_format", self.output_format);
        if let Some(negative_prompt) = self.negative_prompt {
            form = form.text("negative_prompt", negative_prompt);
        }
        form
    }
}

pub struct StabilityEngine {
    http: reqwest::Client,
    api_key: String,
    settings: StabilitySettings,
    rate_limiter: RateLimiter,
}

impl StabilityEngine {
    pub fn new(api_key: impl Into<String>, settings: StabilitySettings) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let rate_limiter = RateLimiter::new(settings.rate_limit_count, settings.rate_limit_time);

        let engine = Self {
            http,
            api_key: api_key.into(),
            settings,
            rate_limiter,
        };
        engine.log_enabled();
        Ok(engine)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings = StabilitySettings::from_config(config)?;
        Self::new(config.stability_api_key()?, settings)
    }

    pub fn settings(&self) -> &StabilitySettings {
        &self.settings
    }

    fn log_enabled(&self) {
        info!("Image generation via Stability is enabled | Endpoint: {}", self.settings.url);
        if self.rate_limiter.is_enabled() {
            info!(
                "Image generation is rate limited | Only {} images per {} seconds are allowed",
                self.rate_limiter.limit(),
                self.rate_limiter.window_secs()
            );
        }
        if self.settings.price > 0.0 {
            info!("Image generation cost is {} per image", self.settings.price);
        }
    }

    /// Merge defaults, per-call arguments and directives into the form.
    ///
    /// Explicit arguments win over directives, which win over defaults.
    /// Negative prompts accumulate instead of replacing each other.
    fn build_form(
        &self,
        request: &ImagineRequest,
        prompt: String,
        found: directives::PromptDirectives,
    ) -> GenerateForm {
        let aspect_ratio = request
            .size
            .clone()
            .or(found.ratio)
            .or_else(|| found.orientation.map(|o| orientation_ratio(o).to_string()))
            .unwrap_or_else(|| self.settings.ratio.clone());

        let negative_parts: Vec<String> = [
            self.settings.negative_prompt.clone(),
            request.negative_prompt.clone(),
            found.negative_prompt,
        ]
        .into_iter()
        .flatten()
        .collect();
        let negative_prompt = (!negative_parts.is_empty()).then(|| negative_parts.join("; "));

        GenerateForm {
            prompt,
            aspect_ratio,
            seed: request.seed.or(found.seed).unwrap_or(self.settings.seed),
            negative_prompt,
            output_format: request
                .output_format
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string()),
        }
    }
}

fn orientation_ratio(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Landscape => LANDSCAPE_RATIO,
        Orientation::Portrait => PORTRAIT_RATIO,
    }
}

/// Map a generate response to an outcome
fn classify_response(
    status: StatusCode,
    body: &str,
    prompt: &str,
    output_format: &str,
    revision: bool,
) -> ImageOutcome {
    match status {
        StatusCode::OK => {
            let parsed: GenerateResponse = match serde_json::from_str(body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("Stability returned an unreadable response: {e} | Body: {body}");
                    return ProviderError::Malformed.into();
                }
            };

            match parsed.image.filter(|image| !image.trim().is_empty()) {
                Some(image) => {
                    let revised_prompt = revision.then(|| {
                        format!(
                            "Prompt: {}. Seed: {}. Finish Reason: {}",
                            prompt,
                            parsed
                                .seed
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "unknown".to_string()),
                            parsed.finish_reason.as_deref().unwrap_or("unknown")
                        )
                    });
                    ImageOutcome::Generated {
                        image: GeneratedImage::new(image, media_type_for_format(output_format)),
                        revision: revised_prompt,
                    }
                }
                None => {
                    error!("Stability Error: {body}");
                    ProviderError::NoImage {
                        finish_reason: parsed.finish_reason,
                    }
                    .into()
                }
            }
        }
        StatusCode::BAD_REQUEST => {
            error!("Stability BadRequestError: {body}");
            ProviderError::Rejected.into()
        }
        StatusCode::FORBIDDEN => {
            error!("Stability ContentModerationError: {body}");
            ImageFailure::ModerationFlagged.into()
        }
        StatusCode::TOO_MANY_REQUESTS => {
            error!("Stability RateLimitError: {body}");
            ImageFailure::ProviderRateLimited.into()
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            error!("Stability InternalServerError: {body}");
            ProviderError::ServiceDown.into()
        }
        s => {
            error!("Stability Error ({s}): {body}");
            ProviderError::Malformed.into()
        }
    }
}

#[async_trait]
impl ImageEngine for StabilityEngine {
    fn name(&self) -> &'static str {
        "stability"
    }

    async fn imagine(&self, request: ImagineRequest) -> ImageOutcome {
        if !self.check_rate_limit(&request.identity) {
            return ImageFailure::Throttled {
                limit: self.rate_limiter.limit(),
                window_secs: self.rate_limiter.window_secs(),
            }
            .into();
        }

        let parsed = match directives::parse(&request.prompt, Vocabulary::Stability) {
            Ok(parsed) => parsed,
            Err(e) => return InvalidInput::from(e).into(),
        };
        if parsed.prompt.is_empty() {
            return InvalidInput::EmptyPrompt.into();
        }
        if request.style.is_some() || parsed.directives.style.is_some() {
            debug!("Style is not supported by Stability, ignoring it");
        }

        let form = self.build_form(&request, parsed.prompt, parsed.directives);
        let prompt = form.prompt.clone();
        let output_format = form.output_format.clone();

        info!(
            "Generating image | Engine: stability | Ratio: {} | Seed: {} | Negative: {:?} | Prompt: '{}'",
            form.aspect_ratio,
            form.seed,
            form.negative_prompt,
            log_prompt(&prompt)
        );

        let response = match self
            .http
            .post(&self.settings.url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .multipart(form.into_multipart())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Could not imagine image from text | Engine: stability | Error: {e:?}");
                return ImageOutcome::Unexpected;
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(text) => classify_response(status, &text, &prompt, &output_format, request.revision),
            Err(e) => {
                error!("Could not read Stability response ({status}): {e:?}");
                ImageOutcome::Unexpected
            }
        }
    }

    async fn generate_image(
        &self,
        prompt: Option<&str>,
        orientation: Option<Orientation>,
        style: Option<ImageStyle>,
    ) -> Option<ImageOutcome> {
        debug!(
            "Generating image from prompt: {:?}, orientation: {:?}, style: {:?}",
            prompt.map(log_prompt),
            orientation.map(|o| o.as_str()),
            style
        );
        let prompt = prompt?;
        if style.is_some() {
            warn!("Image style is not supported by Stability");
        }

        let mut request = ImagineRequest::new(prompt, Identity::function())
            .with_quality(ImageQuality::Standard)
            .with_revision(true);
        if let Some(orientation) = orientation {
            request = request.with_size(orientation_ratio(orientation));
        }

        Some(self.imagine(request).await)
    }

    fn check_rate_limit(&self, identity: &Identity) -> bool {
        self.rate_limiter.check(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::directives::PromptDirectives;
    use httpmock::{Method::POST, MockServer};

    const GENERATE_PATH: &str = "/v2beta/stable-image/generate/core";

    fn engine(server: &MockServer, settings: StabilitySettings) -> StabilityEngine {
        let settings = StabilitySettings {
            url: server.url(GENERATE_PATH),
            ..settings
        };
        StabilityEngine::new("sk-test", settings).unwrap()
    }

    fn field(name: &str, value: &str) -> String {
        format!("name=\"{name}\"\r\n\r\n{value}\r\n")
    }

    fn success_body() -> String {
        serde_json::json!({
            "image": "AQID",
            "seed": 1234,
            "finish_reason": "SUCCESS"
        })
        .to_string()
    }

    #[test]
    fn test_settings_require_image_generation_section() {
        let config = AppConfig::parse("openai:\n  api_key: sk\n").unwrap();
        assert!(StabilitySettings::from_config(&config).is_err());
    }

    #[test]
    fn test_settings_none_negative_prompt() {
        let config = AppConfig::parse(
            "image_generation:\n  negative_prompt: None\n  ratio: \"3:2\"\n  seed: 9\n",
        )
        .unwrap();
        let settings = StabilitySettings::from_config(&config).unwrap();
        assert_eq!(settings.negative_prompt, None);
        assert_eq!(settings.ratio, "3:2");
        assert_eq!(settings.seed, 9);
        assert_eq!(settings.url, DEFAULT_URL);
    }

    #[test]
    fn test_engine_from_config_keeps_settings() {
        let config = AppConfig::parse(
            "stability:\n  api_key: sk-test\nimage_generation:\n  ratio: \"3:2\"\n  seed: 7\n",
        )
        .unwrap();
        let engine = StabilityEngine::from_config(&config).unwrap();
        assert_eq!(engine.settings().ratio, "3:2");
        assert_eq!(engine.settings().seed, 7);
        assert_eq!(engine.settings().url, StabilitySettings::default().url);
    }

    #[test]
    fn test_build_form_precedence() {
        let engine = StabilityEngine::new(
            "sk-test",
            StabilitySettings {
                negative_prompt: Some("blurry".to_string()),
                seed: 5,
                ..Default::default()
            },
        )
        .unwrap();

        let found = PromptDirectives {
            ratio: Some("21:9".to_string()),
            seed: Some(42),
            negative_prompt: Some("fog".to_string()),
            ..Default::default()
        };

        let request = ImagineRequest::new("ignored", 1i64);
        let form = engine.build_form(&request, "a dog".to_string(), found.clone());
        assert_eq!(form.aspect_ratio, "21:9");
        assert_eq!(form.seed, 42);
        assert_eq!(form.negative_prompt.as_deref(), Some("blurry; fog"));
        assert_eq!(form.output_format, DEFAULT_OUTPUT_FORMAT);

        let request = ImagineRequest::new("ignored", 1i64)
            .with_size("4:5")
            .with_seed(7)
            .with_negative_prompt("text")
            .with_output_format("png");
        let form = engine.build_form(&request, "a dog".to_string(), found);
        assert_eq!(form.aspect_ratio, "4:5");
        assert_eq!(form.seed, 7);
        assert_eq!(form.negative_prompt.as_deref(), Some("blurry; text; fog"));
        assert_eq!(form.output_format, "png");
    }

    #[test]
    fn test_build_form_defaults_and_orientation() {
        let engine = StabilityEngine::new("sk-test", StabilitySettings::default()).unwrap();
        let request = ImagineRequest::new("ignored", 1i64);

        let form = engine.build_form(&request, "a dog".to_string(), PromptDirectives::default());
        assert_eq!(form.aspect_ratio, SQUARE_RATIO);
        assert_eq!(form.seed, 0);
        assert_eq!(form.negative_prompt, None);

        let found = PromptDirectives {
            orientation: Some(Orientation::Landscape),
            ..Default::default()
        };
        let form = engine.build_form(&request, "a dog".to_string(), found);
        assert_eq!(form.aspect_ratio, LANDSCAPE_RATIO);
    }

    #[test]
    fn test_classify_status_codes() {
        let classify = |status| classify_response(status, "{}", "p", "jpeg", false);

        assert_eq!(classify(StatusCode::BAD_REQUEST), ImageOutcome::from(ProviderError::Rejected));
        assert_eq!(
            classify(StatusCode::FORBIDDEN),
            ImageOutcome::from(ImageFailure::ModerationFlagged)
        );
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            ImageOutcome::from(ImageFailure::ProviderRateLimited)
        );
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            ImageOutcome::from(ProviderError::ServiceDown)
        );
        assert_eq!(classify(StatusCode::NOT_FOUND), ImageOutcome::from(ProviderError::Malformed));
        assert_eq!(
            classify(StatusCode::OK),
            ImageOutcome::from(ProviderError::NoImage {
                finish_reason: None
            })
        );
        assert_eq!(
            classify_response(StatusCode::OK, "not json", "p", "jpeg", false),
            ImageOutcome::from(ProviderError::Malformed)
        );
    }

    #[test]
    fn test_stability_messages_differ_from_dalle() {
        let (_, moderated) = classify_response(StatusCode::FORBIDDEN, "{}", "p", "jpeg", false)
            .into_parts();
        assert_eq!(
            moderated.as_deref(),
            Some("Your request was flagged by content moderation. Please review it and try again.")
        );

        let (_, rejected) = classify_response(StatusCode::BAD_REQUEST, "{}", "p", "jpeg", false)
            .into_parts();
        assert_eq!(rejected.as_deref(), Some("Your request was rejected (BadRequest)."));
    }

    #[test]
    fn test_classify_missing_image_with_finish_reason() {
        let outcome = classify_response(
            StatusCode::OK,
            r#"{"finish_reason":"CONTENT_FILTERED"}"#,
            "p",
            "jpeg",
            false,
        );
        assert_eq!(
            outcome,
            ImageOutcome::from(ProviderError::NoImage {
                finish_reason: Some("CONTENT_FILTERED".to_string())
            })
        );
        assert_eq!(
            outcome.into_parts().1.as_deref(),
            Some("Could not generate image. Finish Reason: CONTENT_FILTERED")
        );
    }

    #[tokio::test]
    async fn test_imagine_sends_parsed_directives() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GENERATE_PATH)
                    .header("authorization", "Bearer sk-test")
                    .header("accept", "application/json")
                    .body_includes(field("prompt", "a dog"))
                    .body_includes(field("aspect_ratio", "16:9"))
                    .body_includes(field("seed", "42"))
                    .body_includes(field("output_format", "jpeg"));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(success_body());
            })
            .await;

        let engine = engine(&server, StabilitySettings::default());
        let outcome = engine
            .imagine(ImagineRequest::new("a dog --seed 42 --ratio 16:9", "alice").with_revision(true))
            .await;

        mock.assert_async().await;
        let (image, revision) = outcome.into_parts();
        let image = image.unwrap();
        assert_eq!(image.media_type, "image/jpeg");
        assert_eq!(image.decode().unwrap(), vec![1, 2, 3]);
        assert_eq!(
            revision.as_deref(),
            Some("Prompt: a dog. Seed: 1234. Finish Reason: SUCCESS")
        );
    }

    #[tokio::test]
    async fn test_negative_prompts_accumulate() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GENERATE_PATH)
                    .body_includes(field("negative_prompt", "blurry; fog"))
                    .body_includes(field("prompt", "a forest"));
                then.status(200).body(success_body());
            })
            .await;

        let settings = StabilitySettings {
            negative_prompt: Some("blurry".to_string()),
            ..Default::default()
        };
        let outcome = engine(&server, settings)
            .imagine(ImagineRequest::new("a forest --negative fog", "alice"))
            .await;

        mock.assert_async().await;
        let (image, revision) = outcome.into_parts();
        assert!(image.is_some());
        assert!(revision.is_none());
    }

    #[tokio::test]
    async fn test_content_moderation_end_to_end() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(GENERATE_PATH);
                then.status(403).body(
                    serde_json::json!({
                        "name": "content_moderation",
                        "errors": ["Your request was flagged"]
                    })
                    .to_string(),
                );
            })
            .await;

        let outcome = engine(&server, StabilitySettings::default())
            .imagine(ImagineRequest::new("a dog", "alice"))
            .await;
        assert_eq!(outcome, ImageOutcome::from(ImageFailure::ModerationFlagged));
    }

    #[tokio::test]
    async fn test_invalid_seed_directive_is_invalid_input() {
        let server = MockServer::start_async().await;
        let outcome = engine(&server, StabilitySettings::default())
            .imagine(ImagineRequest::new("a dog --seed lucky", "alice"))
            .await;

        assert!(matches!(
            outcome.failure(),
            Some(ImageFailure::InvalidInput(InvalidInput::Directive(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_prompt_is_invalid_input() {
        let server = MockServer::start_async().await;
        let outcome = engine(&server, StabilitySettings::default())
            .imagine(ImagineRequest::new("--seed 3 --vertical", "alice"))
            .await;
        assert_eq!(outcome, ImageOutcome::from(InvalidInput::EmptyPrompt));
    }

    #[tokio::test]
    async fn test_generate_image_landscape() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GENERATE_PATH)
                    .body_includes(field("aspect_ratio", "16:9"))
                    .body_includes(field("seed", "11"));
                then.status(200).body(success_body());
            })
            .await;

        let settings = StabilitySettings {
            seed: 11,
            ..Default::default()
        };
        let outcome = engine(&server, settings)
            .generate_image(Some("a canyon"), Some(Orientation::Landscape), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(outcome.is_generated());
    }

    #[tokio::test]
    async fn test_generate_image_shares_function_rate_limit() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(GENERATE_PATH);
                then.status(200).body(success_body());
            })
            .await;

        let settings = StabilitySettings {
            rate_limit_count: 1,
            rate_limit_time: 60,
            ..Default::default()
        };
        let engine = engine(&server, settings);

        let first = engine.generate_image(Some("a canyon"), None, None).await.unwrap();
        let second = engine.generate_image(Some("a canyon"), None, None).await.unwrap();

        mock.assert_async().await;
        assert!(first.is_generated());
        assert!(matches!(second.failure(), Some(ImageFailure::Throttled { .. })));
        // End users are limited separately from tool calls
        assert!(engine.check_rate_limit(&Identity::from("alice")));
    }
}
