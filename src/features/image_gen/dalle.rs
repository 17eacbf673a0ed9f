//! # Feature: DALL-E Image Engine
//!
//! OpenAI images API (`/images/generations`) with size, style and quality
//! options. Responses are requested as base64 so no second download is needed.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Optional hashed end-user identifier for abuse tracking
//! - 1.1.0: Prompt directives (`--hd`, `--natural`, `--horizontal`, ...)
//! - 1.0.0: Initial release with DALL-E 3 support

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::engine::{log_prompt, ImageEngine, ImagineRequest};
use super::options::{ImageQuality, ImageStyle, Orientation};
use super::outcome::{GeneratedImage, ImageFailure, ImageOutcome, InvalidInput, ProviderError};
use crate::core::{AppConfig, Identity, Section};
use crate::features::directives::{self, Vocabulary};
use crate::features::rate_limiting::RateLimiter;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DALLE3_MODEL: &str = "dall-e-3";

const SQUARE_SIZE: &str = "1024x1024";
const LANDSCAPE_SIZE: &str = "1792x1024";
const PORTRAIT_SIZE: &str = "1024x1792";

/// DALL-E can take 10-30 seconds per image
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct DalleSettings {
    pub model: String,
    pub size: String,
    pub style: ImageStyle,
    pub quality: ImageQuality,
    pub price: f64,
    pub rate_limit_count: i64,
    pub rate_limit_time: i64,
    pub end_user_id: bool,
}

impl Default for DalleSettings {
    fn default() -> Self {
        Self {
            model: DALLE3_MODEL.to_string(),
            size: SQUARE_SIZE.to_string(),
            style: ImageStyle::Vivid,
            quality: ImageQuality::Standard,
            price: 0.0,
            rate_limit_count: 0,
            rate_limit_time: 0,
            end_user_id: false,
        }
    }
}

impl DalleSettings {
    /// Read settings from `image_generation`, falling back to the legacy
    /// `openai` section. Fails when neither section exists.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let section: &Section = match (&config.image_generation, &config.openai) {
            (Some(section), _) => section,
            (None, Some(section)) => {
                warn!("Reading image generation settings from the deprecated openai section");
                section
            }
            (None, None) => bail!(
                "Could not load image generation settings: missing image_generation section"
            ),
        };

        let defaults = Self::default();
        let style = match section.style.as_deref() {
            Some(raw) => ImageStyle::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Invalid image generation style: {raw}"))?,
            None => defaults.style,
        };
        let quality = match section.quality.as_deref() {
            Some(raw) => ImageQuality::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Invalid image generation quality: {raw}"))?,
            None => defaults.quality,
        };

        // image_generation overrides the openai section
        let end_user_id = config
            .image_generation
            .as_ref()
            .and_then(|s| s.end_user_id)
            .or_else(|| config.openai.as_ref().and_then(|s| s.end_user_id))
            .unwrap_or(false);

        Ok(Self {
            model: section.model.clone().unwrap_or(defaults.model),
            size: section.size.clone().unwrap_or(defaults.size),
            style,
            quality,
            price: section.price.unwrap_or(defaults.price),
            rate_limit_count: section.rate_limit_count.unwrap_or(defaults.rate_limit_count),
            rate_limit_time: section.rate_limit_time.unwrap_or(defaults.rate_limit_time),
            end_user_id,
        })
    }

    fn is_dalle3(&self) -> bool {
        self.model == DALLE3_MODEL
    }
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'static str,
    n: u32,
    response_format: &'static str,
    style: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

pub struct DalleEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: DalleSettings,
    rate_limiter: RateLimiter,
}

impl DalleEngine {
    pub fn new(api_key: impl Into<String>, settings: DalleSettings) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let rate_limiter = RateLimiter::new(settings.rate_limit_count, settings.rate_limit_time);

        let engine = Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            settings,
            rate_limiter,
        };
        engine.log_enabled();
        Ok(engine)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings = DalleSettings::from_config(config)?;
        let mut engine = Self::new(config.openai_api_key()?, settings)?;
        if let Some(base_url) = config.openai_base_url() {
            engine = engine.with_base_url(base_url);
        }
        Ok(engine)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn settings(&self) -> &DalleSettings {
        &self.settings
    }

    fn log_enabled(&self) {
        info!("Image generation via DALL-E is enabled | Model: {}", self.settings.model);
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

    fn images_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/images/generations") {
            base.to_string()
        } else {
            format!("{base}/images/generations")
        }
    }

    /// Size for an orientation directive. Only DALL-E 3 has non-square sizes.
    fn directive_size(&self, orientation: Orientation) -> Option<&'static str> {
        if !self.settings.is_dalle3() {
            return None;
        }
        Some(orientation_size(orientation))
    }
}

fn orientation_size(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Landscape => LANDSCAPE_SIZE,
        Orientation::Portrait => PORTRAIT_SIZE,
    }
}

/// Map an images API response to an outcome
fn classify_response(status: StatusCode, body: &str, revision: bool) -> ImageOutcome {
    if status.is_success() {
        let parsed: ImagesResponse = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("OpenAI returned an unreadable response: {e} | Body: {body}");
                return ProviderError::Malformed.into();
            }
        };

        let Some(item) = parsed.data.into_iter().next() else {
            error!("OpenAI response has no image data: {body}");
            return ProviderError::Malformed.into();
        };
        let Some(b64_image) = item.b64_json.filter(|data| !data.trim().is_empty()) else {
            error!("OpenAI response is missing b64_json: {body}");
            return ProviderError::Malformed.into();
        };

        let revised_prompt = if revision {
            if item.revised_prompt.is_none() {
                warn!("Could not get revised prompt from OpenAI response");
            }
            item.revised_prompt
        } else {
            None
        };

        return ImageOutcome::Generated {
            image: GeneratedImage::new(b64_image, "image/png"),
            revision: revised_prompt,
        };
    }

    match status {
        StatusCode::BAD_REQUEST => {
            error!("OpenAI BadRequestError: {body}");
            if body.contains("content_policy_violation") {
                ImageFailure::PolicyRejected.into()
            } else {
                ProviderError::BadRequest.into()
            }
        }
        StatusCode::FORBIDDEN => {
            error!("OpenAI ContentModerationError: {body}");
            ImageFailure::PolicyRejected.into()
        }
        StatusCode::TOO_MANY_REQUESTS => {
            error!("OpenAI RateLimitError: {body}");
            ImageFailure::ProviderRateLimited.into()
        }
        s if s.is_server_error() => {
            error!("OpenAI InternalServerError ({s}): {body}");
            ProviderError::ServiceDown.into()
        }
        s => {
            error!("OpenAI Error ({s}): {body}");
            ProviderError::Malformed.into()
        }
    }
}

#[async_trait]
impl ImageEngine for DalleEngine {
    fn name(&self) -> &'static str {
        "dalle"
    }

    async fn imagine(&self, request: ImagineRequest) -> ImageOutcome {
        if !self.check_rate_limit(&request.identity) {
            return ImageFailure::Throttled {
                limit: self.rate_limiter.limit(),
                window_secs: self.rate_limiter.window_secs(),
            }
            .into();
        }

        let parsed = match directives::parse(&request.prompt, Vocabulary::Dalle) {
            Ok(parsed) => parsed,
            Err(e) => return InvalidInput::from(e).into(),
        };
        if parsed.prompt.is_empty() {
            return InvalidInput::EmptyPrompt.into();
        }
        let found = parsed.directives;

        let size = request
            .size
            .clone()
            .or_else(|| {
                found
                    .orientation
                    .and_then(|o| self.directive_size(o))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.settings.size.clone());
        let style = request.style.or(found.style).unwrap_or(self.settings.style);
        let quality = request
            .quality
            .or(found.quality)
            .unwrap_or(self.settings.quality);
        let user = self
            .settings
            .end_user_id
            .then(|| request.identity.pseudonym());

        let body = ImagesRequest {
            model: &self.settings.model,
            prompt: &parsed.prompt,
            size: &size,
            quality: quality.as_str(),
            n: request.count.unwrap_or(1),
            response_format: "b64_json",
            style: style.as_str(),
            user,
        };

        info!(
            "Generating image | Engine: dalle | Size: {} | Style: {} | Quality: {} | Prompt: '{}'",
            size,
            style.as_str(),
            quality.as_str(),
            log_prompt(&parsed.prompt)
        );

        let response = match self
            .http
            .post(self.images_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Could not imagine image from text | Engine: dalle | Error: {e:?}");
                return ImageOutcome::Unexpected;
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(text) => classify_response(status, &text, request.revision),
            Err(e) => {
                error!("Could not read OpenAI response ({status}): {e:?}");
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

        let mut request = ImagineRequest::new(prompt, Identity::function())
            .with_quality(ImageQuality::Standard)
            .with_count(1)
            .with_revision(true);
        if let Some(orientation) = orientation {
            request = request.with_size(orientation_size(orientation));
        }
        if let Some(style) = style {
            request = request.with_style(style);
        }

        Some(self.imagine(request).await)
    }

    fn check_rate_limit(&self, identity: &Identity) -> bool {
        self.rate_limiter.check(identity)
    }
}
