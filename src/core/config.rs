//! # Configuration
//!
//! YAML configuration file with per-provider sections. API keys may also come
//! from the environment (loaded from `.env` by the binary via dotenvy).
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Legacy `openai` section accepted as image generation settings
//! - 1.0.0: Initial release

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Config file used when `IMAGE_ENGINES_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "image_engines.yaml";

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OpenAI credentials. Older config files also kept the image
    /// generation keys here.
    #[serde(default)]
    pub openai: Option<Section>,

    /// Stability credentials
    #[serde(default)]
    pub stability: Option<Section>,

    /// Image generation settings shared by both engines
    #[serde(default)]
    pub image_generation: Option<Section>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// One configuration section. Every key is optional here; each engine
/// applies its own defaults and decides which sections it requires.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Section {
    /// Engine to build (`dalle` or `stability`)
    pub engine: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,

    pub model: Option<String>,
    pub size: Option<String>,
    pub style: Option<String>,
    pub quality: Option<String>,

    /// Default aspect ratio (stability)
    pub ratio: Option<String>,
    /// Generation endpoint (stability)
    pub url: Option<String>,

    /// Informational price per image
    pub price: Option<f64>,
    pub rate_limit_count: Option<i64>,
    /// Rate limit window in seconds
    pub rate_limit_time: Option<i64>,

    pub negative_prompt: Option<String>,
    pub seed: Option<u64>,

    /// Send a hashed end-user identifier with each request
    pub end_user_id: Option<bool>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file {path}"))
    }

    /// Parse configuration from YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Config path from `IMAGE_ENGINES_CONFIG`, falling back to the default
    pub fn path_from_env() -> String {
        env::var("IMAGE_ENGINES_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Engine selected in `image_generation.engine` (default: dalle)
    pub fn engine_name(&self) -> String {
        self.image_generation
            .as_ref()
            .and_then(|s| s.engine.as_deref())
            .map(|name| name.trim().to_lowercase())
            .unwrap_or_else(|| "dalle".to_string())
    }

    /// OpenAI API key from the `openai` section or `OPENAI_API_KEY`
    pub fn openai_api_key(&self) -> Result<String> {
        resolve_api_key(self.openai.as_ref(), "OPENAI_API_KEY")
    }

    /// Stability API key from the `stability` section or `STABILITY_API_KEY`
    pub fn stability_api_key(&self) -> Result<String> {
        resolve_api_key(self.stability.as_ref(), "STABILITY_API_KEY")
    }

    /// Custom OpenAI-compatible base URL, if configured
    pub fn openai_base_url(&self) -> Option<String> {
        self.openai
            .as_ref()
            .and_then(|s| s.base_url.clone())
            .filter(|url| !url.trim().is_empty())
    }
}

fn resolve_api_key(section: Option<&Section>, env_key: &str) -> Result<String> {
    section
        .and_then(|s| s.api_key.clone())
        .or_else(|| env::var(env_key).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing API key: set api_key in config or {env_key}"))
}
