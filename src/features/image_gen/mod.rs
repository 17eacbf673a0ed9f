//! # Image Generation Feature
//!
//! DALL-E and Stability powered image creation behind one `ImageEngine` trait.
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Stability engine, shared outcome taxonomy, engine selection from config
//! - 1.0.0: Initial release with DALL-E 3

pub mod dalle;
pub mod engine;
pub mod options;
pub mod outcome;
pub mod stability;

pub use dalle::{DalleEngine, DalleSettings};
pub use engine::{ImageEngine, ImagineRequest};
pub use options::{ImageQuality, ImageStyle, Orientation};
pub use outcome::{GeneratedImage, ImageFailure, ImageOutcome, InvalidInput, ProviderError};
pub use stability::{StabilityEngine, StabilitySettings};

use anyhow::{bail, Result};

use crate::core::AppConfig;

/// Build the engine named in `image_generation.engine`
pub fn build_engine(config: &AppConfig) -> Result<Box<dyn ImageEngine>> {
    build_named_engine(config, &config.engine_name())
}

/// Build a specific engine regardless of the configured name
pub fn build_named_engine(config: &AppConfig, name: &str) -> Result<Box<dyn ImageEngine>> {
    match name {
        "dalle" | "dall-e" | "openai" => Ok(Box::new(DalleEngine::from_config(config)?)),
        "stability" | "stabilityai" => Ok(Box::new(StabilityEngine::from_config(config)?)),
        other => bail!("Unknown image engine: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
openai:
  api_key: sk-openai
stability:
  api_key: sk-stability
image_generation:
  engine: stability
"#;

    #[test]
    fn test_build_engine_from_config() {
        let config = AppConfig::parse(CONFIG).unwrap();
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.name(), "stability");
    }

    #[test]
    fn test_build_named_engine() {
        let config = AppConfig::parse(CONFIG).unwrap();
        assert_eq!(build_named_engine(&config, "dalle").unwrap().name(), "dalle");
        assert!(build_named_engine(&config, "midjourney").is_err());
    }

    #[test]
    fn test_build_engine_requires_settings() {
        let config = AppConfig::parse("stability:\n  api_key: sk\n").unwrap();
        assert!(build_named_engine(&config, "stability").is_err());
    }
}
