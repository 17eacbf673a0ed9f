//! # Features
//!
//! - `image_gen`: engines, request/outcome types
//! - `directives`: inline prompt flags
//! - `rate_limiting`: per-caller sliding window limiter

pub mod directives;
pub mod image_gen;
pub mod rate_limiting;

pub use directives::{DirectiveError, ParsedPrompt, PromptDirectives, Vocabulary};
pub use image_gen::{
    build_engine, build_named_engine, DalleEngine, DalleSettings, GeneratedImage, ImageEngine,
    ImageFailure, ImageOutcome, ImageQuality, ImageStyle, ImagineRequest, InvalidInput,
    Orientation, ProviderError, StabilityEngine, StabilitySettings,
};
pub use rate_limiting::RateLimiter;
