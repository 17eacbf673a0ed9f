// Core layer - configuration and caller identity
pub mod core;

// Features layer - engines, directives, rate limiting
pub mod features;

// Re-export core config for convenience
pub use core::{AppConfig, Identity};

// Re-export feature items
pub use features::{
    // Engines
    build_engine, build_named_engine, DalleEngine, DalleSettings, ImageEngine, StabilityEngine,
    StabilitySettings,
    // Requests and outcomes
    GeneratedImage, ImageFailure, ImageOutcome, ImagineRequest, InvalidInput, ProviderError,
    // Options
    ImageQuality, ImageStyle, Orientation,
    // Directives
    DirectiveError, ParsedPrompt, PromptDirectives, Vocabulary,
    // Rate limiting
    RateLimiter,
};
