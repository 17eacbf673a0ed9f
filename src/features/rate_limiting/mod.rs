//! # Rate Limiting Feature
//!
//! Throttles image generation with configurable request limits per caller.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true

pub mod limiter;

pub use limiter::RateLimiter;
