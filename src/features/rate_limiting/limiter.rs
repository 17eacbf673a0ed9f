//! # Feature: Rate Limiting
//!
//! Per-identity sliding window limiter for image generation requests. Uses
//! DashMap so engines can share `&self` across concurrent tasks.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true (disabled when count or window is not positive)
//!
//! ## Changelog
//! - 1.1.0: Explicit-clock `check_at` for deterministic window tests
//! - 1.0.0: Initial release with per-identity sliding window

use dashmap::DashMap;
use log::{debug, error};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::Identity;

/// Sliding window limiter owned by one engine.
///
/// Every call to `check` records a timestamp, including calls that end up
/// denied here or rejected later by the engine (e.g. empty prompt). Keys are
/// never evicted.
#[derive(Debug)]
pub struct RateLimiter {
    requests: DashMap<Identity, Vec<f64>>,
    max_requests: i64,
    window_secs: i64,
}

impl RateLimiter {
    pub fn new(max_requests: i64, window_secs: i64) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            window_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0 && self.window_secs > 0
    }

    pub fn limit(&self) -> i64 {
        self.max_requests
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Returns true if the request is allowed.
    ///
    /// Fails open: if the system clock cannot be read the request is allowed
    /// and the error is logged.
    pub fn check(&self, identity: &Identity) -> bool {
        if !self.is_enabled() {
            return true;
        }

        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(now) => self.check_at(identity, now.as_secs_f64()),
            Err(e) => {
                error!("Could not check image rate limit due to an error: {e}");
                true
            }
        }
    }

    /// Same as `check` with an explicit timestamp (seconds since epoch)
    pub fn check_at(&self, identity: &Identity, now: f64) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let window = self.window_secs as f64;
        let mut entry = self.requests.entry(identity.clone()).or_default();

        entry.push(now);
        entry.retain(|&time| now - time < window);

        let allowed = entry.len() as i64 <= self.max_requests;
        if !allowed {
            debug!(
                "Rate limited | Identity: {} | Requests in window: {}",
                identity,
                entry.len()
            );
        }
        allowed
    }

    /// Number of timestamps currently held for an identity
    pub fn recorded(&self, identity: &Identity) -> usize {
        self.requests.get(identity).map(|e| e.len()).unwrap_or(0)
    }
}
