//! Settings read from `plugins.settings.rate-limit`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limiter::DEFAULT_PRUNE_EVERY;

/// Rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Bucket capacity; also the burst size.
    pub max_tokens: u32,
    /// Tokens restored per second.
    pub refill_per_second: f64,
    /// Middleware priority.
    pub priority: i32,
    /// Middleware scope.
    pub scope: String,
    /// New clients admitted between sweeps of refilled buckets.
    pub prune_every: usize,
}

/// Settings that cannot produce a working limiter.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    /// A bucket that can never hold a token rejects everything.
    #[error("max_tokens must be at least 1")]
    ZeroCapacity,
    /// Refill rate is negative, NaN, or infinite.
    #[error("refill_per_second must be a finite, non-negative number (got {0})")]
    InvalidRefill(f64),
}

impl RateLimitSettings {
    /// Checks the settings can drive a limiter.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_tokens == 0 {
            return Err(SettingsError::ZeroCapacity);
        }
        if !self.refill_per_second.is_finite() || self.refill_per_second < 0.0 {
            return Err(SettingsError::InvalidRefill(self.refill_per_second));
        }
        Ok(())
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_tokens: 60,
            refill_per_second: 1.0,
            priority: 10,
            scope: "/".to_string(),
            prune_every: DEFAULT_PRUNE_EVERY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = RateLimitSettings::default();
        assert_eq!(settings.max_tokens, 60);
        assert_eq!(settings.priority, 10);
        assert_eq!(settings.prune_every, 1024);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: RateLimitSettings =
            serde_json::from_value(serde_json::json!({ "max_tokens": 5, "scope": "/session" }))
                .unwrap();
        assert_eq!(settings.max_tokens, 5);
        assert_eq!(settings.scope, "/session");
        assert_eq!(settings.refill_per_second, 1.0);
    }

    #[test]
    fn test_invalid_settings() {
        let zero = RateLimitSettings {
            max_tokens: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(SettingsError::ZeroCapacity));

        let negative = RateLimitSettings {
            refill_per_second: -1.0,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(SettingsError::InvalidRefill(_))));
    }
}
