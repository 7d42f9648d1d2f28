//! Resolver configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Weights of the four partial matches the attribute matcher sums
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub id: f64,
    pub test_id: f64,
    pub aria_label: f64,
    pub text: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            id: 0.30,
            test_id: 0.30,
            aria_label: 0.20,
            text: 0.20,
        }
    }
}

/// Options controlling how locators are resolved and healed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum attribute-similarity score to accept a candidate
    pub attribute_threshold: f64,

    /// Minimum Jaro-Winkler similarity for an aria-label to count as matching
    pub aria_similarity_threshold: f64,

    /// Minimum confidence reported by the suggestion provider
    pub suggestion_threshold: f64,

    /// Upper bound on one suggestion call, in milliseconds
    pub suggestion_timeout_ms: u64,

    /// Consecutive identical heals required before promotion is suggested
    pub promotion_window: usize,

    /// Fail with `AmbiguousMatch` instead of falling through when the
    /// primary query matches several elements
    pub strict: bool,

    pub weights: MatchWeights,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            attribute_threshold: 0.7,
            aria_similarity_threshold: 0.8,
            suggestion_threshold: 0.7,
            suggestion_timeout_ms: 10_000,
            promotion_window: 3,
            strict: false,
            weights: MatchWeights::default(),
        }
    }
}

impl ResolverConfig {
    /// Create config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their meaningful range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("attribute_threshold", self.attribute_threshold),
            ("aria_similarity_threshold", self.aria_similarity_threshold),
            ("suggestion_threshold", self.suggestion_threshold),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is outside [0, 1]", value),
                });
            }
        }

        let w = &self.weights;
        if [w.id, w.test_id, w.aria_label, w.text]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(ConfigError::Invalid {
                field: "weights",
                reason: "weights must be finite and non-negative".to_string(),
            });
        }

        if self.promotion_window == 0 {
            return Err(ConfigError::Invalid {
                field: "promotion_window",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Builder method: set attribute acceptance threshold
    pub fn attribute_threshold(mut self, threshold: f64) -> Self {
        self.attribute_threshold = threshold;
        self
    }

    /// Builder method: set suggestion acceptance threshold
    pub fn suggestion_threshold(mut self, threshold: f64) -> Self {
        self.suggestion_threshold = threshold;
        self
    }

    /// Builder method: set suggestion timeout
    pub fn suggestion_timeout(mut self, timeout: Duration) -> Self {
        self.suggestion_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder method: set promotion window
    pub fn promotion_window(mut self, window: usize) -> Self {
        self.promotion_window = window;
        self
    }

    /// Builder method: enable strict ambiguity handling
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Builder method: set match weights
    pub fn weights(mut self, weights: MatchWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Suggestion timeout as a Duration
    pub fn suggestion_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }
}
