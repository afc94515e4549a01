//! Detector configuration
//!
//! Invalid values never abort: [`DetectorConfig::validated`] clamps each one
//! to its nearest bound and logs a warning.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::patterns::CleanupPolicy;

/// Recognized options. JSON keys are camelCase; missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
    /// When false, decisions are recorded in history but never learned from.
    pub learning_enabled: bool,
    pub max_patterns_per_domain: usize,
    pub pattern_stale_days: u32,
    pub min_confidence_to_keep: f64,
    pub persist_timeout_ms: u64,
    pub cleanup_interval_secs: u64,
    pub history_max_entries: usize,
    pub history_max_age_days: u32,
    pub pending_queue_capacity: usize,
    pub pending_max_age_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            learning_enabled: true,
            max_patterns_per_domain: 100,
            pattern_stale_days: 30,
            min_confidence_to_keep: 0.3,
            persist_timeout_ms: 3_000,
            cleanup_interval_secs: 3_600,
            history_max_entries: 500,
            history_max_age_days: 30,
            pending_queue_capacity: 64,
            pending_max_age_ms: 30_000,
        }
    }
}

macro_rules! clamp_field {
    ($errors:ident, $cfg:ident . $field:ident, $min:expr, $max:expr) => {{
        let (min, max) = ($min, $max);
        if $cfg.$field < min || $cfg.$field > max {
            $errors.push(ConfigError::OutOfRange {
                field: stringify!($field),
                value: $cfg.$field as f64,
                min: min as f64,
                max: max as f64,
            });
            $cfg.$field = $cfg.$field.clamp(min, max);
        }
    }};
}

impl DetectorConfig {
    /// Parse a JSON document and clamp it. Only malformed JSON is an error.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let parsed: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(parsed.validated())
    }

    /// Clamp every option into range, returning the adjusted config and the
    /// problems found.
    pub fn clamp(mut self) -> (Self, Vec<ConfigError>) {
        let mut errors = Vec::new();
        let cfg = &mut self;

        if !cfg.min_confidence_to_keep.is_finite() {
            errors.push(ConfigError::NotFinite { field: "min_confidence_to_keep" });
            cfg.min_confidence_to_keep = Self::default().min_confidence_to_keep;
        }

        clamp_field!(errors, cfg.max_patterns_per_domain, 1usize, 10_000usize);
        clamp_field!(errors, cfg.pattern_stale_days, 1u32, 365u32);
        clamp_field!(errors, cfg.min_confidence_to_keep, 0.1f64, 1.0f64);
        clamp_field!(errors, cfg.persist_timeout_ms, 100u64, 60_000u64);
        clamp_field!(errors, cfg.cleanup_interval_secs, 60u64, 86_400u64);
        clamp_field!(errors, cfg.history_max_entries, 1usize, 100_000usize);
        clamp_field!(errors, cfg.history_max_age_days, 1u32, 365u32);
        clamp_field!(errors, cfg.pending_queue_capacity, 1usize, 10_000usize);
        clamp_field!(errors, cfg.pending_max_age_ms, 100u64, 600_000u64);

        (self, errors)
    }

    /// Clamp every option into range, logging each adjustment.
    pub fn validated(self) -> Self {
        let (cfg, errors) = self.clamp();
        for e in &errors {
            warn!("config: {}; clamped", e);
        }
        cfg
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            max_patterns: self.max_patterns_per_domain,
            stale_days: self.pattern_stale_days,
            min_confidence: self.min_confidence_to_keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DetectorConfig::default();
        assert!(cfg.learning_enabled);
        assert_eq!(cfg.max_patterns_per_domain, 100);
        assert_eq!(cfg.pattern_stale_days, 30);
        assert_eq!(cfg.min_confidence_to_keep, 0.3);
        assert_eq!(cfg.clone().clamp().1, Vec::new());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = DetectorConfig::from_json(r#"{"learningEnabled": false}"#).unwrap();
        assert!(!cfg.learning_enabled);
        assert_eq!(cfg.max_patterns_per_domain, 100);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let cfg = DetectorConfig::from_json(
            r#"{"maxPatternsPerDomain": 0, "minConfidenceToKeep": 3.5, "patternStaleDays": 9000}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_patterns_per_domain, 1);
        assert_eq!(cfg.min_confidence_to_keep, 1.0);
        assert_eq!(cfg.pattern_stale_days, 365);
    }

    #[test]
    fn test_clamp_reports_each_field() {
        let cfg = DetectorConfig {
            persist_timeout_ms: 1,
            pending_queue_capacity: 0,
            ..DetectorConfig::default()
        };
        let (cfg, errors) = cfg.clamp();
        assert_eq!(errors.len(), 2);
        assert_eq!(cfg.persist_timeout_ms, 100);
        assert_eq!(cfg.pending_queue_capacity, 1);
    }

    #[test]
    fn test_non_finite_confidence_reset() {
        let cfg = DetectorConfig {
            min_confidence_to_keep: f64::NAN,
            ..DetectorConfig::default()
        };
        let (cfg, errors) = cfg.clamp();
        assert_eq!(cfg.min_confidence_to_keep, 0.3);
        assert!(matches!(errors[0], ConfigError::NotFinite { .. }));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(DetectorConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
