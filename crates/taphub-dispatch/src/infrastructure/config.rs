//! Dispatcher tuning options.
//!
//! Host applications typically keep these in their own TOML configuration
//! file; every field carries a serde default so a partial (or absent) table
//! yields a working dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for options parsing.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// The TOML content could not be parsed.
    #[error("failed to parse options TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning knobs for a [`Dispatcher`](crate::application::dispatch::Dispatcher).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchOptions {
    /// Initial value of the manual enable override.
    #[serde(default = "default_true")]
    pub enabled_at_start: bool,
    /// Whether an OS-forced source revocation triggers an automatic
    /// disable/re-enable cycle.
    #[serde(default = "default_true")]
    pub self_heal: bool,
    /// A receiver that holds the delivery thread longer than this is logged
    /// as a warning; the OS revokes taps that overstay their budget.
    #[serde(default = "default_slow_receiver_warn_ms")]
    pub slow_receiver_warn_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_slow_receiver_warn_ms() -> u64 {
    100
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            enabled_at_start: default_true(),
            self_heal: default_true(),
            slow_receiver_warn_ms: default_slow_receiver_warn_ms(),
        }
    }
}

impl DispatchOptions {
    /// Parses options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(content)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        // Arrange / Act
        let options = DispatchOptions::default();

        // Assert
        assert!(options.enabled_at_start);
        assert!(options.self_heal);
        assert_eq!(options.slow_receiver_warn_ms, 100);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let options = DispatchOptions::from_toml_str("").expect("parse empty");
        assert_eq!(options, DispatchOptions::default());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        // Arrange
        let toml_str = r#"
self_heal = false
"#;

        // Act
        let options = DispatchOptions::from_toml_str(toml_str).expect("parse partial");

        // Assert
        assert!(!options.self_heal);
        // Unspecified fields keep their defaults
        assert!(options.enabled_at_start);
        assert_eq!(options.slow_receiver_warn_ms, 100);
    }

    #[test]
    fn test_round_trip_through_toml() {
        // Arrange
        let mut options = DispatchOptions::default();
        options.enabled_at_start = false;
        options.slow_receiver_warn_ms = 250;

        // Act
        let rendered = toml::to_string_pretty(&options).expect("serialize");
        let restored = DispatchOptions::from_toml_str(&rendered).expect("deserialize");

        // Assert
        assert_eq!(options, restored);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result = DispatchOptions::from_toml_str("[[[ not valid toml");
        assert!(matches!(result, Err(OptionsError::Parse(_))));
    }
}
