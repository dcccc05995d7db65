//! # Fabrication Configuration
//!
//! Timing and sizing knobs for the engine. Sources, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. an optional YAML file,
//! 3. `NEXUS_*` environment variables.
//!
//! Environment values that fail to parse are ignored and the lower-priority
//! value stays in effect. The merged result is range-checked by
//! [`FabricationConfig::validate()`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest duration any setting may hold: one hundred years.
pub const MAX_DURATION_SECONDS: i64 = 100 * 366 * 86_400;

/// Engine configuration. Durations are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricationConfig {
    /// How far back from creation a Preview chain starts.
    pub preview_length_max_seconds: i64,
    /// A Fabricate chain younger than this is never revived.
    pub revive_threshold_start_seconds: i64,
    /// A Dubbed segment ending within this window marks a chain as healthy.
    pub revive_threshold_head_seconds: i64,
    /// Upper bound on segments returned by one list read.
    pub segment_read_limit: usize,
    /// How far ahead of now the planner may begin new segments.
    pub work_ahead_seconds: i64,
    /// How long past its stop time a chain waits before completing.
    pub complete_grace_seconds: i64,
}

impl Default for FabricationConfig {
    fn default() -> Self {
        Self {
            preview_length_max_seconds: 3600,
            revive_threshold_start_seconds: 120,
            revive_threshold_head_seconds: 60,
            segment_read_limit: 1000,
            work_ahead_seconds: 30,
            complete_grace_seconds: 10,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{field} must be between 0 and {MAX_DURATION_SECONDS} seconds, got {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

impl FabricationConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok());
        config
    }

    /// Parse YAML; absent keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject negative durations and durations too long to add to a
    /// timestamp.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("preview_length_max_seconds", self.preview_length_max_seconds),
            ("revive_threshold_start_seconds", self.revive_threshold_start_seconds),
            ("revive_threshold_head_seconds", self.revive_threshold_head_seconds),
            ("work_ahead_seconds", self.work_ahead_seconds),
            ("complete_grace_seconds", self.complete_grace_seconds),
        ];
        for (field, value) in durations {
            if !(0..=MAX_DURATION_SECONDS).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Apply `NEXUS_*` overrides resolved through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let int = |var: &str| lookup(var).and_then(|s| s.trim().parse::<i64>().ok());
        if let Some(v) = int("NEXUS_PREVIEW_LENGTH_MAX_SECONDS") {
            self.preview_length_max_seconds = v;
        }
        if let Some(v) = int("NEXUS_REVIVE_THRESHOLD_START_SECONDS") {
            self.revive_threshold_start_seconds = v;
        }
        if let Some(v) = int("NEXUS_REVIVE_THRESHOLD_HEAD_SECONDS") {
            self.revive_threshold_head_seconds = v;
        }
        if let Some(v) = lookup("NEXUS_SEGMENT_READ_LIMIT").and_then(|s| s.trim().parse().ok()) {
            self.segment_read_limit = v;
        }
        if let Some(v) = int("NEXUS_WORK_AHEAD_SECONDS") {
            self.work_ahead_seconds = v;
        }
        if let Some(v) = int("NEXUS_COMPLETE_GRACE_SECONDS") {
            self.complete_grace_seconds = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = FabricationConfig::default();
        assert_eq!(config.preview_length_max_seconds, 3600);
        assert_eq!(config.revive_threshold_start_seconds, 120);
        assert_eq!(config.revive_threshold_head_seconds, 60);
        assert_eq!(config.segment_read_limit, 1000);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = FabricationConfig::from_yaml_str("work_ahead_seconds: 45\n").unwrap();
        assert_eq!(config.work_ahead_seconds, 45);
        assert_eq!(config.complete_grace_seconds, 10);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            FabricationConfig::from_yaml_str("work_ahead_seconds: [1, 2]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn overrides_take_priority_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("NEXUS_REVIVE_THRESHOLD_HEAD_SECONDS", "15"),
            ("NEXUS_SEGMENT_READ_LIMIT", " 20 "),
            ("NEXUS_WORK_AHEAD_SECONDS", "soon"),
        ]
        .into_iter()
        .collect();
        let mut config = FabricationConfig::default();
        config.apply_overrides(|var| env.get(var).map(|v| v.to_string()));
        assert_eq!(config.revive_threshold_head_seconds, 15);
        assert_eq!(config.segment_read_limit, 20);
        assert_eq!(config.work_ahead_seconds, 30);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "preview_length_max_seconds: 600").unwrap();
        writeln!(file, "revive_threshold_start_seconds: 300").unwrap();
        let config = FabricationConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.preview_length_max_seconds, 600);
        assert_eq!(config.revive_threshold_start_seconds, 300);
    }

    #[test]
    fn defaults_are_in_range() {
        assert!(FabricationConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_override_is_rejected() {
        let mut config = FabricationConfig::default();
        config.apply_overrides(|var| {
            (var == "NEXUS_REVIVE_THRESHOLD_START_SECONDS").then(|| "9223372036854775".to_string())
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "revive_threshold_start_seconds",
                value: 9_223_372_036_854_775,
            })
        ));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let config = FabricationConfig {
            complete_grace_seconds: -1,
            ..FabricationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "complete_grace_seconds", .. })
        ));
    }

    #[test]
    fn load_rejects_out_of_range_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "work_ahead_seconds: -30").unwrap();
        assert!(matches!(
            FabricationConfig::load(Some(file.path())),
            Err(ConfigError::OutOfRange { field: "work_ahead_seconds", value: -30 })
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            FabricationConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }
}
