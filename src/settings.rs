//! Engine tunables.

use serde::{Deserialize, Serialize};

use crate::error::{CorrectionError, Result};

/// Largest accepted `tolerance`.
pub const MAX_TOLERANCE: usize = 10;

/// Tunables threaded into every component of the pipeline.
///
/// Deserializes from flat config-file keys; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Search radius for grouping, strays and row shifts.
    pub tolerance: usize,
    /// Shortest run reported as a line.
    pub min_line_length: usize,
    /// Overlap needed before two nearby lines group (0.0-1.0).
    pub min_overlap_ratio: f64,
    /// Keep tree-notation lines out of alignment grouping.
    pub preserve_trees: bool,
    /// Also report `\` and `/` runs. Detection only.
    pub detect_diagonals: bool,
    /// Branch starts needed before a grid counts as a tree.
    pub tree_branch_threshold: usize,
    /// Anchors a column needs before it can attract a row shift.
    pub min_consensus: usize,
    /// Smallest box width and height.
    pub min_box_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: 1,
            min_line_length: 2,
            min_overlap_ratio: 0.5,
            preserve_trees: true,
            detect_diagonals: false,
            tree_branch_threshold: 2,
            min_consensus: 2,
            min_box_size: 2,
        }
    }
}

/// Environment variables read by [`EngineSettings::with_env_overrides`].
pub const ENV_TOLERANCE: &str = "REALIGN_TOLERANCE";
pub const ENV_MIN_LINE_LENGTH: &str = "REALIGN_MIN_LINE_LENGTH";
pub const ENV_MIN_OVERLAP_RATIO: &str = "REALIGN_MIN_OVERLAP_RATIO";
pub const ENV_PRESERVE_TREES: &str = "REALIGN_PRESERVE_TREES";

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.tolerance > MAX_TOLERANCE {
            return Err(CorrectionError::InvalidSettings(format!(
                "tolerance must be between 0 and {MAX_TOLERANCE}, got {}",
                self.tolerance
            )));
        }
        if self.min_line_length == 0 {
            return Err(CorrectionError::InvalidSettings(
                "min_line_length must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_overlap_ratio) {
            return Err(CorrectionError::InvalidSettings(format!(
                "min_overlap_ratio must be between 0.0 and 1.0, got {}",
                self.min_overlap_ratio
            )));
        }
        if self.tree_branch_threshold == 0 {
            return Err(CorrectionError::InvalidSettings(
                "tree_branch_threshold must be at least 1".to_string(),
            ));
        }
        if self.min_consensus == 0 {
            return Err(CorrectionError::InvalidSettings(
                "min_consensus must be at least 1".to_string(),
            ));
        }
        if self.min_box_size < 2 {
            return Err(CorrectionError::InvalidSettings(
                "min_box_size must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Overlay `REALIGN_*` values fetched through `lookup`.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(ENV_TOLERANCE) {
            self.tolerance = parse_env(ENV_TOLERANCE, &v)?;
        }
        if let Some(v) = lookup(ENV_MIN_LINE_LENGTH) {
            self.min_line_length = parse_env(ENV_MIN_LINE_LENGTH, &v)?;
        }
        if let Some(v) = lookup(ENV_MIN_OVERLAP_RATIO) {
            self.min_overlap_ratio = parse_env(ENV_MIN_OVERLAP_RATIO, &v)?;
        }
        if let Some(v) = lookup(ENV_PRESERVE_TREES) {
            self.preserve_trees = parse_bool(ENV_PRESERVE_TREES, &v)?;
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CorrectionError::InvalidSettings(format!("{name}: cannot parse {value:?}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CorrectionError::InvalidSettings(format!(
            "{name}: expected a boolean, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        assert_eq!(settings.tolerance, 1);
        assert_eq!(settings.min_line_length, 2);
        assert!(settings.preserve_trees);
        assert!(!settings.detect_diagonals);
        settings.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let cases = [
            EngineSettings {
                tolerance: 11,
                ..Default::default()
            },
            EngineSettings {
                min_line_length: 0,
                ..Default::default()
            },
            EngineSettings {
                min_overlap_ratio: 1.5,
                ..Default::default()
            },
            EngineSettings {
                min_box_size: 1,
                ..Default::default()
            },
        ];
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(CorrectionError::InvalidSettings(_))),
                "{settings:?}"
            );
        }
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let settings: EngineSettings = toml::from_str("tolerance = 2\npreserve_trees = false").unwrap();
        assert_eq!(settings.tolerance, 2);
        assert!(!settings.preserve_trees);
        assert_eq!(settings.min_overlap_ratio, 0.5);
    }

    #[test]
    fn test_env_overrides() {
        let settings = EngineSettings::default()
            .with_env_overrides(env(&[
                (ENV_TOLERANCE, "3"),
                (ENV_MIN_OVERLAP_RATIO, "0.75"),
                (ENV_PRESERVE_TREES, "off"),
            ]))
            .unwrap();
        assert_eq!(settings.tolerance, 3);
        assert_eq!(settings.min_overlap_ratio, 0.75);
        assert!(!settings.preserve_trees);
        assert_eq!(settings.min_line_length, 2);
    }

    #[test]
    fn test_env_override_parse_error() {
        let err = EngineSettings::default()
            .with_env_overrides(env(&[(ENV_MIN_LINE_LENGTH, "two")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MIN_LINE_LENGTH));
    }
}
