use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::detectors::DetectorParams;
use super::fusion::{FusionConfig, FusionConfigError};
use super::policy::{PolicyError, PolicyTable, PolicyTableDefinition};

/// Externally loadable tuning for the whole pipeline. Every field has a default,
/// so a settings file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    pub fusion: FusionConfig,
    pub detectors: DetectorParams,
    pub max_analysis_side: u32,
    pub policies: PolicyTableDefinition,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            detectors: DetectorParams::default(),
            max_analysis_side: 512,
            policies: PolicyTableDefinition::standard(),
        }
    }
}

impl ModerationSettings {
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.fusion.validate()?;
        PolicyTable::from_definition(&self.policies)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Fusion(#[from] FusionConfigError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = ModerationSettings::from_json(r#"{"fusion": {"threshold": 0.6}}"#)
            .expect("partial settings parse");
        assert_eq!(settings.fusion.threshold, 0.6);
        assert_eq!(settings.fusion.amplification, 1.3);
        assert_eq!(settings.max_analysis_side, 512);
        assert_eq!(settings.policies.categories.len(), 17);
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let raw = r#"{"fusion": {"weights": {"metadata": 0.5, "shape": 0.2}}}"#;
        match ModerationSettings::from_json(raw) {
            Err(SettingsError::Fusion(FusionConfigError::WeightsDoNotSumToOne(total))) => {
                assert!((total - 0.7).abs() < 1e-6)
            }
            other => panic!("expected weight error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_policy_patterns() {
        let raw = r#"{
            "policies": {
                "global_forbidden": [],
                "catch_all": "Varios",
                "categories": {
                    "Varios": {"max_price": "100", "min_description_length": 1, "suspicious_patterns": ["[oops"]}
                }
            }
        }"#;
        assert!(matches!(
            ModerationSettings::from_json(raw),
            Err(SettingsError::Policy(PolicyError::InvalidPattern { .. }))
        ));
    }
}
