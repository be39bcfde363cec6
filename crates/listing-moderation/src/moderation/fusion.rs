use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Weighted-sum fusion settings. Weights are keyed by detector name and must sum
/// to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: BTreeMap<String, f32>,
    pub threshold: f32,
    pub amplification: f32,
    /// Per-detector sub-thresholds; a detector above its entry counts as a
    /// high-risk corroboration.
    pub high_risk: BTreeMap<String, f32>,
    pub min_corroborating: usize,
    pub reporting_threshold: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let weights = [
            ("cannabis_color", 0.20),
            ("skin_exposure", 0.15),
            ("white_powder", 0.10),
            ("shape", 0.15),
            ("texture", 0.10),
            ("clustering", 0.10),
            ("metadata", 0.20),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        let high_risk = [
            ("cannabis_color", 0.6),
            ("skin_exposure", 0.6),
            ("metadata", 0.6),
        ]
        .into_iter()
        .map(|(name, threshold)| (name.to_string(), threshold))
        .collect();

        Self {
            weights,
            threshold: 0.7,
            amplification: 1.3,
            high_risk,
            min_corroborating: 2,
            reporting_threshold: 0.5,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), FusionConfigError> {
        if self.weights.is_empty() {
            return Err(FusionConfigError::NoWeights);
        }
        if let Some((name, weight)) = self
            .weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(FusionConfigError::InvalidWeight {
                detector: name.clone(),
                weight: *weight,
            });
        }
        let total: f32 = self.weights.values().sum();
        if (total - 1.0).abs() > 1e-3 {
            return Err(FusionConfigError::WeightsDoNotSumToOne(total));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(FusionConfigError::ThresholdOutOfRange(self.threshold));
        }
        if !(self.amplification >= 1.0 && self.amplification.is_finite()) {
            return Err(FusionConfigError::AmplificationBelowOne(self.amplification));
        }
        if self.min_corroborating == 0 {
            return Err(FusionConfigError::NoCorroboration);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FusionConfigError {
    #[error("at least one detector weight is required")]
    NoWeights,
    #[error("weight {weight} for detector '{detector}' must be a non-negative number")]
    InvalidWeight { detector: String, weight: f32 },
    #[error("detector weights must sum to 1.0, got {0}")]
    WeightsDoNotSumToOne(f32),
    #[error("fusion threshold must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f32),
    #[error("amplification multiplier must be at least 1.0, got {0}")]
    AmplificationBelowOne(f32),
    #[error("at least one corroborating detector is required for amplification")]
    NoCorroboration,
}

/// Fused decision for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionOutcome {
    pub approved: bool,
    pub confidence: f32,
    pub raw_confidence: f32,
    pub amplified: bool,
    pub flagged: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Result<Self, FusionConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Combines detector scores. Scores without a weight are reported but do not
    /// contribute; weighted detectors missing from `scores` count as zero.
    pub fn fuse(&self, scores: &BTreeMap<String, f32>) -> FusionOutcome {
        let config = &self.config;
        let raw: f32 = config
            .weights
            .iter()
            .map(|(name, weight)| weight * scores.get(name).copied().unwrap_or(0.0))
            .sum();

        let corroborating = config
            .high_risk
            .iter()
            .filter(|(name, sub_threshold)| {
                scores
                    .get(*name)
                    .is_some_and(|score| score > *sub_threshold)
            })
            .count();
        let amplified = corroborating >= config.min_corroborating;
        let confidence = if amplified {
            (raw * config.amplification).min(1.0)
        } else {
            raw
        };

        let flagged: Vec<String> = scores
            .iter()
            .filter(|(_, score)| **score > config.reporting_threshold)
            .map(|(name, _)| name.clone())
            .collect();

        let approved = confidence < config.threshold;
        let mut explanation = format!(
            "confidence {confidence:.2} against threshold {:.2}",
            config.threshold
        );
        if !flagged.is_empty() {
            let details = flagged
                .iter()
                .map(|name| format!("{name}: {:.2}", scores.get(name).copied().unwrap_or(0.0)))
                .collect::<Vec<_>>()
                .join(", ");
            explanation.push_str(&format!("; flagged {details}"));
        }
        if amplified {
            explanation.push_str(&format!(
                "; amplified x{:.2} from {raw:.2} by {corroborating} corroborating signals",
                config.amplification
            ));
        }

        FusionOutcome {
            approved,
            confidence,
            raw_confidence: raw,
            amplified,
            flagged,
            explanation,
        }
    }
}
