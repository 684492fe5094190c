//! Prediction output formatting and post-processing
//!
//! Turns raw model outputs into business categories and ranks feature
//! importances. Categories are always decided on the unrounded value;
//! rounding only applies to what is reported.

use crate::features::round_to;
use crate::models::{FeatureImportance, PredictionOutput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Churn probability at or above which a user is high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Churn probability at or above which a user is medium risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

/// Predicted lifetime value at or above which a user is high value
pub const HIGH_LTV_THRESHOLD: f64 = 500.0;

/// Predicted lifetime value at or above which a user is medium value
pub const MEDIUM_LTV_THRESHOLD: f64 = 200.0;

/// Default length of the reported importance list
pub const DEFAULT_TOP_FEATURES: usize = 10;

/// Churn risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime value tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LtvCategory {
    Zero,
    Low,
    Medium,
    High,
}

impl LtvCategory {
    pub fn from_value(value: f64) -> Self {
        if value >= HIGH_LTV_THRESHOLD {
            LtvCategory::High
        } else if value >= MEDIUM_LTV_THRESHOLD {
            LtvCategory::Medium
        } else if value > 0.0 {
            LtvCategory::Low
        } else {
            LtvCategory::Zero
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LtvCategory::Zero => "ZERO",
            LtvCategory::Low => "LOW",
            LtvCategory::Medium => "MEDIUM",
            LtvCategory::High => "HIGH",
        }
    }
}

impl fmt::Display for LtvCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Number of features kept in the importance list
    pub top_features: usize,
    /// Decimals reported for probabilities and confidence
    pub probability_decimals: i32,
    /// Decimals reported for monetary values
    pub value_decimals: i32,
    /// Decimals reported for importance scores
    pub importance_decimals: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            top_features: DEFAULT_TOP_FEATURES,
            probability_decimals: 4,
            value_decimals: 2,
            importance_decimals: 4,
        }
    }
}

/// Formats raw model outputs into [`PredictionOutput`]s
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Churn output from the classifier's label and class probabilities
    pub fn format_churn(&self, prediction: u8, probabilities: [f64; 2]) -> PredictionOutput {
        let probability = probabilities[1];
        let confidence = probabilities[0].max(probabilities[1]);
        let decimals = self.config.probability_decimals;

        PredictionOutput::Churn {
            prediction,
            probability: round_to(probability, decimals),
            risk_level: RiskLevel::from_probability(probability),
            confidence_score: round_to(confidence, decimals),
        }
    }

    /// LTV output from the regressor's raw value, clamped at zero
    pub fn format_ltv(&self, raw_value: f64) -> PredictionOutput {
        let value = raw_value.max(0.0);
        PredictionOutput::Ltv {
            ltv_value: round_to(value, self.config.value_decimals),
            ltv_category: LtvCategory::from_value(value),
        }
    }

    /// Rank features by importance, highest first.
    ///
    /// `feature_value` is the aligned, unscaled input value and `rank` is the
    /// feature's 1-based position in the training schema. Scores are rounded
    /// before sorting, so features equal at reporting precision keep schema order.
    pub fn rank_importances(
        &self,
        names: &[String],
        values: &[f64],
        importances: &[f64],
    ) -> Vec<FeatureImportance> {
        let decimals = self.config.importance_decimals;
        let mut entries: Vec<FeatureImportance> = names
            .iter()
            .zip(values)
            .zip(importances)
            .enumerate()
            .map(|(i, ((name, value), score))| FeatureImportance {
                feature_name: name.clone(),
                feature_value: *value,
                importance_score: round_to(*score, decimals),
                rank: i + 1,
            })
            .collect();

        entries.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));
        entries.truncate(self.config.top_features);
        entries
    }
}
