//! Core data models for the prediction pipeline

use crate::error::{PipelineError, Result};
use crate::predictor::{LtvCategory, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The two independently trained models served by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Churn,
    Ltv,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Churn, ModelType::Ltv];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Churn => "churn",
            ModelType::Ltv => "ltv",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "churn" => Ok(ModelType::Churn),
            "ltv" => Ok(ModelType::Ltv),
            other => Err(format!("unknown model type '{}', expected churn or ltv", other)),
        }
    }
}

/// Opaque user identifier, passed through for correlation only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Activity telemetry for one user.
///
/// Every field is optional. Absent values are legal and are treated as
/// zero once features are aligned to a model schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(deserialize_with = "deserialize_tier")]
    pub membership_type_id: Option<i64>,
    #[serde(deserialize_with = "deserialize_flag")]
    pub has_biometrics: Option<bool>,
    pub running_sessions_count: Option<f64>,
    pub runs_last_30_days: Option<f64>,
    pub runs_last_90_days: Option<f64>,
    pub distance_last_30_days_km: Option<f64>,
    pub distance_last_90_days_km: Option<f64>,
    pub days_since_last_run: Option<f64>,
    pub avg_distance_per_run: Option<f64>,
    pub days_on_platform: Option<f64>,
    pub days_since_last_login: Option<f64>,
    pub avg_heart_rate_last_30_days: Option<f64>,
    pub peak_heart_rate_max: Option<f64>,
    pub avg_elevation_gain: Option<f64>,
    pub avg_pace_min_per_km: Option<f64>,
    pub achievement_count: Option<f64>,
    pub race_participation_count: Option<f64>,
}

impl RawRecord {
    /// Parse a single JSON object into a record
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(PipelineError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                json_kind(value)
            )));
        }
        RawRecord::deserialize(value).map_err(|e| PipelineError::InvalidRecord(e.to_string()))
    }

    /// Best-effort user id extraction from an unparsed record
    pub fn user_id_of(value: &serde_json::Value) -> Option<UserId> {
        value
            .get("user_id")
            .and_then(|id| UserId::deserialize(id).ok())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Accepts `true`/`false` as well as the 0/1 encoding used by the training data
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(f64),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Number(n)) if n == 0.0 => Ok(Some(false)),
        Some(Flag::Number(n)) if n == 1.0 => Ok(Some(true)),
        Some(Flag::Number(n)) => Err(serde::de::Error::custom(format!(
            "has_biometrics must be a boolean or 0/1, got {}",
            n
        ))),
    }
}

/// Accepts integers as well as whole-number floats such as `2.0`
fn deserialize_tier<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tier {
        Integer(i64),
        Float(f64),
    }

    match Option::<Tier>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Tier::Integer(n)) => Ok(Some(n)),
        Some(Tier::Float(n)) if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => {
            Ok(Some(n as i64))
        }
        Some(Tier::Float(n)) => Err(serde::de::Error::custom(format!(
            "membership_type_id must be a whole number, got {}",
            n
        ))),
    }
}

/// Numeric input for one model, ordered exactly as the model's training schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub model_type: ModelType,
    pub values: Vec<f64>,
    /// Schema columns filled with the zero default because the record lacked them
    pub defaulted: Vec<String>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// One ranked entry of the feature importance list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature_name: String,
    pub feature_value: f64,
    pub importance_score: f64,
    pub rank: usize,
}

/// Model-specific prediction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Churn {
        prediction: u8,
        probability: f64,
        risk_level: RiskLevel,
        confidence_score: f64,
    },
    Ltv {
        ltv_value: f64,
        ltv_category: LtvCategory,
    },
}

impl PredictionOutput {
    /// Categorical label: risk level for churn, value tier for LTV
    pub fn label(&self) -> &'static str {
        match self {
            PredictionOutput::Churn { risk_level, .. } => risk_level.as_str(),
            PredictionOutput::Ltv { ltv_category, .. } => ltv_category.as_str(),
        }
    }

    /// Probability for churn, monetary value for LTV
    pub fn score(&self) -> f64 {
        match self {
            PredictionOutput::Churn { probability, .. } => *probability,
            PredictionOutput::Ltv { ltv_value, .. } => *ltv_value,
        }
    }
}

/// Result of running one model on one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model_type: ModelType,
    #[serde(flatten)]
    pub output: PredictionOutput,
    pub feature_importance: Vec<FeatureImportance>,
    pub model_version: String,
    pub predicted_at: DateTime<Utc>,
}

/// Churn and LTV predictions for the same record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPair {
    pub churn: PredictionResult,
    pub ltv: PredictionResult,
}

/// Per-record failure marker inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub index: usize,
    pub user_id: Option<UserId>,
    pub error: String,
}

/// One slot of a batch result, index-aligned with the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Success {
        user_id: Option<UserId>,
        #[serde(flatten)]
        predictions: PredictionPair,
    },
    Failure(BatchItemError),
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchEntry::Success { .. })
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            BatchEntry::Success { user_id, .. } => user_id.as_ref(),
            BatchEntry::Failure(e) => e.user_id.as_ref(),
        }
    }
}

/// Ordered outcome of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|e| e.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

/// Summary of the loaded artifact set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsDescription {
    pub version: String,
    pub models_loaded: Vec<ModelType>,
    pub feature_counts: BTreeMap<ModelType, usize>,
}
