//! Small artifact set used by unit tests

use crate::artifacts::{
    compute_checksum, ArtifactStore, Estimator, EstimatorSpec, ModelArtifact, NativeEstimator,
    StandardScaler,
};
use crate::models::{ModelType, RawRecord, UserId};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const CHURN_FEATURES: &[&str] = &[
    "days_since_last_run",
    "days_since_last_login",
    "runs_last_30_days",
    "runs_last_90_days",
    "engagement_score",
    "days_inactive_ratio",
    "consistency_score",
    "distance_trend",
    "is_premium",
    "activity_level",
];

pub const LTV_FEATURES: &[&str] = &[
    "running_sessions_count",
    "achievement_count",
    "race_participation_count",
    "engagement_score",
    "monthly_activity_rate",
    "is_premium",
    "membership_type_id_1",
    "membership_type_id_2",
    "membership_type_id_3",
    "pace_category",
    "avg_distance_per_run",
    "has_biometrics",
];

fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Value {
    json!({
        "children_left": [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature": [feature, -2, -2],
        "threshold": [threshold, -2.0, -2.0],
        "value": [0.0, left, right]
    })
}

fn scaler(n: usize, overrides: &[(usize, f64, f64)]) -> StandardScaler {
    let mut mean = vec![0.0; n];
    let mut scale = vec![1.0; n];
    for (i, m, s) in overrides {
        mean[*i] = *m;
        scale[*i] = *s;
    }
    StandardScaler { mean, scale }
}

pub fn churn_scaler() -> StandardScaler {
    // days_since_last_run and engagement_score
    scaler(CHURN_FEATURES.len(), &[(0, 10.0, 10.0), (4, 50.0, 25.0)])
}

pub fn ltv_scaler() -> StandardScaler {
    scaler(LTV_FEATURES.len(), &[(0, 20.0, 15.0)])
}

/// Churn rises once the last run is more than 20 days ago and falls with engagement
pub fn churn_model_json() -> Value {
    json!({
        "kind": "gradient_boosting",
        "init": -0.2,
        "learning_rate": 1.0,
        "trees": [stump(0, 1.0, -1.2, 1.6), stump(4, 0.0, 0.8, -0.9)],
        "feature_importances": [0.30, 0.15, 0.10, 0.05, 0.25, 0.05, 0.04, 0.03, 0.02, 0.01]
    })
}

/// Value grows with session count and the top membership tier
pub fn ltv_model_json() -> Value {
    json!({
        "kind": "random_forest",
        "trees": [stump(0, 0.0, 150.0, 520.0), stump(8, 0.5, 180.0, 640.0)],
        "feature_importances": [0.22, 0.12, 0.08, 0.15, 0.10, 0.09, 0.02, 0.03, 0.06, 0.05, 0.05, 0.03]
    })
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn native(model: Value, n_features: usize) -> NativeEstimator {
    let spec: EstimatorSpec = serde_json::from_value(model).unwrap();
    NativeEstimator::new(spec, n_features).unwrap()
}

pub fn churn_artifact() -> ModelArtifact {
    let estimator = Estimator::Classifier(Box::new(native(churn_model_json(), CHURN_FEATURES.len())));
    ModelArtifact::new(
        ModelType::Churn,
        "v1.0.0",
        estimator,
        churn_scaler(),
        names(CHURN_FEATURES),
        "gradient_boosting",
    )
    .unwrap()
}

pub fn ltv_artifact() -> ModelArtifact {
    let estimator = Estimator::Regressor(Box::new(native(ltv_model_json(), LTV_FEATURES.len())));
    ModelArtifact::new(
        ModelType::Ltv,
        "v1.0.0",
        estimator,
        ltv_scaler(),
        names(LTV_FEATURES),
        "random_forest",
    )
    .unwrap()
}

pub fn sample_store() -> ArtifactStore {
    ArtifactStore::from_artifacts("v1.0.0", vec![churn_artifact(), ltv_artifact()]).unwrap()
}

/// Active premium runner: low churn risk, medium value
pub fn sample_record() -> RawRecord {
    RawRecord {
        user_id: Some(UserId::Number(1001)),
        membership_type_id: Some(2),
        has_biometrics: Some(true),
        running_sessions_count: Some(45.0),
        runs_last_30_days: Some(8.0),
        runs_last_90_days: Some(24.0),
        distance_last_30_days_km: Some(40.0),
        distance_last_90_days_km: Some(120.0),
        days_since_last_run: Some(3.0),
        avg_distance_per_run: Some(5.0),
        days_on_platform: Some(400.0),
        days_since_last_login: Some(1.0),
        avg_heart_rate_last_30_days: Some(148.0),
        peak_heart_rate_max: Some(182.0),
        avg_elevation_gain: Some(35.0),
        avg_pace_min_per_km: Some(5.5),
        achievement_count: Some(6.0),
        race_participation_count: Some(2.0),
    }
}

/// Write the sample artifacts for `version` into `dir`, with a matching manifest
pub fn write_model_dir(dir: &Path, version: &str) {
    let files: Vec<(String, String)> = vec![
        (format!("churn_features_{}.json", version), serde_json::to_string(CHURN_FEATURES).unwrap()),
        (format!("churn_scaler_{}.json", version), serde_json::to_string(&churn_scaler()).unwrap()),
        (format!("churn_model_{}.json", version), churn_model_json().to_string()),
        (format!("ltv_features_{}.json", version), serde_json::to_string(LTV_FEATURES).unwrap()),
        (format!("ltv_scaler_{}.json", version), serde_json::to_string(&ltv_scaler()).unwrap()),
        (format!("ltv_model_{}.json", version), ltv_model_json().to_string()),
    ];

    let mut checksums = HashMap::new();
    for (name, content) in &files {
        fs::write(dir.join(name), content).unwrap();
        checksums.insert(name.clone(), compute_checksum(content.as_bytes()));
    }
    fs::write(
        dir.join(format!("manifest_{}.json", version)),
        json!({ "files": checksums }).to_string(),
    )
    .unwrap();
}
