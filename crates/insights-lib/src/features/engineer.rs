//! Synthetic feature derivation
//!
//! The weights, caps and bin edges below were fixed when the models were
//! trained. Changing any of them invalidates every existing artifact.

use super::DerivedFeatures;
use crate::models::RawRecord;

/// Engagement score weights: runs, distance, achievements, biometrics, races
pub const ENGAGEMENT_WEIGHTS: [f64; 5] = [0.35, 0.25, 0.20, 0.10, 0.10];

/// Saturation points of the engagement components
const RUNS_CAP: f64 = 30.0;
const DISTANCE_CAP_KM: f64 = 500.0;
const ACHIEVEMENTS_CAP: f64 = 20.0;
const RACES_CAP: f64 = 10.0;

/// Upper bound on sessions per month
pub const MAX_MONTHLY_ACTIVITY: f64 = 50.0;

/// Right-inclusive session-count edges for activity levels 0..=4
const ACTIVITY_EDGES: [f64; 4] = [0.0, 5.0, 20.0, 50.0];

/// Right-inclusive pace edges (min/km); faster pace gets the higher category
const PACE_EDGES: [f64; 4] = [5.0, 6.0, 7.0, 8.0];

/// Derives the engineered feature set from a raw record
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    pub fn derive(&self, raw: &RawRecord) -> DerivedFeatures {
        let v = |field: Option<f64>| field.unwrap_or(0.0);

        let days_on_platform = v(raw.days_on_platform);
        let total_sessions = v(raw.running_sessions_count);

        DerivedFeatures {
            engagement_score: self.engagement_score(raw),
            days_inactive_ratio: (v(raw.days_since_last_run) / days_on_platform.max(1.0))
                .clamp(0.0, 1.0),
            consistency_score: self
                .consistency_score(v(raw.runs_last_30_days), v(raw.runs_last_90_days)),
            monthly_activity_rate: (total_sessions / (days_on_platform / 30.0).max(1.0))
                .clamp(0.0, MAX_MONTHLY_ACTIVITY),
            distance_trend: self.distance_trend(
                v(raw.distance_last_30_days_km),
                v(raw.distance_last_90_days_km),
            ),
            is_premium: u8::from(raw.membership_type_id.unwrap_or(0) > 1),
            activity_level: activity_level(total_sessions),
            pace_category: pace_category(v(raw.avg_pace_min_per_km)),
            raw: raw.clone(),
        }
    }

    /// Weighted 0-100 engagement score, rounded to 2 decimals
    fn engagement_score(&self, raw: &RawRecord) -> f64 {
        let v = |field: Option<f64>| field.unwrap_or(0.0);
        let [w_runs, w_distance, w_achievements, w_biometrics, w_races] = ENGAGEMENT_WEIGHTS;

        let runs = (v(raw.runs_last_90_days) / RUNS_CAP).clamp(0.0, 1.0);
        let distance = (v(raw.distance_last_90_days_km) / DISTANCE_CAP_KM).clamp(0.0, 1.0);
        let achievements = (v(raw.achievement_count) / ACHIEVEMENTS_CAP).clamp(0.0, 1.0);
        let biometrics = if raw.has_biometrics.unwrap_or(false) { 1.0 } else { 0.0 };
        let races = (v(raw.race_participation_count) / RACES_CAP).clamp(0.0, 1.0);

        let score = (runs * w_runs
            + distance * w_distance
            + achievements * w_achievements
            + biometrics * w_biometrics
            + races * w_races)
            * 100.0;
        round_to(score, 2)
    }

    /// How closely the last 30 days match the 90-day monthly average
    fn consistency_score(&self, runs_30d: f64, runs_90d: f64) -> f64 {
        let monthly_90d = runs_90d / 3.0;
        let consistency = if monthly_90d > 0.0 {
            1.0 - (runs_30d - monthly_90d).abs() / monthly_90d
        } else {
            0.0
        };
        round_to(consistency.clamp(0.0, 1.0), 4)
    }

    /// Relative change of the last 30 days' distance against the 90-day monthly average
    fn distance_trend(&self, distance_30d: f64, distance_90d: f64) -> f64 {
        let monthly_90d = distance_90d / 3.0;
        if monthly_90d > 0.0 {
            ((distance_30d - monthly_90d) / monthly_90d).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Bucket total sessions: (-1,0]→0, (0,5]→1, (5,20]→2, (20,50]→3, (50,∞)→4
pub fn activity_level(total_sessions: f64) -> u8 {
    if total_sessions.is_nan() || total_sessions <= -1.0 {
        return 0;
    }
    ACTIVITY_EDGES
        .iter()
        .position(|edge| total_sessions <= *edge)
        .unwrap_or(ACTIVITY_EDGES.len()) as u8
}

/// Bucket pace: (0,5]→4, (5,6]→3, (6,7]→2, (7,8]→1, (8,∞)→0.
///
/// A missing or non-positive pace falls outside every bin and maps to 0.
pub fn pace_category(pace_min_per_km: f64) -> u8 {
    if pace_min_per_km.is_nan() || pace_min_per_km <= 0.0 {
        return 0;
    }
    let bin = PACE_EDGES
        .iter()
        .position(|edge| pace_min_per_km <= *edge)
        .unwrap_or(PACE_EDGES.len());
    (PACE_EDGES.len() - bin) as u8
}

/// Round half-to-even at the given number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
