//! Feature preparation shared by the churn and LTV models
//!
//! Raw activity counters are turned into a [`DerivedFeatures`] set once per
//! record, then aligned separately to each model's training schema.

mod aligner;
mod engineer;

pub use aligner::{validate_schema, FeatureAligner, MEMBERSHIP_DUMMY_PREFIX, MEMBERSHIP_TIERS};
pub use engineer::{
    activity_level, pace_category, round_to, FeatureEngineer, ENGAGEMENT_WEIGHTS,
    MAX_MONTHLY_ACTIVITY,
};

use crate::models::RawRecord;
use serde::Serialize;

/// A raw record plus the synthetic features computed from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFeatures {
    #[serde(flatten)]
    pub raw: RawRecord,
    pub engagement_score: f64,
    pub days_inactive_ratio: f64,
    pub consistency_score: f64,
    pub monthly_activity_rate: f64,
    pub distance_trend: f64,
    pub is_premium: u8,
    pub activity_level: u8,
    pub pace_category: u8,
}

impl DerivedFeatures {
    /// Look up a feature by its training column name.
    ///
    /// Returns `None` for unknown names and for raw fields the record did
    /// not carry; the aligner turns both into the zero default.
    pub fn get(&self, name: &str) -> Option<f64> {
        let raw = &self.raw;
        match name {
            "membership_type_id" => raw.membership_type_id.map(|v| v as f64),
            "has_biometrics" => raw.has_biometrics.map(|b| if b { 1.0 } else { 0.0 }),
            "running_sessions_count" => raw.running_sessions_count,
            "runs_last_30_days" => raw.runs_last_30_days,
            "runs_last_90_days" => raw.runs_last_90_days,
            "distance_last_30_days_km" => raw.distance_last_30_days_km,
            "distance_last_90_days_km" => raw.distance_last_90_days_km,
            "days_since_last_run" => raw.days_since_last_run,
            "avg_distance_per_run" => raw.avg_distance_per_run,
            "days_on_platform" => raw.days_on_platform,
            "days_since_last_login" => raw.days_since_last_login,
            "avg_heart_rate_last_30_days" => raw.avg_heart_rate_last_30_days,
            "peak_heart_rate_max" => raw.peak_heart_rate_max,
            "avg_elevation_gain" => raw.avg_elevation_gain,
            "avg_pace_min_per_km" => raw.avg_pace_min_per_km,
            "achievement_count" => raw.achievement_count,
            "race_participation_count" => raw.race_participation_count,
            "engagement_score" => Some(self.engagement_score),
            "days_inactive_ratio" => Some(self.days_inactive_ratio),
            "consistency_score" => Some(self.consistency_score),
            "monthly_activity_rate" => Some(self.monthly_activity_rate),
            "distance_trend" => Some(self.distance_trend),
            "is_premium" => Some(self.is_premium as f64),
            "activity_level" => Some(self.activity_level as f64),
            "pace_category" => Some(self.pace_category as f64),
            other => self.membership_dummy(other),
        }
    }

    /// One-hot membership column such as `membership_type_id_2`
    fn membership_dummy(&self, name: &str) -> Option<f64> {
        let tier: i64 = name.strip_prefix(MEMBERSHIP_DUMMY_PREFIX)?.parse().ok()?;
        let hot = self.raw.membership_type_id == Some(tier);
        Some(if hot { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived(tier: Option<i64>) -> DerivedFeatures {
        FeatureEngineer::new().derive(&RawRecord {
            membership_type_id: tier,
            runs_last_30_days: Some(4.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_lookup_raw_and_derived_fields() {
        let f = derived(Some(2));
        assert_eq!(f.get("runs_last_30_days"), Some(4.0));
        assert_eq!(f.get("membership_type_id"), Some(2.0));
        assert_eq!(f.get("is_premium"), Some(1.0));
        assert_eq!(f.get("days_since_last_login"), None);
        assert_eq!(f.get("not_a_feature"), None);
    }

    #[test]
    fn test_membership_dummies() {
        let f = derived(Some(3));
        assert_eq!(f.get("membership_type_id_1"), Some(0.0));
        assert_eq!(f.get("membership_type_id_3"), Some(1.0));
        assert_eq!(f.get("membership_type_id_x"), None);

        let none = derived(None);
        assert_eq!(none.get("membership_type_id_1"), Some(0.0));
    }
}
