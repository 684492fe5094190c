//! Alignment of derived features to a model's training column order

use super::DerivedFeatures;
use crate::models::{FeatureVector, ModelType};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::debug;

/// Column prefix of the one-hot membership dummies, e.g. `membership_type_id_2`
pub const MEMBERSHIP_DUMMY_PREFIX: &str = "membership_type_id_";

/// Canonical membership tiers; each gets a dummy column in schemas that use them
pub const MEMBERSHIP_TIERS: RangeInclusive<i64> = 1..=3;

/// Value substituted for every schema column the record cannot supply
const SCHEMA_DEFAULT: f64 = 0.0;

/// Builds model input vectors in exact schema order
pub struct FeatureAligner;

impl FeatureAligner {
    /// Align `features` to `expected_names`.
    ///
    /// The output has one value per expected name, in the same order.
    /// Names the feature set cannot supply get the zero default and are
    /// listed in [`FeatureVector::defaulted`]; features the schema does not
    /// name are dropped.
    pub fn align(
        features: &DerivedFeatures,
        model_type: ModelType,
        expected_names: &[String],
    ) -> FeatureVector {
        let mut values = Vec::with_capacity(expected_names.len());
        let mut defaulted = Vec::new();

        for name in expected_names {
            match features.get(name) {
                Some(value) => values.push(value),
                None => {
                    values.push(SCHEMA_DEFAULT);
                    defaulted.push(name.clone());
                }
            }
        }

        if !defaulted.is_empty() {
            debug!(
                model_type = %model_type,
                defaulted = defaulted.len(),
                columns = ?defaulted,
                "Schema columns filled with default"
            );
        }

        FeatureVector {
            model_type,
            values,
            defaulted,
        }
    }
}

/// Check a training schema before it is accepted into the artifact store.
///
/// Rejects duplicate column names, and schemas that use membership dummies
/// without carrying a column for every canonical tier.
pub fn validate_schema(names: &[String]) -> Result<(), String> {
    if names.is_empty() {
        return Err("feature list is empty".to_string());
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(format!("duplicate feature column '{}'", name));
        }
    }

    let uses_dummies = names.iter().any(|n| n.starts_with(MEMBERSHIP_DUMMY_PREFIX));
    if uses_dummies {
        let missing: Vec<String> = MEMBERSHIP_TIERS
            .map(|tier| format!("{}{}", MEMBERSHIP_DUMMY_PREFIX, tier))
            .filter(|dummy| !seen.contains(dummy.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing membership dummy columns {:?}", missing));
        }
    }

    Ok(())
}
