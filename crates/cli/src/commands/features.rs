//! Feature inspection command

use anyhow::Result;
use colored::Colorize;
use insights_lib::features::DerivedFeatures;
use insights_lib::{FeatureVector, ModelType, PredictionService};
use std::path::Path;
use tabled::Tabled;

use super::read_record;
use crate::output::{format_value, print_heading, print_json, print_table, OutputFormat};

/// Engineered features shown in the table view, in display order
const DERIVED_FEATURES: &[&str] = &[
    "engagement_score",
    "days_inactive_ratio",
    "consistency_score",
    "monthly_activity_rate",
    "distance_trend",
    "is_premium",
    "activity_level",
    "pace_category",
];

/// Row for the features table
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
}

pub fn run(
    service: &PredictionService,
    input: &Path,
    model: Option<ModelType>,
    format: OutputFormat,
) -> Result<()> {
    let record = read_record(input)?;

    match model {
        None => {
            let features = service.derive_features(&record);
            match format {
                OutputFormat::Json => print_json(&features)?,
                OutputFormat::Table => print_derived(&features),
            }
        }
        Some(model_type) => {
            let vector = service.align_features(model_type, &record)?;
            match format {
                OutputFormat::Json => print_json(&vector)?,
                OutputFormat::Table => {
                    let names = service.feature_names(model_type)?;
                    print_aligned(&vector, &names);
                }
            }
        }
    }
    Ok(())
}

fn print_derived(features: &DerivedFeatures) {
    print_heading("Engineered Features");
    let rows: Vec<FeatureRow> = DERIVED_FEATURES
        .iter()
        .map(|name| FeatureRow {
            name: name.to_string(),
            value: features.get(name).map(format_value).unwrap_or_default(),
            source: "derived".to_string(),
        })
        .collect();
    print_table(rows);
}

fn print_aligned(vector: &FeatureVector, names: &[String]) {
    print_heading(&format!("{} model input", vector.model_type));
    let rows: Vec<FeatureRow> = names
        .iter()
        .zip(&vector.values)
        .map(|(name, value)| FeatureRow {
            name: name.clone(),
            value: format_value(*value),
            source: if vector.defaulted.contains(name) {
                "default".yellow().to_string()
            } else {
                "present".to_string()
            },
        })
        .collect();
    print_table(rows);
}
