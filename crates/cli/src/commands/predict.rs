//! Single-record prediction command

use anyhow::Result;
use colored::Colorize;
use insights_lib::{ModelType, PredictionOutput, PredictionResult, PredictionService};
use std::path::Path;
use tabled::Tabled;

use super::read_record;
use crate::output::{
    color_label, format_currency, format_probability, format_value, print_heading, print_info,
    print_json, print_table, OutputFormat,
};
use crate::ModelSelection;

/// Row for the feature importance table
#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

/// Predict one record with the selected model(s)
pub fn run(
    service: &PredictionService,
    model: ModelSelection,
    input: &Path,
    format: OutputFormat,
) -> Result<()> {
    let record = read_record(input)?;

    match model {
        ModelSelection::All => {
            let pair = service.predict_all(&record)?;
            match format {
                OutputFormat::Json => print_json(&pair)?,
                OutputFormat::Table => {
                    print_result(&pair.churn);
                    println!();
                    print_result(&pair.ltv);
                }
            }
        }
        ModelSelection::Churn | ModelSelection::Ltv => {
            let model_type = if model == ModelSelection::Churn {
                ModelType::Churn
            } else {
                ModelType::Ltv
            };
            let result = service.predict_one(model_type, &record)?;
            match format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => print_result(&result),
            }
        }
    }

    Ok(())
}

fn print_result(result: &PredictionResult) {
    match &result.output {
        PredictionOutput::Churn {
            prediction,
            probability,
            risk_level,
            confidence_score,
        } => {
            print_heading("Churn Prediction");
            println!(
                "Risk level:   {}",
                color_label(risk_level.as_str(), false)
            );
            println!("Probability:  {}", format_probability(*probability));
            println!("Confidence:   {}", format_probability(*confidence_score));
            println!(
                "Prediction:   {}",
                if *prediction == 1 { "will churn" } else { "will stay" }
            );
        }
        PredictionOutput::Ltv {
            ltv_value,
            ltv_category,
        } => {
            print_heading("Lifetime Value Prediction");
            println!(
                "Category:     {}",
                color_label(ltv_category.as_str(), true)
            );
            println!("Value:        {}", format_currency(*ltv_value));
        }
    }
    println!(
        "Model:        {} ({})",
        result.model_version.cyan(),
        result.predicted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if result.feature_importance.is_empty() {
        print_info("Model does not report feature importances");
        return;
    }

    let rows: Vec<ImportanceRow> = result
        .feature_importance
        .iter()
        .map(|f| ImportanceRow {
            rank: f.rank,
            feature: f.feature_name.clone(),
            value: format_value(f.feature_value),
            importance: format!("{:.4}", f.importance_score),
        })
        .collect();
    print_table(rows);
}
