//! Batch prediction command

use anyhow::{bail, Result};
use insights_lib::{BatchEntry, BatchResult, PredictionService};
use std::path::Path;
use tabled::Tabled;

use super::read_json;
use crate::output::{
    color_label, color_status, format_currency, format_probability, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the batch results table
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Churn Risk")]
    churn_risk: String,
    #[tabled(rename = "Churn Prob")]
    churn_probability: String,
    #[tabled(rename = "LTV")]
    ltv: String,
    #[tabled(rename = "LTV Tier")]
    ltv_category: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Predict every record of a JSON array
pub async fn run(service: &PredictionService, input: &Path, format: OutputFormat) -> Result<()> {
    let values = match read_json(input)? {
        serde_json::Value::Array(values) => values,
        _ => bail!("Batch input {} must be a JSON array of records", input.display()),
    };

    let result = service.predict_batch_json(values).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_batch(&result),
    }
    Ok(())
}

fn print_batch(result: &BatchResult) {
    let rows: Vec<BatchRow> = result
        .results
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let user = entry
                .user_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            match entry {
                BatchEntry::Success { predictions, .. } => BatchRow {
                    index,
                    user,
                    status: color_status(true),
                    churn_risk: color_label(predictions.churn.output.label(), false),
                    churn_probability: format_probability(predictions.churn.output.score()),
                    ltv: format_currency(predictions.ltv.output.score()),
                    ltv_category: color_label(predictions.ltv.output.label(), true),
                    error: String::new(),
                },
                BatchEntry::Failure(item) => BatchRow {
                    index,
                    user,
                    status: color_status(false),
                    churn_risk: "-".to_string(),
                    churn_probability: "-".to_string(),
                    ltv: "-".to_string(),
                    ltv_category: "-".to_string(),
                    error: item.error.clone(),
                },
            }
        })
        .collect();

    print_table(rows);
    println!();

    if result.failed() == 0 {
        print_success(&format!("Predicted {} records", result.len()));
    } else {
        print_warning(&format!(
            "Predicted {} of {} records, {} failed",
            result.succeeded(),
            result.len(),
            result.failed()
        ));
    }
}
