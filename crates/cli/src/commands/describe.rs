//! Loaded model summary command

use anyhow::Result;
use colored::Colorize;
use insights_lib::{PipelineConfig, PredictionService};
use tabled::Tabled;

use crate::output::{print_heading, print_json, print_table, OutputFormat};

/// Row for the models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Features")]
    features: usize,
}

pub fn run(service: &PredictionService, config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let description = service.describe_models();

    match format {
        OutputFormat::Json => print_json(&description)?,
        OutputFormat::Table => {
            print_heading("Loaded Models");
            println!("Models dir: {}", config.models_dir.display().to_string().cyan());
            println!("Version:    {}", description.version.cyan());
            println!();

            let rows: Vec<ModelRow> = description
                .models_loaded
                .iter()
                .map(|model_type| ModelRow {
                    model: model_type.to_string(),
                    version: description.version.clone(),
                    features: description
                        .feature_counts
                        .get(model_type)
                        .copied()
                        .unwrap_or(0),
                })
                .collect();
            print_table(rows);
        }
    }
    Ok(())
}
