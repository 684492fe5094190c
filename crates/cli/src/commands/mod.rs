//! CLI subcommands

pub mod batch;
pub mod describe;
pub mod features;
pub mod predict;

use anyhow::{Context, Result};
use insights_lib::RawRecord;
use std::io::Read;
use std::path::Path;

/// Read a JSON document from a file, or stdin when the path is `-`
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read input from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?
    };
    serde_json::from_str(&content)
        .with_context(|| format!("Input {} is not valid JSON", path.display()))
}

/// Read a single record object
pub fn read_record(path: &Path) -> Result<RawRecord> {
    let value = read_json(path)?;
    RawRecord::from_json(&value)
        .with_context(|| format!("Input {} is not a valid record", path.display()))
}
